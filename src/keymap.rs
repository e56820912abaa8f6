//! Keyboard command table
//!
//! Maps (pipeline stage, key) to pipeline operations. Pure lookup,
//! decoupled from rendering: the shell translates its input events into
//! [`KeyInput`] values and applies whatever command comes back.

/// Pipeline stage scoping key dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Drawing boxes on the current image
    Annotate,
    /// Reviewing extraction records
    Review,
}

/// A key event from the input surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    ArrowLeft,
    ArrowRight,
}

/// One pipeline operation per key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run extraction over the current image's boxes
    Extract,
    /// Remove the most recently drawn box
    UndoLastBox,
    /// Manually move to the next image
    NextImage,
    Approve,
    Reject,
    ToggleEdit,
    NavigatePrev,
    NavigateNext,
}

/// Resolve a key event within the current stage
pub fn command_for(stage: Stage, key: KeyInput) -> Option<Command> {
    match (stage, key) {
        (Stage::Annotate, KeyInput::Char('s')) => Some(Command::Extract),
        (Stage::Annotate, KeyInput::Char('u')) => Some(Command::UndoLastBox),
        (Stage::Annotate, KeyInput::Char('n')) => Some(Command::NextImage),
        (Stage::Review, KeyInput::Char('a')) => Some(Command::Approve),
        (Stage::Review, KeyInput::Char('x')) => Some(Command::Reject),
        (Stage::Review, KeyInput::Char('e')) => Some(Command::ToggleEdit),
        (Stage::Review, KeyInput::ArrowLeft) => Some(Command::NavigatePrev),
        (Stage::Review, KeyInput::ArrowRight) => Some(Command::NavigateNext),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotate_bindings() {
        assert_eq!(
            command_for(Stage::Annotate, KeyInput::Char('s')),
            Some(Command::Extract)
        );
        assert_eq!(
            command_for(Stage::Annotate, KeyInput::Char('u')),
            Some(Command::UndoLastBox)
        );
        assert_eq!(
            command_for(Stage::Annotate, KeyInput::Char('n')),
            Some(Command::NextImage)
        );
    }

    #[test]
    fn test_review_bindings() {
        assert_eq!(
            command_for(Stage::Review, KeyInput::Char('a')),
            Some(Command::Approve)
        );
        assert_eq!(
            command_for(Stage::Review, KeyInput::Char('x')),
            Some(Command::Reject)
        );
        assert_eq!(
            command_for(Stage::Review, KeyInput::Char('e')),
            Some(Command::ToggleEdit)
        );
        assert_eq!(
            command_for(Stage::Review, KeyInput::ArrowLeft),
            Some(Command::NavigatePrev)
        );
        assert_eq!(
            command_for(Stage::Review, KeyInput::ArrowRight),
            Some(Command::NavigateNext)
        );
    }

    #[test]
    fn test_keys_do_not_cross_stages() {
        // Annotate keys are inert during review and vice versa
        assert_eq!(command_for(Stage::Review, KeyInput::Char('s')), None);
        assert_eq!(command_for(Stage::Review, KeyInput::Char('n')), None);
        assert_eq!(command_for(Stage::Annotate, KeyInput::Char('a')), None);
        assert_eq!(command_for(Stage::Annotate, KeyInput::ArrowRight), None);
    }

    #[test]
    fn test_unbound_keys_resolve_to_nothing() {
        assert_eq!(command_for(Stage::Annotate, KeyInput::Char('q')), None);
        assert_eq!(command_for(Stage::Review, KeyInput::Char('z')), None);
    }
}
