//! Canvas geometry for box annotation
//!
//! Pure coordinate math: drag-to-rectangle normalization, minimum-size
//! filtering, and the zoom/rotation view transform applied when rendering
//! the source image. Bounding boxes live in untransformed canvas display
//! space, so their coordinates are stable under zoom and rotation changes.

/// Minimum box dimension in display units. Both width and height must
/// strictly exceed this for a candidate to be committed.
pub const MIN_BOX_DIMENSION: f32 = 10.0;

/// Zoom factor bounds
pub const MIN_ZOOM: f32 = 0.5;
pub const MAX_ZOOM: f32 = 3.0;

/// Zoom adjustment per step
pub const ZOOM_STEP: f32 = 0.1;

/// Rotation advance per rotate action, in degrees
pub const ROTATION_STEP: u32 = 90;

/// A point in canvas display coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasPoint {
    pub x: f32,
    pub y: f32,
}

impl CanvasPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Normalized rectangle produced from a pointer drag
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxCandidate {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoxCandidate {
    /// Normalize two drag endpoints into an origin-plus-size rectangle
    pub fn from_points(a: CanvasPoint, b: CanvasPoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    /// Whether both dimensions strictly exceed the minimum size
    pub fn meets_minimum_size(&self) -> bool {
        self.width > MIN_BOX_DIMENSION && self.height > MIN_BOX_DIMENSION
    }
}

/// In-progress drag selection on the annotation canvas
///
/// Mirrors the pointer lifecycle: `begin` on pointer-down, `update` on
/// pointer-move, `finish` on pointer-up. `finish` applies the minimum-size
/// filter; sub-threshold candidates are discarded without error.
#[derive(Debug, Clone, Copy, Default)]
pub struct DragSelection {
    start: Option<CanvasPoint>,
    current: Option<CanvasPoint>,
}

impl DragSelection {
    /// Start a new drag at the given pointer position
    pub fn begin(&mut self, point: CanvasPoint) {
        self.start = Some(point);
        self.current = Some(point);
    }

    /// Update the trailing pointer position
    pub fn update(&mut self, point: CanvasPoint) {
        if self.start.is_some() {
            self.current = Some(point);
        }
    }

    /// Whether a drag is currently active
    pub fn is_active(&self) -> bool {
        self.start.is_some()
    }

    /// The rectangle the user is currently dragging out, for overlay rendering
    pub fn preview(&self) -> Option<BoxCandidate> {
        match (self.start, self.current) {
            (Some(a), Some(b)) => Some(BoxCandidate::from_points(a, b)),
            _ => None,
        }
    }

    /// Complete the drag, returning the candidate if it meets the minimum size
    pub fn finish(&mut self) -> Option<BoxCandidate> {
        let candidate = self.preview();
        self.start = None;
        self.current = None;
        candidate.filter(BoxCandidate::meets_minimum_size)
    }
}

/// Zoom/rotation state for the annotation canvas
///
/// The renderer composes translate-to-center, rotate, then scale before
/// drawing the source raster; boxes are drawn in overlay space on top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    /// Zoom factor, clamped to [`MIN_ZOOM`, `MAX_ZOOM`]
    pub zoom: f32,
    /// Rotation in degrees, always one of 0/90/180/270
    pub rotation: u32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            rotation: 0,
        }
    }
}

impl ViewTransform {
    /// Increase zoom by one step, clamped to the maximum
    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom + ZOOM_STEP).min(MAX_ZOOM);
    }

    /// Decrease zoom by one step, clamped to the minimum
    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom - ZOOM_STEP).max(MIN_ZOOM);
    }

    /// Advance rotation by 90 degrees, wrapping past 360
    pub fn rotate(&mut self) {
        self.rotation = (self.rotation + ROTATION_STEP) % 360;
    }

    /// Restore the default zoom and rotation
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Map an image-space point into canvas display space
    ///
    /// Applies the composed render transform: the image is centered on the
    /// canvas, rotated about the canvas center, and scaled by the zoom
    /// factor. Rotation uses exact unit vectors for the four right angles.
    pub fn image_to_canvas(
        &self,
        point: CanvasPoint,
        canvas_size: (f32, f32),
        image_size: (f32, f32),
    ) -> CanvasPoint {
        let (sin, cos) = self.rotation_unit();
        let dx = (point.x - image_size.0 / 2.0) * self.zoom;
        let dy = (point.y - image_size.1 / 2.0) * self.zoom;
        CanvasPoint {
            x: canvas_size.0 / 2.0 + dx * cos - dy * sin,
            y: canvas_size.1 / 2.0 + dx * sin + dy * cos,
        }
    }

    /// Map a canvas display point back into image space (inverse transform)
    pub fn canvas_to_image(
        &self,
        point: CanvasPoint,
        canvas_size: (f32, f32),
        image_size: (f32, f32),
    ) -> CanvasPoint {
        let (sin, cos) = self.rotation_unit();
        let dx = (point.x - canvas_size.0 / 2.0) / self.zoom;
        let dy = (point.y - canvas_size.1 / 2.0) / self.zoom;
        // Inverse rotation: transpose of the rotation matrix
        CanvasPoint {
            x: image_size.0 / 2.0 + dx * cos + dy * sin,
            y: image_size.1 / 2.0 - dx * sin + dy * cos,
        }
    }

    /// Exact (sin, cos) pair for the current right-angle rotation
    fn rotation_unit(&self) -> (f32, f32) {
        match self.rotation {
            0 => (0.0, 1.0),
            90 => (1.0, 0.0),
            180 => (0.0, -1.0),
            270 => (-1.0, 0.0),
            // Unreachable while rotation only changes via rotate()
            other => ((other as f32).to_radians().sin(), (other as f32).to_radians().cos()),
        }
    }
}
