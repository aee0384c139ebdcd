/// Distance (metres) every projected surface point is pulled toward the camera,
/// so overlays never z-fight with the structure they sit on.
pub const SURFACE_OFFSET: f32 = 0.05;

/// World-space thickness of a line per unit of grade stroke width.
pub const LINE_WIDTH_WORLD_SCALE: f32 = 0.012;
pub const LINE_ALPHA: f32 = 0.4;
pub const HIGHLIGHT_ALPHA: f32 = 0.6;

/// Stroke width (grade units) of the live preview line while drawing.
pub const PREVIEW_LINE_WIDTH: f32 = 5.0;
pub const PREVIEW_LINE_ALPHA: f32 = 0.5;

pub const DRAW_VERTEX_SIZE: f32 = 0.08;
pub const FLOATING_VERTEX_SIZE: f32 = 0.06;

// Screen-space thresholds, logical pixels
pub const SELECTION_THRESHOLD_PX: f32 = 25.0;
pub const VERTEX_PICK_THRESHOLD_PX: f32 = 10.0;
pub const LABEL_OVERLAP_THRESHOLD_PX: f32 = 20.0;
pub const LABEL_NUDGE_PX: f32 = 20.0;
/// Right-button releases that moved less than this count as a click, not a camera drag.
pub const SECONDARY_CLICK_DRAG_TOLERANCE_PX: f32 = 4.0;

pub const LABEL_FONT_SIZE: f32 = 16.0;
pub const LABEL_ALPHA: f32 = 0.7;
/// Labels sit this far above their anchor before any overlap nudge.
pub const LABEL_BASE_OFFSET_PX: f32 = 22.0;

pub const POPUP_OFFSET_X_PX: f32 = 50.0;
pub const POPUP_OFFSET_Y_PX: f32 = -25.0;
pub const POPUP_STEEP_PITCH_DEG: f32 = -30.0;
pub const POPUP_STEEP_SHIFT_PX: f32 = -20.0;
pub const POPUP_FLAT_PITCH_DEG: f32 = -5.0;
pub const POPUP_FLAT_SHIFT_PX: f32 = 15.0;

/// Camera distance as a multiple of the framed bounding-sphere radius.
pub const FRAMING_RANGE_FACTOR: f32 = 5.0;
pub const CENTER_VIEW_PITCH_DEG: f32 = -35.0;
pub const MIN_FRAMING_RADIUS: f32 = 1.0;
