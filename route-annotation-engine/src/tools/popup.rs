use bevy::prelude::*;
use constants::render_settings::{
    POPUP_FLAT_PITCH_DEG, POPUP_FLAT_SHIFT_PX, POPUP_OFFSET_X_PX, POPUP_OFFSET_Y_PX,
    POPUP_STEEP_PITCH_DEG, POPUP_STEEP_SHIFT_PX,
};

use crate::annotation::{AnnotationId, LineAnnotation};
use crate::engine::viewer::Viewer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PopupId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopupMode {
    ReadOnly,
    Edit,
}

/// The single floating panel attached to the selected line.
#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub id: PopupId,
    pub tracked: AnnotationId,
    pub mode: PopupMode,
    /// Top-left viewport position from the latest frame.
    pub anchor: Option<Vec2>,
    pub confirming_delete: bool,
}

impl Popup {
    pub fn new(id: PopupId, tracked: AnnotationId, mode: PopupMode) -> Self {
        Self {
            id,
            tracked,
            mode,
            anchor: None,
            confirming_delete: false,
        }
    }

    /// Keeps the previous anchor when the line is too short or off-screen.
    pub fn reanchor(&mut self, points: &[Vec3], viewer: &dyn Viewer) {
        if let Some(anchor) = popup_anchor(points, viewer) {
            self.anchor = Some(anchor);
        }
    }
}

/// Screen position for the popup of a line: midpoint of the middle segment,
/// shifted right and up, with extra vertical room on steep or flat views.
pub fn popup_anchor(points: &[Vec3], viewer: &dyn Viewer) -> Option<Vec2> {
    if points.len() < 2 {
        return None;
    }

    let mid = points.len() / 2;
    let next = points.get(mid + 1).unwrap_or(&points[mid]);
    let midpoint = (points[mid] + *next) * 0.5;
    let screen = viewer.world_to_screen(midpoint)?;

    let pitch = viewer.camera_pitch().to_degrees();
    let mut shift_y = POPUP_OFFSET_Y_PX;
    if pitch < POPUP_STEEP_PITCH_DEG {
        shift_y += POPUP_STEEP_SHIFT_PX;
    } else if pitch > POPUP_FLAT_PITCH_DEG {
        shift_y += POPUP_FLAT_SHIFT_PX;
    }

    Some(screen + Vec2::new(POPUP_OFFSET_X_PX, shift_y))
}

/// One row of the read-only popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupRow {
    pub label: &'static str,
    pub value: String,
}

/// Rows shown by the read-only popup; metrics with two decimals.
pub fn read_only_rows(line: &LineAnnotation) -> Vec<PopupRow> {
    vec![
        PopupRow {
            label: "Name",
            value: line.attributes.name.clone(),
        },
        PopupRow {
            label: "Grade",
            value: line.attributes.grade.clone(),
        },
        PopupRow {
            label: "Grade (sit start)",
            value: line.attributes.grade_alt.clone(),
        },
        PopupRow {
            label: "Length",
            value: format!("{:.2} m", line.metrics.length),
        },
        PopupRow {
            label: "Height",
            value: format!("{:.2} m", line.metrics.height),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockViewer;

    #[test]
    fn anchor_uses_middle_segment_midpoint() {
        let viewer = MockViewer::default();
        let points = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        // mid = 1, midpoint of points[1] and points[2] = (1, 0.5).
        let expected = viewer.screen_of(Vec3::new(1.0, 0.5, 0.0)) + Vec2::new(50.0, -25.0);
        assert_eq!(popup_anchor(&points, &viewer), Some(expected));
    }

    #[test]
    fn two_points_use_last_point_twice() {
        let viewer = MockViewer::default();
        let points = [Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0)];
        let expected = viewer.screen_of(Vec3::new(2.0, 0.0, 0.0)) + Vec2::new(50.0, -25.0);
        assert_eq!(popup_anchor(&points, &viewer), Some(expected));
    }

    #[test]
    fn pitch_adjusts_vertical_shift() {
        let points = [Vec3::ZERO, Vec3::X];
        let mut viewer = MockViewer {
            pitch: (-45.0f32).to_radians(),
            ..default()
        };
        let base = viewer.screen_of(Vec3::X);
        assert_eq!(popup_anchor(&points, &viewer), Some(base + Vec2::new(50.0, -45.0)));

        viewer.pitch = 0.0;
        assert_eq!(popup_anchor(&points, &viewer), Some(base + Vec2::new(50.0, -10.0)));
    }

    #[test]
    fn short_lines_keep_previous_anchor() {
        let viewer = MockViewer::default();
        let mut popup = Popup::new(PopupId(1), AnnotationId(1), PopupMode::ReadOnly);
        popup.anchor = Some(Vec2::new(3.0, 4.0));

        popup.reanchor(&[Vec3::ZERO], &viewer);
        assert_eq!(popup.anchor, Some(Vec2::new(3.0, 4.0)));
    }
}
