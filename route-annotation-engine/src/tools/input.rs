use bevy::picking::mesh_picking::ray_cast::MeshRayCast;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use constants::render_settings::SECONDARY_CLICK_DRAG_TOLERANCE_PX;

use crate::engine::loading::manifest_loader::StructureMesh;
use crate::engine::scene_sync::OverlayMesh;
use crate::engine::viewer::BevyViewer;
use crate::tools::editor::AnnotationEditor;
use crate::tools::ui::FocusedField;

/// Cursor bookkeeping between frames.
#[derive(Resource, Default, Debug)]
pub struct PointerTracker {
    last_cursor: Option<Vec2>,
    secondary_press: Option<Vec2>,
    secondary_travel: f32,
}

impl PointerTracker {
    pub fn press_secondary(&mut self, at: Vec2) {
        self.secondary_press = Some(at);
        self.secondary_travel = 0.0;
    }

    pub fn track_secondary(&mut self, at: Vec2) {
        if let Some(press) = self.secondary_press {
            self.secondary_travel = self.secondary_travel.max(press.distance(at));
        }
    }

    /// True when the button came up without dragging the camera.
    pub fn release_secondary(&mut self, at: Vec2) -> bool {
        self.track_secondary(at);
        let was_click = self.secondary_press.is_some()
            && self.secondary_travel < SECONDARY_CLICK_DRAG_TOLERANCE_PX;
        self.secondary_press = None;
        was_click
    }
}

/// Set while the pointer is over an interactive panel.
#[derive(Resource, Default, Debug)]
pub struct UiPointerCapture(pub bool);

pub fn update_ui_pointer_capture(
    mut capture: ResMut<UiPointerCapture>,
    interactions: Query<&Interaction>,
) {
    capture.0 = interactions
        .iter()
        .any(|interaction| *interaction != Interaction::None);
}

/// Feeds pointer and cancel-key input to the editor, then runs the
/// per-frame label and popup pass for the current camera.
pub fn route_pointer_input(
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&Camera, &GlobalTransform), With<Camera3d>>,
    mut ray_cast: MeshRayCast,
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    capture: Res<UiPointerCapture>,
    focused_field: Res<FocusedField>,
    mut tracker: ResMut<PointerTracker>,
    mut editor: ResMut<AnnotationEditor>,
    overlays: Query<(), With<OverlayMesh>>,
    structure: Query<(), With<StructureMesh>>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((camera, camera_transform)) = cameras.single() else {
        return;
    };

    let frame = *editor.store().frame();
    let is_overlay = |entity: Entity| overlays.contains(entity);
    let is_structure = |entity: Entity| structure.contains(entity);
    let mut viewer = BevyViewer {
        camera,
        camera_transform,
        ray_cast: &mut ray_cast,
        frame: &frame,
        is_overlay: &is_overlay,
        is_structure: &is_structure,
    };

    if let Some(cursor) = window.cursor_position() {
        if tracker.last_cursor != Some(cursor) {
            tracker.last_cursor = Some(cursor);
            tracker.track_secondary(cursor);
            editor.on_pointer_move(cursor, &mut viewer);
        }

        if mouse_button.just_pressed(MouseButton::Right) {
            tracker.press_secondary(cursor);
        }
        if mouse_button.just_released(MouseButton::Right) && tracker.release_secondary(cursor) {
            editor.on_secondary_click();
        }

        if mouse_button.just_pressed(MouseButton::Left) && !capture.0 {
            editor.on_primary_click(cursor, &mut viewer);
        }
    }

    if keyboard.just_pressed(KeyCode::Escape) && focused_field.target.is_none() {
        editor.on_cancel_key();
    }

    editor.update_frame(&viewer);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_secondary_press_is_a_click() {
        let mut tracker = PointerTracker::default();
        tracker.press_secondary(Vec2::new(100.0, 100.0));
        tracker.track_secondary(Vec2::new(102.0, 101.0));
        assert!(tracker.release_secondary(Vec2::new(101.0, 100.0)));
    }

    #[test]
    fn dragging_beyond_tolerance_is_not_a_click() {
        let mut tracker = PointerTracker::default();
        tracker.press_secondary(Vec2::new(100.0, 100.0));
        tracker.track_secondary(Vec2::new(140.0, 100.0));
        // Returning to the start still counts as a drag.
        assert!(!tracker.release_secondary(Vec2::new(100.0, 100.0)));
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut tracker = PointerTracker::default();
        assert!(!tracker.release_secondary(Vec2::ZERO));
    }
}
