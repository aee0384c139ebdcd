use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use constants::render_settings::{CENTER_VIEW_PITCH_DEG, FRAMING_RANGE_FACTOR};

use crate::tools::editor::AnnotationEditor;
use crate::tools::selection::CameraFraming;
use crate::tools::ui::FocusedField;

const MIN_RANGE: f32 = 1.0;
const MAX_RANGE: f32 = 5_000.0;
const PITCH_LIMIT: f32 = 1.55;
const FLIGHT_SPEED: f32 = 4.0;

/// Orbit camera around a focus point. Heading is measured clockwise from
/// north (`-Z`), pitch is negative when looking down.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct ViewportCamera {
    pub focus_point: Vec3,
    pub heading: f32,
    pub pitch: f32,
    pub range: f32,
    /// Framing being flown to, if any.
    pub flight: Option<CameraFraming>,
}

impl Default for ViewportCamera {
    fn default() -> Self {
        Self {
            focus_point: Vec3::ZERO,
            heading: 0.0,
            pitch: CENTER_VIEW_PITCH_DEG.to_radians(),
            range: 100.0,
            flight: None,
        }
    }
}

impl ViewportCamera {
    /// Looks at a sphere from the north-facing default angle.
    pub fn framing(center: Vec3, radius: f32) -> Self {
        Self {
            focus_point: center,
            range: (radius * FRAMING_RANGE_FACTOR).clamp(MIN_RANGE, MAX_RANGE),
            ..default()
        }
    }

    /// Unit view direction for the current heading and pitch.
    pub fn forward(&self) -> Vec3 {
        direction(self.heading, self.pitch)
    }

    pub fn eye(&self) -> Vec3 {
        self.focus_point - self.forward() * self.range
    }

    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.eye()).looking_to(self.forward(), Vec3::Y)
    }

    /// Starts an animated move to `framing`; input cancels it.
    pub fn fly_to(&mut self, framing: CameraFraming) {
        self.flight = Some(CameraFraming {
            range: framing.range.clamp(MIN_RANGE, MAX_RANGE),
            pitch: framing.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            ..framing
        });
    }

    /// Advances the flight by `t` (0..=1); returns true once arrived.
    pub fn step_flight(&mut self, t: f32) -> bool {
        let Some(target) = self.flight else {
            return true;
        };
        let t = t.clamp(0.0, 1.0);

        self.focus_point = self.focus_point.lerp(target.center, t);
        self.range += (target.range - self.range) * t;
        self.pitch += (target.pitch - self.pitch) * t;
        self.heading += shortest_angle(self.heading, target.heading) * t;

        let arrived = self.focus_point.distance(target.center) < 0.01
            && (self.range - target.range).abs() < 0.01
            && (self.pitch - target.pitch).abs() < 1e-3
            && shortest_angle(self.heading, target.heading).abs() < 1e-3;
        if arrived {
            self.focus_point = target.center;
            self.range = target.range;
            self.pitch = target.pitch;
            self.heading = target.heading.rem_euclid(std::f32::consts::TAU);
            self.flight = None;
        }
        arrived
    }
}

fn direction(heading: f32, pitch: f32) -> Vec3 {
    let (sin_h, cos_h) = heading.sin_cos();
    let (sin_p, cos_p) = pitch.sin_cos();
    Vec3::new(sin_h * cos_p, sin_p, -cos_h * cos_p)
}

fn shortest_angle(from: f32, to: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (to - from + PI).rem_euclid(TAU) - PI
}

/// Hands pending editor framing requests to the camera.
pub fn apply_camera_requests(
    mut editor: ResMut<AnnotationEditor>,
    mut viewport: ResMut<ViewportCamera>,
) {
    if let Some(framing) = editor.take_camera_request() {
        debug!("Flying to {:?}", framing);
        viewport.fly_to(framing);
    }
}

pub fn camera_controller(
    mut camera_query: Query<&mut Transform, With<Camera3d>>,
    mut viewport: ResMut<ViewportCamera>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    mut mouse_motion: EventReader<MouseMotion>,
    mut scroll_events: EventReader<MouseWheel>,
    keyboard: Res<ButtonInput<KeyCode>>,
    focused_field: Res<FocusedField>,
    time: Res<Time>,
) {
    let Ok(mut camera_transform) = camera_query.single_mut() else {
        return;
    };
    let mut user_input = false;

    // Mouse motion with right click (orbit)
    let mouse_delta: Vec2 = mouse_motion.read().map(|m| m.delta).sum();
    if mouse_button.pressed(MouseButton::Right) && mouse_delta != Vec2::ZERO {
        let heading_sens = 0.0035;
        let pitch_sens = 0.0030;
        viewport.heading -= mouse_delta.x * heading_sens;
        viewport.pitch = (viewport.pitch - mouse_delta.y * pitch_sens).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        user_input = true;
    }

    // Mouse wheel scroll accumulation (pixel and line scroll)
    let mut scroll_accum = 0.0;
    for ev in scroll_events.read() {
        scroll_accum += match ev.unit {
            MouseScrollUnit::Line => ev.y,
            MouseScrollUnit::Pixel => ev.y * 0.05,
        };
    }
    if scroll_accum.abs() > f32::EPSILON {
        let factor = (1.0 - scroll_accum * 0.1).clamp(0.5, 1.5);
        viewport.range = (viewport.range * factor).clamp(MIN_RANGE, MAX_RANGE);
        user_input = true;
    }

    // Arrow keys pan in the heading plane; blocked while typing.
    if focused_field.target.is_none() {
        let mut move_input = Vec3::ZERO;
        if keyboard.pressed(KeyCode::ArrowUp) {
            move_input.z += 1.0;
        }
        if keyboard.pressed(KeyCode::ArrowDown) {
            move_input.z -= 1.0;
        }
        if keyboard.pressed(KeyCode::ArrowRight) {
            move_input.x += 1.0;
        }
        if keyboard.pressed(KeyCode::ArrowLeft) {
            move_input.x -= 1.0;
        }
        if keyboard.pressed(KeyCode::PageUp) {
            move_input.y += 1.0;
        }
        if keyboard.pressed(KeyCode::PageDown) {
            move_input.y -= 1.0;
        }

        if move_input != Vec3::ZERO {
            let forward = direction(viewport.heading, 0.0);
            let right = forward.cross(Vec3::Y);

            // Adjust speed, shift = faster, ctrl = slower
            let mut speed = (viewport.range * 0.5).clamp(1.0, 200.0);
            if keyboard.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]) {
                speed *= 3.5;
            }
            if keyboard.any_pressed([KeyCode::ControlLeft, KeyCode::ControlRight]) {
                speed *= 0.25;
            }

            let world_delta = right * move_input.x + Vec3::Y * move_input.y + forward * move_input.z;
            viewport.focus_point += world_delta.normalize() * speed * time.delta_secs();
            user_input = true;
        }
    }

    if user_input {
        viewport.flight = None;
    } else if viewport.flight.is_some() {
        viewport.step_flight(FLIGHT_SPEED * time.delta_secs());
    }

    let target = viewport.transform();
    let lerp_speed = (12.0 * time.delta_secs()).min(1.0);
    camera_transform.translation = camera_transform.translation.lerp(target.translation, lerp_speed);
    camera_transform.rotation = camera_transform.rotation.slerp(target.rotation, lerp_speed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_zero_looks_north() {
        let camera = ViewportCamera {
            pitch: 0.0,
            ..default()
        };
        assert!(camera.forward().distance(Vec3::NEG_Z) < 1e-6);
        let east = ViewportCamera {
            heading: std::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            ..default()
        };
        assert!(east.forward().distance(Vec3::X) < 1e-6);
    }

    #[test]
    fn eye_sits_above_focus_when_pitched_down() {
        let camera = ViewportCamera::framing(Vec3::ZERO, 10.0);
        assert!((camera.range - 50.0).abs() < 1e-4);
        let eye = camera.eye();
        assert!(eye.y > 0.0);
        assert!((eye.length() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn flight_converges_and_wraps_heading_the_short_way() {
        let mut camera = ViewportCamera {
            heading: 0.1,
            ..default()
        };
        camera.fly_to(CameraFraming {
            center: Vec3::new(5.0, 1.0, -3.0),
            range: 30.0,
            heading: std::f32::consts::TAU - 0.1,
            pitch: -0.5,
        });

        camera.step_flight(0.5);
        assert!(camera.heading < 0.1, "moves through north, not around");

        let mut arrived = false;
        for _ in 0..200 {
            if camera.step_flight(0.5) {
                arrived = true;
                break;
            }
        }
        assert!(arrived);
        assert!(camera.flight.is_none());
        assert_eq!(camera.focus_point, Vec3::new(5.0, 1.0, -3.0));
    }
}
