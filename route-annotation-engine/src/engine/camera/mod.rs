//! Orbit camera around the structure with animated re-framing.

/// Viewport camera resource, controller and fly-to requests.
pub mod viewport_camera;
