//! Bevy side of the engine: application setup, structure loading, camera and
//! the systems that mirror the annotation scene graph into entities.

/// Asset types loaded from JSON.
pub mod assets;

/// Orbit camera and fly-to animation.
pub mod camera;

/// Application setup, state machine and window configuration.
pub mod core;

/// Structure manifest and model loading.
pub mod loading;

/// Scene graph to entity synchronisation for lines, labels and markers.
pub mod scene_sync;

/// Viewer abstraction over camera projection and ray casts.
pub mod viewer;
