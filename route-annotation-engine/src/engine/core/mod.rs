//! Core application setup and state management.
//!
//! Handles application lifecycle, window configuration, state transitions,
//! and plugin initialisation for both native and WASM targets.

/// Application setup and plugin configuration.
///
/// Creates the main app with structure loading, annotation tools, persistence
/// and platform-specific configurations.
pub mod app_setup;

/// Application state machine from manifest loading to runtime execution.
pub mod app_state;

/// Platform-specific window configuration for native and WASM builds.
///
/// Configures canvas integration for web targets and vsync settings.
pub mod window_config;
