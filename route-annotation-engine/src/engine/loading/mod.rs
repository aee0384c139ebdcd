//! Structure loading: manifest parsing, frame setup and model spawning.

/// Structure manifest loading, camera framing and model spawn.
///
/// Tags the model's meshes so structure ray casts can target them.
pub mod manifest_loader;

/// Loading progress tracking resource for state transitions.
pub mod progress;
