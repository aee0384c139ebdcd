//! Asset types loaded from JSON alongside the structure models.

/// Per-structure manifest: geodetic origin, model file and bounding sphere.
pub mod structure_manifest;
