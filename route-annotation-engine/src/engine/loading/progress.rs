use bevy::prelude::*;

#[derive(Resource, Default)]
pub struct LoadingProgress {
    pub manifest_resolved: bool,
    pub manifest_failed: bool,
    pub model_requested: bool,
}
