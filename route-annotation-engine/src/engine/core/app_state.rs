use bevy::prelude::*;

use crate::engine::loading::progress::LoadingProgress;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, States)]
pub enum AppState {
    #[default]
    Loading,
    Running,
}

// Final transition to running state
pub fn transition_to_running(
    loading_progress: Res<LoadingProgress>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    if loading_progress.manifest_resolved {
        if loading_progress.manifest_failed {
            warn!("→ Running without a structure manifest");
        } else {
            info!("→ Structure ready, transitioning to Running state");
        }
        next_state.set(AppState::Running);
    }
}
