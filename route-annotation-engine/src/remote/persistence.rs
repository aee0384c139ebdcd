use std::sync::Arc;
#[cfg(target_arch = "wasm32")]
use std::sync::Mutex;

use bevy::prelude::*;
#[cfg(not(target_arch = "wasm32"))]
use bevy::tasks::{IoTaskPool, Task, block_on, futures_lite::future};

#[cfg(target_arch = "wasm32")]
use super::client::FetchAnnotationStore;
#[cfg(not(target_arch = "wasm32"))]
use super::client::RemoteAnnotationStore;
use super::outbox::PersistOutcome;
#[cfg(not(target_arch = "wasm32"))]
use super::outbox::execute;
#[cfg(target_arch = "wasm32")]
use super::outbox::execute_fetch;
use crate::engine::core::app_state::AppState;
use crate::tools::editor::AnnotationEditor;

/// Shared handle to the configured remote store.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Resource, Clone)]
pub struct RemoteStoreHandle(pub Arc<dyn RemoteAnnotationStore>);

#[cfg(target_arch = "wasm32")]
#[derive(Resource, Clone)]
pub struct RemoteStoreHandle(pub Arc<FetchAnnotationStore>);

/// Remote calls in flight. Native builds hold IO pool tasks; browser builds
/// collect finished outcomes from `spawn_local` futures in a shared inbox.
#[derive(Resource, Default)]
pub struct PendingRequests {
    #[cfg(not(target_arch = "wasm32"))]
    tasks: Vec<Task<PersistOutcome>>,
    #[cfg(target_arch = "wasm32")]
    inbox: Arc<Mutex<Vec<PersistOutcome>>>,
    #[cfg(target_arch = "wasm32")]
    in_flight: usize,
}

impl PendingRequests {
    #[cfg(not(target_arch = "wasm32"))]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[cfg(target_arch = "wasm32")]
    pub fn len(&self) -> usize {
        self.in_flight
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct PersistencePlugin;

impl Plugin for PersistencePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PendingRequests>()
            .add_systems(OnEnter(AppState::Running), request_initial_listing)
            .add_systems(
                Update,
                (dispatch_persistence_requests, poll_persistence_requests)
                    .chain()
                    .run_if(in_state(AppState::Running)),
            );
    }
}

fn request_initial_listing(mut editor: ResMut<AnnotationEditor>) {
    info!("Requesting lines for {}", editor.scope());
    editor.request_reload();
}

/// Moves every queued operation onto the IO task pool.
#[cfg(not(target_arch = "wasm32"))]
pub fn dispatch_persistence_requests(
    mut editor: ResMut<AnnotationEditor>,
    remote: Res<RemoteStoreHandle>,
    mut pending: ResMut<PendingRequests>,
) {
    if editor.outbox().is_empty() {
        return;
    }

    let pool = IoTaskPool::get();
    for op in editor.take_outbox() {
        let store = remote.0.clone();
        debug!("Dispatching {:?}", op);
        pending
            .tasks
            .push(pool.spawn(async move { execute(store.as_ref(), op) }));
    }
}

/// Applies finished calls to the editor in completion order.
#[cfg(not(target_arch = "wasm32"))]
pub fn poll_persistence_requests(
    mut editor: ResMut<AnnotationEditor>,
    mut pending: ResMut<PendingRequests>,
) {
    if pending.tasks.is_empty() {
        return;
    }

    let mut finished = Vec::new();
    pending.tasks.retain_mut(|task| {
        match block_on(future::poll_once(task)) {
            Some(outcome) => {
                finished.push(outcome);
                false
            }
            None => true,
        }
    });

    for outcome in finished {
        editor.apply_outcome(outcome);
    }
}

/// Starts every queued operation as a browser future.
#[cfg(target_arch = "wasm32")]
pub fn dispatch_persistence_requests(
    mut editor: ResMut<AnnotationEditor>,
    remote: Res<RemoteStoreHandle>,
    mut pending: ResMut<PendingRequests>,
) {
    if editor.outbox().is_empty() {
        return;
    }

    for op in editor.take_outbox() {
        let store = remote.0.clone();
        let inbox = pending.inbox.clone();
        pending.in_flight += 1;
        debug!("Dispatching {:?}", op);
        wasm_bindgen_futures::spawn_local(async move {
            let outcome = execute_fetch(&store, op).await;
            if let Ok(mut inbox) = inbox.lock() {
                inbox.push(outcome);
            }
        });
    }
}

/// Applies finished calls to the editor in completion order.
#[cfg(target_arch = "wasm32")]
pub fn poll_persistence_requests(
    mut editor: ResMut<AnnotationEditor>,
    mut pending: ResMut<PendingRequests>,
) {
    if pending.in_flight == 0 {
        return;
    }

    let finished = match pending.inbox.lock() {
        Ok(mut inbox) => std::mem::take(&mut *inbox),
        Err(_) => {
            warn!("Persistence inbox poisoned");
            return;
        }
    };
    pending.in_flight = pending.in_flight.saturating_sub(finished.len());

    for outcome in finished {
        editor.apply_outcome(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{ProblemRecord, Scope};
    use crate::remote::client::InMemoryAnnotationStore;
    use bevy::tasks::TaskPool;
    use constants::coordinate_system::GeoFrame;

    fn scope() -> Scope {
        Scope::new("acme", "north", "block-a")
    }

    #[test]
    fn listing_round_trips_through_the_task_pool() {
        IoTaskPool::get_or_init(TaskPool::new);

        let frame = GeoFrame::default();
        let record = ProblemRecord {
            id: Some("r1".into()),
            name: "Slab".into(),
            positions: vec![
                frame.world_to_geodetic(Vec3::ZERO),
                frame.world_to_geodetic(Vec3::Y),
            ],
            ..Default::default()
        };
        let remote = InMemoryAnnotationStore::with_records(scope(), vec![record]);

        let mut app = App::new();
        app.insert_resource(AnnotationEditor::new(scope(), frame))
            .insert_resource(RemoteStoreHandle(Arc::new(remote)))
            .init_resource::<PendingRequests>()
            .add_systems(
                Update,
                (dispatch_persistence_requests, poll_persistence_requests).chain(),
            );

        app.world_mut().resource_mut::<AnnotationEditor>().request_reload();
        for _ in 0..100 {
            app.update();
            if app.world().resource::<PendingRequests>().is_empty()
                && !app.world().resource::<AnnotationEditor>().store().is_empty()
            {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }

        let editor = app.world().resource::<AnnotationEditor>();
        assert_eq!(editor.store().len(), 1);
        assert!(editor.store().find_by_remote_id("r1").is_some());
    }
}
