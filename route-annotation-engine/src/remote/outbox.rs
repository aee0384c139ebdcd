use crate::annotation::{AnnotationId, ProblemRecord, Scope};

#[cfg(target_arch = "wasm32")]
use super::client::FetchAnnotationStore;
use super::client::{RemoteAnnotationStore, RemoteError};

/// Pending remote operation produced by an editor mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    List {
        scope: Scope,
    },
    Create {
        local: AnnotationId,
        scope: Scope,
        record: ProblemRecord,
    },
    Update {
        local: AnnotationId,
        remote_id: String,
        record: ProblemRecord,
        user_initiated: bool,
    },
    Delete {
        local: AnnotationId,
        remote_id: String,
        user_initiated: bool,
    },
}

/// Completed remote operation, applied back onto the editor.
#[derive(Debug)]
pub enum PersistOutcome {
    Listed {
        scope: Scope,
        result: Result<Vec<ProblemRecord>, RemoteError>,
    },
    Created {
        local: AnnotationId,
        result: Result<ProblemRecord, RemoteError>,
    },
    Updated {
        local: AnnotationId,
        user_initiated: bool,
        result: Result<(), RemoteError>,
    },
    Deleted {
        local: AnnotationId,
        remote_id: String,
        user_initiated: bool,
        result: Result<(), RemoteError>,
    },
}

/// Operations queued since the last dispatch, in mutation order.
#[derive(Debug, Default)]
pub struct PersistenceOutbox {
    ops: Vec<PersistOp>,
}

impl PersistenceOutbox {
    pub fn push(&mut self, op: PersistOp) {
        self.ops.push(op);
    }

    pub fn drain(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn pending(&self) -> &[PersistOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Runs one operation to completion against `store`.
pub fn execute(store: &dyn RemoteAnnotationStore, op: PersistOp) -> PersistOutcome {
    match op {
        PersistOp::List { scope } => {
            let result = store.list(&scope);
            PersistOutcome::Listed { scope, result }
        }
        PersistOp::Create {
            local,
            scope,
            record,
        } => PersistOutcome::Created {
            local,
            result: store.create(&scope, &record),
        },
        PersistOp::Update {
            local,
            remote_id,
            record,
            user_initiated,
        } => PersistOutcome::Updated {
            local,
            user_initiated,
            result: store.update(&remote_id, &record),
        },
        PersistOp::Delete {
            local,
            remote_id,
            user_initiated,
        } => {
            let result = store.delete(&remote_id);
            PersistOutcome::Deleted {
                local,
                remote_id,
                user_initiated,
                result,
            }
        }
    }
}

/// Runs one operation against the browser fetch client.
#[cfg(target_arch = "wasm32")]
pub async fn execute_fetch(store: &FetchAnnotationStore, op: PersistOp) -> PersistOutcome {
    match op {
        PersistOp::List { scope } => {
            let result = store.list(&scope).await;
            PersistOutcome::Listed { scope, result }
        }
        PersistOp::Create {
            local,
            scope,
            record,
        } => PersistOutcome::Created {
            local,
            result: store.create(&scope, &record).await,
        },
        PersistOp::Update {
            local,
            remote_id,
            record,
            user_initiated,
        } => PersistOutcome::Updated {
            local,
            user_initiated,
            result: store.update(&remote_id, &record).await,
        },
        PersistOp::Delete {
            local,
            remote_id,
            user_initiated,
        } => {
            let result = store.delete(&remote_id).await;
            PersistOutcome::Deleted {
                local,
                remote_id,
                user_initiated,
                result,
            }
        }
    }
}
