use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;

use crate::annotation::{ProblemRecord, Scope};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote store answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("record has no remote id")]
    MissingId,
}

/// Remote collection of line records. Calls block; the engine runs them on
/// the IO task pool.
pub trait RemoteAnnotationStore: Send + Sync + 'static {
    fn list(&self, scope: &Scope) -> Result<Vec<ProblemRecord>, RemoteError>;

    /// Returns the stored record carrying its assigned id.
    fn create(&self, scope: &Scope, record: &ProblemRecord) -> Result<ProblemRecord, RemoteError>;

    fn update(&self, id: &str, record: &ProblemRecord) -> Result<(), RemoteError>;

    fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// URL layout of the `/api/v1` problem routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemRoutes {
    base_url: String,
}

impl ProblemRoutes {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `leaf` is `problems` for listing or `new-problem` for creation.
    pub fn scope_url(&self, scope: &Scope, leaf: &str) -> String {
        format!(
            "{}/api/v1/{}/{}/{}/{}",
            self.base_url, scope.organization, scope.area, scope.structure, leaf
        )
    }

    pub fn problem_url(&self, id: &str) -> String {
        format!("{}/api/v1/problem/{}", self.base_url, id)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            RemoteError::Decode(error.to_string())
        } else {
            RemoteError::Transport(error.to_string())
        }
    }
}

fn created_with_id(created: ProblemRecord) -> Result<ProblemRecord, RemoteError> {
    if created.id.is_none() {
        return Err(RemoteError::MissingId);
    }
    Ok(created)
}

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpAnnotationStore;

#[cfg(not(target_arch = "wasm32"))]
mod http {
    use bevy::log::debug;
    use reqwest::blocking::{Client, Response};

    use super::{ProblemRoutes, RemoteAnnotationStore, RemoteError, created_with_id};
    use crate::annotation::{ProblemRecord, Scope};

    /// Blocking JSON over HTTP, run on the IO task pool.
    pub struct HttpAnnotationStore {
        routes: ProblemRoutes,
        client: Client,
    }

    impl HttpAnnotationStore {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                routes: ProblemRoutes::new(base_url),
                client: Client::new(),
            }
        }

        fn check(response: Response) -> Result<Response, RemoteError> {
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let body = response.text().unwrap_or_default();
            Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    impl RemoteAnnotationStore for HttpAnnotationStore {
        fn list(&self, scope: &Scope) -> Result<Vec<ProblemRecord>, RemoteError> {
            let url = self.routes.scope_url(scope, "problems");
            debug!("GET {}", url);
            let response = Self::check(self.client.get(&url).send()?)?;
            Ok(response.json::<Vec<ProblemRecord>>()?)
        }

        fn create(
            &self,
            scope: &Scope,
            record: &ProblemRecord,
        ) -> Result<ProblemRecord, RemoteError> {
            let url = self.routes.scope_url(scope, "new-problem");
            debug!("POST {}", url);
            let response = Self::check(self.client.post(&url).json(record).send()?)?;
            created_with_id(response.json::<ProblemRecord>()?)
        }

        fn update(&self, id: &str, record: &ProblemRecord) -> Result<(), RemoteError> {
            let url = self.routes.problem_url(id);
            debug!("PUT {}", url);
            Self::check(self.client.put(&url).json(record).send()?)?;
            Ok(())
        }

        fn delete(&self, id: &str) -> Result<(), RemoteError> {
            let url = self.routes.problem_url(id);
            debug!("DELETE {}", url);
            Self::check(self.client.delete(&url).send()?)?;
            Ok(())
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use fetch::FetchAnnotationStore;

/// Browser builds go through the fetch-backed async client, driven by
/// `spawn_local` on the page's event loop.
#[cfg(target_arch = "wasm32")]
mod fetch {
    use bevy::log::debug;
    use reqwest::{Client, Response};

    use super::{ProblemRoutes, RemoteError, created_with_id};
    use crate::annotation::{ProblemRecord, Scope};

    pub struct FetchAnnotationStore {
        routes: ProblemRoutes,
        client: Client,
    }

    impl FetchAnnotationStore {
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                routes: ProblemRoutes::new(base_url),
                client: Client::new(),
            }
        }

        async fn check(response: Response) -> Result<Response, RemoteError> {
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            let body = response.text().await.unwrap_or_default();
            Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            })
        }

        pub async fn list(&self, scope: &Scope) -> Result<Vec<ProblemRecord>, RemoteError> {
            let url = self.routes.scope_url(scope, "problems");
            debug!("GET {}", url);
            let response = Self::check(self.client.get(&url).send().await?).await?;
            Ok(response.json::<Vec<ProblemRecord>>().await?)
        }

        pub async fn create(
            &self,
            scope: &Scope,
            record: &ProblemRecord,
        ) -> Result<ProblemRecord, RemoteError> {
            let url = self.routes.scope_url(scope, "new-problem");
            debug!("POST {}", url);
            let response = Self::check(self.client.post(&url).json(record).send().await?).await?;
            created_with_id(response.json::<ProblemRecord>().await?)
        }

        pub async fn update(&self, id: &str, record: &ProblemRecord) -> Result<(), RemoteError> {
            let url = self.routes.problem_url(id);
            debug!("PUT {}", url);
            Self::check(self.client.put(&url).json(record).send().await?).await?;
            Ok(())
        }

        pub async fn delete(&self, id: &str) -> Result<(), RemoteError> {
            let url = self.routes.problem_url(id);
            debug!("DELETE {}", url);
            Self::check(self.client.delete(&url).send().await?).await?;
            Ok(())
        }
    }
}

/// Process-local store for tests and headless runs.
#[derive(Debug, Default)]
pub struct InMemoryAnnotationStore {
    scopes: Mutex<HashMap<Scope, Vec<ProblemRecord>>>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

impl InMemoryAnnotationStore {
    pub fn with_records(scope: Scope, records: Vec<ProblemRecord>) -> Self {
        let store = Self::default();
        if let Ok(mut scopes) = store.scopes.lock() {
            scopes.insert(scope, records);
        }
        store
    }

    /// Every call fails with a transport error while set.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn records(&self, scope: &Scope) -> Vec<ProblemRecord> {
        self.scopes
            .lock()
            .ok()
            .and_then(|scopes| scopes.get(scope).cloned())
            .unwrap_or_default()
    }

    fn guard(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("store unavailable".into()));
        }
        Ok(())
    }

    fn with_scopes<T>(
        &self,
        f: impl FnOnce(&mut HashMap<Scope, Vec<ProblemRecord>>) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        self.guard()?;
        let mut scopes = self
            .scopes
            .lock()
            .map_err(|_| RemoteError::Transport("store lock poisoned".into()))?;
        f(&mut scopes)
    }

    fn not_found(id: &str) -> RemoteError {
        RemoteError::Status {
            status: 404,
            body: format!("problem {id} not found"),
        }
    }
}

impl RemoteAnnotationStore for InMemoryAnnotationStore {
    fn list(&self, scope: &Scope) -> Result<Vec<ProblemRecord>, RemoteError> {
        self.with_scopes(|scopes| Ok(scopes.get(scope).cloned().unwrap_or_default()))
    }

    fn create(&self, scope: &Scope, record: &ProblemRecord) -> Result<ProblemRecord, RemoteError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.with_scopes(|scopes| {
            let created = ProblemRecord {
                id: Some(format!("mem-{id}")),
                ..record.clone()
            };
            scopes.entry(scope.clone()).or_default().push(created.clone());
            Ok(created)
        })
    }

    fn update(&self, id: &str, record: &ProblemRecord) -> Result<(), RemoteError> {
        self.with_scopes(|scopes| {
            let stored = scopes
                .values_mut()
                .flat_map(|records| records.iter_mut())
                .find(|stored| stored.id.as_deref() == Some(id))
                .ok_or_else(|| Self::not_found(id))?;
            *stored = ProblemRecord {
                id: Some(id.to_string()),
                ..record.clone()
            };
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.with_scopes(|scopes| {
            for records in scopes.values_mut() {
                if let Some(index) = records.iter().position(|r| r.id.as_deref() == Some(id)) {
                    records.remove(index);
                    return Ok(());
                }
            }
            Err(Self::not_found(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn scope() -> Scope {
        Scope::new("acme", "north", "block-a")
    }

    #[test]
    fn create_assigns_ids_and_lists_back() {
        let store = InMemoryAnnotationStore::default();
        let created = store
            .create(&scope(), &ProblemRecord { name: "a".into(), ..Default::default() })
            .expect("create");

        assert!(created.id.is_some());
        let listed = store.list(&scope()).expect("list");
        assert_eq!(listed, vec![created]);
        assert!(store.list(&Scope::new("x", "y", "z")).expect("list").is_empty());
    }

    #[test]
    fn update_and_delete_unknown_ids_are_404() {
        let store = InMemoryAnnotationStore::default();
        assert_matches!(
            store.update("nope", &ProblemRecord::default()),
            Err(RemoteError::Status { status: 404, .. })
        );
        assert_matches!(store.delete("nope"), Err(RemoteError::Status { status: 404, .. }));
    }

    #[test]
    fn routes_follow_the_problem_api_layout() {
        let routes = ProblemRoutes::new("https://api.example.org/");
        assert_eq!(
            routes.scope_url(&scope(), "problems"),
            "https://api.example.org/api/v1/acme/north/block-a/problems"
        );
        assert_eq!(
            routes.scope_url(&scope(), "new-problem"),
            "https://api.example.org/api/v1/acme/north/block-a/new-problem"
        );
        assert_eq!(
            routes.problem_url("r7"),
            "https://api.example.org/api/v1/problem/r7"
        );
    }

    #[test]
    fn created_records_must_carry_an_id() {
        assert_matches!(
            created_with_id(ProblemRecord::default()),
            Err(RemoteError::MissingId)
        );
        let stored = ProblemRecord { id: Some("r1".into()), ..Default::default() };
        assert_matches!(created_with_id(stored), Ok(record) if record.id.as_deref() == Some("r1"));
    }

    #[test]
    fn failing_store_reports_transport_errors() {
        let store = InMemoryAnnotationStore::default();
        store.set_failing(true);
        assert_matches!(store.list(&scope()), Err(RemoteError::Transport(_)));
    }
}
