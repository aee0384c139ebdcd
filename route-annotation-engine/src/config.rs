use bevy::prelude::*;

use crate::annotation::Scope;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
const DEFAULT_MODELS_DIR: &str = "models";

/// Runtime configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Base URL of the line record backend.
    pub backend_url: String,
    /// Structure whose lines are edited.
    pub scope: Scope,
    /// Asset-relative directory holding per-structure manifests and models.
    pub models_dir: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            scope: Scope::new("demo", "main", "boulder"),
            models_dir: DEFAULT_MODELS_DIR.into(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `ROUTE_ENGINE_BACKEND_URL` | `http://localhost:8000` |
    /// | `ROUTE_ENGINE_SCOPE`       | `demo/main/boulder`     |
    /// | `ROUTE_ENGINE_MODELS_DIR`  | `models`                |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backend_url = lookup("ROUTE_ENGINE_BACKEND_URL")
            .filter(|url| !url.trim().is_empty())
            .unwrap_or(defaults.backend_url);

        let scope = match lookup("ROUTE_ENGINE_SCOPE") {
            Some(raw) => Scope::parse(&raw).unwrap_or_else(|| {
                warn!("ROUTE_ENGINE_SCOPE '{}' is not org/area/structure, using default", raw);
                defaults.scope.clone()
            }),
            None => defaults.scope,
        };

        let models_dir = lookup("ROUTE_ENGINE_MODELS_DIR")
            .map(|dir| dir.trim_end_matches('/').to_string())
            .filter(|dir| !dir.is_empty())
            .unwrap_or(defaults.models_dir);

        Self {
            backend_url,
            scope,
            models_dir,
        }
    }

    /// Asset path of the structure manifest for the configured scope.
    pub fn manifest_path(&self) -> String {
        format!(
            "{}/{}/{}/{}/structure.json",
            self.models_dir, self.scope.organization, self.scope.area, self.scope.structure
        )
    }

    /// Asset path of a file next to the structure manifest.
    pub fn structure_asset(&self, file: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.models_dir, self.scope.organization, self.scope.area, self.scope.structure, file
        )
    }
}
