pub mod catalog;
pub mod delete_file;
pub mod get_file;
pub mod list_commits;
pub mod list_contents;
pub mod put_file;
pub mod search_code;

use crate::{
    config::GitHub,
    docroot::{resolver::options_for, DocrootResolver, DocumentCatalogService, OperationKind, PathCheck, ValidateOptions},
    errors::{AppError, AppResult},
    store::DynStore,
};
use serde::{de::DeserializeOwned, Deserialize};
use std::sync::Arc;
use std::time::Duration;

/// Shared state every tool works against.
pub struct ToolContext {
    pub store: DynStore,
    pub resolver: DocrootResolver,
    pub catalog: DocumentCatalogService,
    pub default_owner: Option<String>,
    pub default_repo: Option<String>,
}

pub type SharedContext = Arc<ToolContext>;

impl ToolContext {
    pub fn new(github: &GitHub, ttl: Duration, store: DynStore) -> Self {
        let server_default = github.default_docroot.clone();
        Self {
            resolver: DocrootResolver::new(store.clone(), server_default.clone(), ttl),
            catalog: DocumentCatalogService::new(store.clone(), server_default, ttl),
            store,
            default_owner: github.default_owner.clone(),
            default_repo: github.default_repo.clone(),
        }
    }

    pub fn target(&self, params: &RepoParams) -> AppResult<(String, String)> {
        let owner = params.owner.clone().or_else(|| self.default_owner.clone());
        let repo = params.repo.clone().or_else(|| self.default_repo.clone());
        match (owner, repo) {
            (Some(o), Some(r)) if !o.is_empty() && !r.is_empty() => Ok((o, r)),
            _ => Err(AppError::ToolError(
                "Repository owner and name are required. Please specify owner and repo, or configure defaults.".into(),
            )),
        }
    }

    /// Maps `path` into the repository and enforces the docroot and dot-file policy.
    ///
    /// Returns the repository path to operate on.
    pub async fn scoped_path(&self, owner: &str, repo: &str, path: &str, scope: ScopeParams, operation: OperationKind) -> AppResult<(String, PathCheck)> {
        let opts = scope.options(operation);
        let (full, check) = self.resolver.scope_path(owner, repo, path, opts).await;
        if !check.validation.valid {
            tracing::info!(owner, repo, path = %full, docroot = %check.docroot, reason = ?check.validation.reason, "path rejected");
            let reason = check.validation.reason.unwrap_or(crate::docroot::RejectReason::OutsideDocroot);
            let message = check.validation.error.clone().unwrap_or_default();
            return Err(AppError::PathRejected { reason, message });
        }
        Ok((full, check))
    }

    pub fn clear_caches(&self, owner: Option<&str>, repo: Option<&str>) {
        self.resolver.clear_cache(owner, repo);
        self.catalog.clear_cache(owner, repo);
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RepoParams {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub repo: Option<String>,
}

/// The two per-call overrides accepted by every path-taking tool.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct ScopeParams {
    #[serde(default)]
    pub ignore_docroot: bool,
    #[serde(default)]
    pub allow_dotfiles: bool,
}

impl ScopeParams {
    pub fn options(self, operation: OperationKind) -> ValidateOptions {
        options_for(operation, self.ignore_docroot, self.allow_dotfiles)
    }
}

pub fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> AppResult<T> {
    let params = if params.is_null() { serde_json::json!({}) } else { params };
    serde_json::from_value(params).map_err(|e| AppError::ToolError(format!("invalid params: {e}")))
}

fn default_per_page() -> u32 {
    10
}

/// JSON-schema fragment for the properties shared by all repository tools.
fn common_properties() -> serde_json::Value {
    serde_json::json!({
        "owner": {"type": "string"},
        "repo": {"type": "string"},
        "ignore_docroot": {"type": "boolean", "description": "Bypass the docroot for this call"},
        "allow_dotfiles": {"type": "boolean", "description": "Allow paths with dot-prefixed components"}
    })
}

fn schema(required: &[&str], extra: serde_json::Value) -> serde_json::Value {
    let mut props = common_properties();
    if let (Some(props), Some(extra)) = (props.as_object_mut(), extra.as_object()) {
        props.extend(extra.clone());
    }
    serde_json::json!({"type": "object", "required": required, "properties": props})
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::docroot::cache::DEFAULT_TTL;
    use crate::store::memory::MemoryStore;

    /// Context over `store` with `acme/handbook` as the default repository.
    pub fn context(store: impl Into<Arc<MemoryStore>>, server_default: Option<&str>) -> SharedContext {
        let github = GitHub {
            default_owner: Some("acme".into()),
            default_repo: Some("handbook".into()),
            default_docroot: server_default.map(str::to_string),
            ..GitHub::default()
        };
        let store: Arc<MemoryStore> = store.into();
        Arc::new(ToolContext::new(&github, DEFAULT_TTL, store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Params {
        path: String,
        #[serde(flatten)]
        scope: ScopeParams,
    }

    #[test]
    fn parse_params_reports_missing_fields() {
        let err = parse_params::<Params>(json!({})).unwrap_err();
        assert!(matches!(err, AppError::ToolError(msg) if msg.contains("path")));
    }

    #[test]
    fn scope_flags_default_to_false() {
        let p: Params = parse_params(json!({"path": "a.md"})).unwrap();
        assert_eq!(p.path, "a.md");
        assert!(!p.scope.ignore_docroot && !p.scope.allow_dotfiles);
        let p: Params = parse_params(json!({"path": "a.md", "ignore_docroot": true})).unwrap();
        assert!(p.scope.ignore_docroot);
    }

    #[test]
    fn schema_merges_common_properties() {
        let s = schema(&["path"], json!({"path": {"type": "string"}}));
        assert_eq!(s["required"], json!(["path"]));
        assert!(s["properties"]["ignore_docroot"].is_object());
        assert!(s["properties"]["path"].is_object());
    }
}
