use super::path_validator::{self, normalize_docroot, OperationKind, ValidateOptions, ValidationResult};
use super::repo_config::{RepoConfig, RepoConfigLoader};
use crate::store::DynStore;
use serde::Serialize;
use std::time::Duration;

/// Where an effective docroot came from, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocrootSource {
    Ignored,
    ToolParameter,
    RepoConfig,
    ServerDefault,
    RepositoryRoot,
}

impl DocrootSource {
    pub fn describe(&self) -> &'static str {
        match self {
            DocrootSource::Ignored => "ignored for this call",
            DocrootSource::ToolParameter => "tool parameter",
            DocrootSource::RepoConfig => "repository .mcp-config.json",
            DocrootSource::ServerDefault => "server default",
            DocrootSource::RepositoryRoot => "repository root (default)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDocroot {
    pub docroot: String,
    pub source: DocrootSource,
}

impl ResolvedDocroot {
    fn new(docroot: impl Into<String>, source: DocrootSource) -> Self {
        Self { docroot: docroot.into(), source }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions<'a> {
    /// Explicit per-call boundary, e.g. the catalog tool's `path`.
    pub tool_param: Option<&'a str>,
    pub ignore_docroot: bool,
}

/// Validation outcome plus the docroot it was checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathCheck {
    #[serde(flatten)]
    pub validation: ValidationResult,
    pub docroot: String,
    pub source: DocrootSource,
}

/// Applies the priority chain once the repository config is known.
///
/// Callers that short-circuit (ignore flag, explicit parameter) never need the config, so it is
/// supplied lazily through `repo_config`.
pub async fn resolve_with<F, Fut>(
    opts: ResolveOptions<'_>,
    server_default: Option<&str>,
    repo_config: F,
) -> ResolvedDocroot
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = RepoConfig>,
{
    if opts.ignore_docroot {
        return ResolvedDocroot::new("", DocrootSource::Ignored);
    }
    if let Some(param) = opts.tool_param.filter(|p| !p.is_empty()) {
        let docroot = normalize_docroot(Some(param)).unwrap_or_default();
        return ResolvedDocroot::new(docroot, DocrootSource::ToolParameter);
    }
    if let Some(docroot) = normalize_docroot(repo_config().await.docroot.as_deref()) {
        return ResolvedDocroot::new(docroot, DocrootSource::RepoConfig);
    }
    if let Some(docroot) = normalize_docroot(server_default.filter(|d| !d.is_empty())) {
        return ResolvedDocroot::new(docroot, DocrootSource::ServerDefault);
    }
    ResolvedDocroot::new("", DocrootSource::RepositoryRoot)
}

/// Resolves per-repository docroots and validates paths against them.
pub struct DocrootResolver {
    configs: RepoConfigLoader,
    server_default: Option<String>,
}

impl DocrootResolver {
    pub fn new(store: DynStore, server_default: Option<String>, ttl: Duration) -> Self {
        Self { configs: RepoConfigLoader::new(store, ttl), server_default }
    }

    pub async fn load_repo_config(&self, owner: &str, repo: &str) -> RepoConfig {
        self.configs.load(owner, repo).await
    }

    pub async fn resolve_docroot(&self, owner: &str, repo: &str, opts: ResolveOptions<'_>) -> ResolvedDocroot {
        let resolved = resolve_with(opts, self.server_default.as_deref(), || self.load_repo_config(owner, repo)).await;
        tracing::debug!(owner, repo, docroot = %resolved.docroot, source = ?resolved.source, "resolved docroot");
        resolved
    }

    pub async fn validate_path(&self, owner: &str, repo: &str, path: &str, opts: ValidateOptions) -> PathCheck {
        let resolved = self
            .resolve_docroot(owner, repo, ResolveOptions { tool_param: None, ignore_docroot: opts.ignore_docroot })
            .await;
        let validation = path_validator::validate_path(path, Some(resolved.docroot.as_str()), opts);
        PathCheck { validation, docroot: resolved.docroot, source: resolved.source }
    }

    /// Resolves the docroot, maps a docroot-relative `path` onto the repository and validates it.
    ///
    /// Returns the repository path alongside the check so tools can act on it directly.
    pub async fn scope_path(&self, owner: &str, repo: &str, path: &str, opts: ValidateOptions) -> (String, PathCheck) {
        let resolved = self
            .resolve_docroot(owner, repo, ResolveOptions { tool_param: None, ignore_docroot: opts.ignore_docroot })
            .await;
        let full = path_validator::construct_full_path(path, &resolved.docroot, opts.ignore_docroot);
        // Second resolution is served from the config cache.
        let check = self.validate_path(owner, repo, &full, opts).await;
        (full, check)
    }

    pub fn clear_cache(&self, owner: Option<&str>, repo: Option<&str>) {
        self.configs.clear_cache(owner, repo);
    }
}

/// Convenience for call sites that only know the operation.
pub fn options_for(operation: OperationKind, ignore_docroot: bool, allow_dotfiles: bool) -> ValidateOptions {
    ValidateOptions { ignore_docroot, allow_dotfiles, operation }
}
