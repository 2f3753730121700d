use super::cache::{RepoKey, TtlCache};
use super::path_validator::normalize_docroot;
use crate::store::DynStore;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::time::Duration;

/// Well-known location of the per-repository policy file.
pub const REPO_CONFIG_PATH: &str = ".mcp-config.json";

/// Policy committed to a repository. `None` fields defer to the next source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepoConfig {
    pub docroot: Option<String>,
    pub include_extensions: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    mcp: Option<McpSection>,
}

#[derive(Deserialize)]
struct McpSection {
    #[serde(default)]
    docroot: Option<String>,
    #[serde(default)]
    include_extensions: Option<Vec<String>>,
}

pub fn parse_repo_config(raw: &[u8]) -> Result<RepoConfig, serde_json::Error> {
    let file: ConfigFile = serde_json::from_slice(raw)?;
    let Some(mcp) = file.mcp else {
        return Ok(RepoConfig::default());
    };
    Ok(RepoConfig {
        docroot: normalize_docroot(mcp.docroot.as_deref()),
        include_extensions: mcp.include_extensions,
    })
}

/// Outcome of looking up a repository's config file.
///
/// Only `Present` carries policy; the other two behave like an empty config but stay
/// distinguishable for logging and callers that want to fail closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoConfigLookup {
    Present(RepoConfig),
    Absent,
    Invalid(String),
}

impl RepoConfigLookup {
    pub fn config(&self) -> RepoConfig {
        match self {
            RepoConfigLookup::Present(cfg) => cfg.clone(),
            RepoConfigLookup::Absent | RepoConfigLookup::Invalid(_) => RepoConfig::default(),
        }
    }
}

/// Fetches `.mcp-config.json` and caches the outcome, including absence, per repository.
pub struct RepoConfigLoader {
    store: DynStore,
    cache: TtlCache<RepoKey, RepoConfigLookup>,
}

impl RepoConfigLoader {
    pub fn new(store: DynStore, ttl: Duration) -> Self {
        Self { store, cache: TtlCache::new(ttl) }
    }

    pub async fn lookup(&self, owner: &str, repo: &str) -> RepoConfigLookup {
        let key = RepoKey::new(owner, repo);
        let result: Result<_, Infallible> = self
            .cache
            .get_or_try_insert_with(key, || async { Ok(self.fetch(owner, repo).await) })
            .await;
        result.unwrap_or_else(|never| match never {})
    }

    pub async fn load(&self, owner: &str, repo: &str) -> RepoConfig {
        self.lookup(owner, repo).await.config()
    }

    pub fn clear_cache(&self, owner: Option<&str>, repo: Option<&str>) {
        self.cache.clear_matching(owner, repo);
    }

    async fn fetch(&self, owner: &str, repo: &str) -> RepoConfigLookup {
        tracing::debug!(owner, repo, "repo config cache miss");
        match self.store.fetch_config(owner, repo).await {
            Ok(raw) => match parse_repo_config(&raw) {
                Ok(cfg) => RepoConfigLookup::Present(cfg),
                Err(e) => {
                    tracing::warn!(owner, repo, error = %e, "ignoring malformed .mcp-config.json");
                    RepoConfigLookup::Invalid(e.to_string())
                }
            },
            Err(e) if e.is_not_found() => RepoConfigLookup::Absent,
            Err(e) => {
                tracing::warn!(owner, repo, error = %e, "could not fetch .mcp-config.json; treating as absent");
                RepoConfigLookup::Invalid(e.to_string())
            }
        }
    }
}
