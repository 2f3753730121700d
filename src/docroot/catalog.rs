//! Lightweight, cached index of the documents under a repository's docroot.
//!
//! One recursive tree listing is fetched per (repository, docroot, extensions, branch) and reused
//! for the cache TTL. Paths in the result are relative to the docroot and sorted, so callers can
//! diff catalogs between calls.

use super::cache::{RepoScoped, TtlCache};
use super::path_validator::{has_dot_components, is_path_in_docroot, normalize_path, parent_folder};
use super::repo_config::RepoConfigLoader;
use super::resolver::{resolve_with, DocrootSource, ResolveOptions};
use crate::store::{DynStore, EntryKind, StoreError, TreeEntry, TreeListing};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_EXTENSIONS: [&str; 2] = [".md", ".txt"];
pub const DEFAULT_BRANCH: &str = "main";
pub const FALLBACK_BRANCH: &str = "master";

#[derive(Debug, Clone, Default)]
pub struct CatalogRequest {
    /// Explicit boundary; wins over repo config and server default.
    pub path: Option<String>,
    pub include_extensions: Option<Vec<String>>,
    pub branch: Option<String>,
    pub ignore_docroot: bool,
    pub allow_dotfiles: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogFile {
    /// Relative to the catalog's docroot.
    pub path: String,
    pub name: String,
    pub folder: String,
    pub size: u64,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogStatistics {
    pub total_files: usize,
    pub total_folders: usize,
    pub total_size_bytes: u64,
    pub total_size_human: String,
    pub file_types: BTreeMap<String, usize>,
    /// The upstream tree listing was cut short, so `files` is incomplete.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Catalog {
    pub repository: String,
    pub branch: String,
    pub docroot: String,
    pub docroot_source: DocrootSource,
    pub indexed_at: DateTime<Utc>,
    pub cache_expires_at: DateTime<Utc>,
    pub statistics: CatalogStatistics,
    pub files: Vec<CatalogFile>,
}

#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Failed to build catalog: {source}")]
    TreeFetch {
        branch: String,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CatalogKey {
    owner: String,
    repo: String,
    docroot: String,
    extensions: Vec<String>,
    branch: Option<String>,
    allow_dotfiles: bool,
}

impl RepoScoped for CatalogKey {
    fn owner(&self) -> &str {
        &self.owner
    }
    fn repo(&self) -> &str {
        &self.repo
    }
}

pub struct DocumentCatalogService {
    store: DynStore,
    configs: RepoConfigLoader,
    catalogs: TtlCache<CatalogKey, Arc<Catalog>, CatalogError>,
    server_default: Option<String>,
}

impl DocumentCatalogService {
    pub fn new(store: DynStore, server_default: Option<String>, ttl: Duration) -> Self {
        Self {
            configs: RepoConfigLoader::new(store.clone(), ttl),
            store,
            catalogs: TtlCache::new(ttl),
            server_default,
        }
    }

    pub async fn build_catalog(&self, owner: &str, repo: &str, req: &CatalogRequest) -> Result<Arc<Catalog>, CatalogError> {
        let opts = ResolveOptions { tool_param: req.path.as_deref(), ignore_docroot: req.ignore_docroot };
        let resolved = resolve_with(opts, self.server_default.as_deref(), || self.configs.load(owner, repo)).await;

        let extensions = match clean_extensions(req.include_extensions.as_deref()) {
            Some(exts) => exts,
            None => {
                let repo_exts = self.configs.load(owner, repo).await.include_extensions;
                clean_extensions(repo_exts.as_deref())
                    .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect())
            }
        };

        let key = CatalogKey {
            owner: owner.to_string(),
            repo: repo.to_string(),
            docroot: resolved.docroot.clone(),
            extensions: extensions.clone(),
            branch: req.branch.clone(),
            allow_dotfiles: req.allow_dotfiles,
        };

        self.catalogs
            .get_or_try_insert_with(key, || async {
                let branch = req.branch.as_deref().unwrap_or(DEFAULT_BRANCH);
                tracing::debug!(owner, repo, branch, docroot = %resolved.docroot, "catalog cache miss");
                let (branch, listing) = self.fetch_tree_with_fallback(owner, repo, branch).await?;

                let files = collect_documents(&listing.tree, &resolved.docroot, &extensions, req.allow_dotfiles);
                let statistics = compute_statistics(&files, &extensions, listing.truncated);
                let indexed_at = Utc::now();
                let ttl = chrono::Duration::from_std(self.catalogs.ttl()).unwrap_or_else(|_| chrono::Duration::zero());
                tracing::info!(owner, repo, branch = %branch, files = statistics.total_files, "catalog built");

                Ok::<_, CatalogError>(Arc::new(Catalog {
                    repository: format!("{owner}/{repo}"),
                    branch,
                    docroot: resolved.docroot.clone(),
                    docroot_source: resolved.source,
                    indexed_at,
                    cache_expires_at: indexed_at + ttl,
                    statistics,
                    files,
                }))
            })
            .await
    }

    /// Fetches `branch`, retrying once on `master` when `main` does not exist.
    async fn fetch_tree_with_fallback(&self, owner: &str, repo: &str, branch: &str) -> Result<(String, TreeListing), CatalogError> {
        match self.store.fetch_tree(owner, repo, branch).await {
            Ok(listing) => Ok((branch.to_string(), listing)),
            Err(e) if e.is_not_found() && branch == DEFAULT_BRANCH => {
                tracing::warn!(owner, repo, "branch main not found, falling back to master");
                self.store
                    .fetch_tree(owner, repo, FALLBACK_BRANCH)
                    .await
                    .map(|listing| (FALLBACK_BRANCH.to_string(), listing))
                    .map_err(|source| CatalogError::TreeFetch { branch: FALLBACK_BRANCH.to_string(), source })
            }
            Err(source) => Err(CatalogError::TreeFetch { branch: branch.to_string(), source }),
        }
    }

    pub fn clear_cache(&self, owner: Option<&str>, repo: Option<&str>) {
        self.catalogs.clear_matching(owner, repo);
        self.configs.clear_cache(owner, repo);
    }
}

/// Lower-cases, drops blanks, sorts and dedups. `None` when nothing usable is left.
fn clean_extensions(exts: Option<&[String]>) -> Option<Vec<String>> {
    let set: BTreeSet<String> = exts?
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    (!set.is_empty()).then(|| set.into_iter().collect())
}

/// Blobs strictly under `docroot` whose path ends in one of `extensions` (already lower-cased),
/// with the docroot prefix removed and sorted by that relative path.
pub fn collect_documents(tree: &[TreeEntry], docroot: &str, extensions: &[String], allow_dotfiles: bool) -> Vec<CatalogFile> {
    let docroot = normalize_path(docroot);
    let mut files: Vec<CatalogFile> = tree
        .iter()
        .filter(|entry| entry.kind == EntryKind::Blob)
        .filter_map(|entry| {
            let relative = relative_to(&entry.path, docroot)?;
            let lower = relative.to_lowercase();
            if !extensions.iter().any(|ext| lower.ends_with(ext.as_str())) {
                return None;
            }
            if !allow_dotfiles && has_dot_components(relative) {
                return None;
            }
            Some(CatalogFile {
                path: relative.to_string(),
                name: relative.rsplit('/').next().unwrap_or(relative).to_string(),
                folder: parent_folder(relative).to_string(),
                size: entry.size,
                sha: entry.sha.clone(),
            })
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

fn relative_to<'a>(path: &'a str, docroot: &str) -> Option<&'a str> {
    if docroot.is_empty() {
        return Some(path);
    }
    if !is_path_in_docroot(path, Some(docroot)) {
        return None;
    }
    let rest = path.strip_prefix(docroot)?.strip_prefix('/')?;
    (!rest.is_empty()).then_some(rest)
}

pub fn compute_statistics(files: &[CatalogFile], extensions: &[String], truncated: bool) -> CatalogStatistics {
    let folders: BTreeSet<&str> = files.iter().map(|f| f.folder.as_str()).collect();
    let total_size_bytes = files.iter().map(|f| f.size).sum();
    let file_types = extensions
        .iter()
        .filter_map(|ext| {
            let count = files.iter().filter(|f| f.path.to_lowercase().ends_with(ext.as_str())).count();
            (count > 0).then(|| (ext.clone(), count))
        })
        .collect();
    CatalogStatistics {
        total_files: files.len(),
        total_folders: folders.len(),
        total_size_bytes,
        total_size_human: format_bytes(total_size_bytes),
        file_types,
        truncated,
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}
