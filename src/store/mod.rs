pub mod github;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub type DynStore = Arc<dyn RemoteStore + Send + Sync + 'static>;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("404 not found: {0}")]
    NotFound(String),
    #[error("{status} {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    Commit,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeListing {
    #[serde(default)]
    pub sha: String,
    pub tree: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContents {
    pub path: String,
    pub sha: String,
    pub size: u64,
    /// Decoded UTF-8 text (lossy for binary files).
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sha: String,
}

#[derive(Debug, Clone)]
pub struct PutFile {
    pub path: String,
    pub content: String,
    pub message: String,
    pub branch: Option<String>,
    /// Blob SHA of the file being replaced; `None` creates it.
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CommitQuery {
    pub path: Option<String>,
    pub sha: Option<String>,
    pub per_page: u32,
}

/// The hosted repository the gateway fronts.
///
/// Only `fetch_config` and `fetch_tree` are used by docroot resolution and cataloging; the
/// rest back the file tools once a path has been validated.
#[async_trait]
pub trait RemoteStore {
    /// Raw bytes of the per-repository `.mcp-config.json`.
    async fn fetch_config(&self, owner: &str, repo: &str) -> StoreResult<Vec<u8>>;
    async fn fetch_tree(&self, owner: &str, repo: &str, branch: &str) -> StoreResult<TreeListing>;
    async fn get_file(&self, owner: &str, repo: &str, path: &str, reference: Option<&str>) -> StoreResult<FileContents>;
    async fn put_file(&self, owner: &str, repo: &str, req: PutFile) -> StoreResult<CommitRef>;
    async fn delete_file(&self, owner: &str, repo: &str, path: &str, message: &str, sha: &str, branch: Option<&str>) -> StoreResult<CommitRef>;
    async fn list_contents(&self, owner: &str, repo: &str, path: &str, reference: Option<&str>) -> StoreResult<Vec<ContentEntry>>;
    async fn list_commits(&self, owner: &str, repo: &str, query: CommitQuery) -> StoreResult<serde_json::Value>;
    async fn search_code(&self, query: &str, per_page: u32) -> StoreResult<serde_json::Value>;
}
