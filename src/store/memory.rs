//! In-process store used by tests. Counts tree fetches per branch so cache behaviour can be
//! asserted.

use super::{
    CommitQuery, CommitRef, ContentEntry, EntryKind, FileContents, PutFile, RemoteStore, StoreError,
    StoreResult, TreeEntry, TreeListing,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, String>>,
    branches: Mutex<HashMap<String, Vec<TreeEntry>>>,
    config: Mutex<Option<Result<Vec<u8>, StoreError>>>,
    tree_failure: Mutex<Option<StoreError>>,
    truncated: AtomicBool,
    tree_fetches: Mutex<HashMap<String, usize>>,
    config_fetches: AtomicUsize,
    searches: Mutex<Vec<String>>,
}

pub fn blob(path: &str, size: u64) -> TreeEntry {
    TreeEntry { path: path.into(), kind: EntryKind::Blob, size, sha: format!("sha-{path}") }
}

pub fn dir(path: &str) -> TreeEntry {
    TreeEntry { path: path.into(), kind: EntryKind::Tree, size: 0, sha: format!("sha-{path}") }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(self, branch: &str, entries: Vec<TreeEntry>) -> Self {
        self.branches.lock().insert(branch.to_string(), entries);
        self
    }

    pub fn with_config(self, raw: &str) -> Self {
        *self.config.lock() = Some(Ok(raw.as_bytes().to_vec()));
        self
    }

    pub fn with_config_error(self, err: StoreError) -> Self {
        *self.config.lock() = Some(Err(err));
        self
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files.lock().insert(path.to_string(), content.to_string());
        self
    }

    /// Every tree fetch fails with `err`, regardless of branch.
    pub fn failing_trees(self, err: StoreError) -> Self {
        *self.tree_failure.lock() = Some(err);
        self
    }

    /// Tree listings report `truncated: true`, as GitHub does for very large repositories.
    pub fn truncated_trees(self) -> Self {
        self.truncated.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_config(&self, raw: &str) {
        *self.config.lock() = Some(Ok(raw.as_bytes().to_vec()));
    }

    pub fn tree_fetches(&self, branch: &str) -> usize {
        self.tree_fetches.lock().get(branch).copied().unwrap_or(0)
    }

    pub fn total_tree_fetches(&self) -> usize {
        self.tree_fetches.lock().values().sum()
    }

    pub fn config_fetches(&self) -> usize {
        self.config_fetches.load(Ordering::SeqCst)
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().get(path).cloned()
    }

    pub fn searches(&self) -> Vec<String> {
        self.searches.lock().clone()
    }
}

fn commit(path: &str) -> CommitRef {
    CommitRef { sha: format!("commit-{path}"), html_url: None }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_config(&self, _owner: &str, _repo: &str) -> StoreResult<Vec<u8>> {
        self.config_fetches.fetch_add(1, Ordering::SeqCst);
        self.config
            .lock()
            .clone()
            .unwrap_or_else(|| Err(StoreError::NotFound(".mcp-config.json".into())))
    }

    async fn fetch_tree(&self, _owner: &str, _repo: &str, branch: &str) -> StoreResult<TreeListing> {
        *self.tree_fetches.lock().entry(branch.to_string()).or_default() += 1;
        if let Some(err) = self.tree_failure.lock().clone() {
            return Err(err);
        }
        match self.branches.lock().get(branch) {
            Some(tree) => Ok(TreeListing {
                sha: format!("tree-{branch}"),
                tree: tree.clone(),
                truncated: self.truncated.load(Ordering::SeqCst),
            }),
            None => Err(StoreError::NotFound(format!("git/trees/{branch}"))),
        }
    }

    async fn get_file(&self, _owner: &str, _repo: &str, path: &str, _reference: Option<&str>) -> StoreResult<FileContents> {
        let content = self.file(path).ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(FileContents { path: path.into(), sha: format!("sha-{path}"), size: content.len() as u64, content })
    }

    async fn put_file(&self, _owner: &str, _repo: &str, req: PutFile) -> StoreResult<CommitRef> {
        let exists = self.files.lock().contains_key(&req.path);
        if exists != req.sha.is_some() {
            return Err(StoreError::Http { status: 409, message: "sha mismatch".into() });
        }
        self.files.lock().insert(req.path.clone(), req.content);
        Ok(commit(&req.path))
    }

    async fn delete_file(&self, _owner: &str, _repo: &str, path: &str, _message: &str, _sha: &str, _branch: Option<&str>) -> StoreResult<CommitRef> {
        self.files
            .lock()
            .remove(path)
            .map(|_| commit(path))
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn list_contents(&self, _owner: &str, _repo: &str, path: &str, _reference: Option<&str>) -> StoreResult<Vec<ContentEntry>> {
        let prefix = if path.is_empty() { String::new() } else { format!("{path}/") };
        let entries: Vec<ContentEntry> = self
            .files
            .lock()
            .iter()
            .filter_map(|(p, content)| {
                let rest = p.strip_prefix(&prefix)?;
                (!rest.contains('/')).then(|| ContentEntry {
                    name: rest.to_string(),
                    path: p.clone(),
                    kind: "file".into(),
                    size: content.len() as u64,
                    sha: format!("sha-{p}"),
                })
            })
            .collect();
        if entries.is_empty() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        Ok(entries)
    }

    async fn list_commits(&self, _owner: &str, _repo: &str, query: CommitQuery) -> StoreResult<serde_json::Value> {
        Ok(json!([{ "sha": "c1", "path": query.path, "per_page": query.per_page }]))
    }

    async fn search_code(&self, query: &str, _per_page: u32) -> StoreResult<serde_json::Value> {
        self.searches.lock().push(query.to_string());
        Ok(json!({ "total_count": 0, "items": [] }))
    }
}
