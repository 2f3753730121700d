use super::{parse_params, schema, RepoParams, ScopeParams, SharedContext};
use crate::{docroot::OperationKind, errors::AppError, mcp::registry::Tool, store::StoreError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Params {
    path: String,
    message: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(flatten)]
    target: RepoParams,
    #[serde(flatten)]
    scope: ScopeParams,
}

pub struct DeleteFileTool { ctx: SharedContext }

impl DeleteFileTool { pub fn new(ctx: SharedContext) -> Self { Self { ctx } } }

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &'static str { "delete_file" }
    fn capabilities(&self) -> serde_json::Value {
        json!({
            "input": schema(&["path", "message"], json!({"path": {"type":"string"}, "message": {"type":"string"}, "branch": {"type":"string"}})),
            "output": {"type":"object","properties": {"path":{"type":"string"},"commit":{"type":"object"}}}
        })
    }
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let p: Params = parse_params(params)?;
        let (owner, repo) = self.ctx.target(&p.target)?;
        let (full, _) = self.ctx.scoped_path(&owner, &repo, &p.path, p.scope, OperationKind::Delete).await?;
        let existing = match self.ctx.store.get_file(&owner, &repo, &full, p.branch.as_deref()).await {
            Ok(file) => file,
            Err(StoreError::NotFound(_)) => return Err(AppError::NotFound(format!("file '{full}' does not exist"))),
            Err(e) => return Err(e.into()),
        };
        let commit = self
            .ctx
            .store
            .delete_file(&owner, &repo, &full, &p.message, &existing.sha, p.branch.as_deref())
            .await?;
        tracing::info!(owner = %owner, repo = %repo, path = %full, commit = %commit.sha, "file deleted");
        Ok(json!({"path": full, "commit": commit}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::tools::testing::context;
    use std::sync::Arc;

    #[tokio::test]
    async fn deletes_inside_docroot_only() {
        let store = Arc::new(MemoryStore::new().with_file("docs/old.md", "x").with_file("LICENSE", "y"));
        let tool = DeleteFileTool::new(context(store.clone(), Some("docs")));

        let out = tool.call(json!({"path": "old.md", "message": "rm"})).await.unwrap();
        assert_eq!(out["path"], "docs/old.md");
        assert_eq!(store.file("docs/old.md"), None);

        let err = tool.call(json!({"path": "/LICENSE", "message": "rm"})).await.unwrap_err();
        assert_eq!(err.code(), "outside_docroot");
        assert!(store.file("LICENSE").is_some());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let tool = DeleteFileTool::new(context(MemoryStore::new(), None));
        let err = tool.call(json!({"path": "gone.md", "message": "rm"})).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("gone.md")));
    }
}
