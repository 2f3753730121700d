use super::{parse_params, schema, RepoParams, ScopeParams, SharedContext};
use crate::{docroot::OperationKind, errors::AppError, mcp::registry::Tool, store::{PutFile, StoreError}};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Params {
    path: String,
    content: String,
    message: String,
    #[serde(default)]
    branch: Option<String>,
    #[serde(flatten)]
    target: RepoParams,
    #[serde(flatten)]
    scope: ScopeParams,
}

/// Creates a file, or replaces it when one already exists at the path.
pub struct PutFileTool { ctx: SharedContext }

impl PutFileTool { pub fn new(ctx: SharedContext) -> Self { Self { ctx } } }

#[async_trait]
impl Tool for PutFileTool {
    fn name(&self) -> &'static str { "create_or_update_file" }
    fn capabilities(&self) -> serde_json::Value {
        json!({
            "input": schema(&["path", "content", "message"], json!({
                "path": {"type":"string"}, "content": {"type":"string"}, "message": {"type":"string"}, "branch": {"type":"string"}
            })),
            "output": {"type":"object","properties": {"path":{"type":"string"},"action":{"type":"string"},"commit":{"type":"object"}}}
        })
    }
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let p: Params = parse_params(params)?;
        let (owner, repo) = self.ctx.target(&p.target)?;
        let (full, check) = self.ctx.scoped_path(&owner, &repo, &p.path, p.scope, OperationKind::Write).await?;

        // The contents API wants the current blob sha to replace an existing file.
        let sha = match self.ctx.store.get_file(&owner, &repo, &full, p.branch.as_deref()).await {
            Ok(existing) => Some(existing.sha),
            Err(StoreError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        let action = if sha.is_some() { "updated" } else { "created" };
        let commit = self
            .ctx
            .store
            .put_file(&owner, &repo, PutFile { path: full.clone(), content: p.content, message: p.message, branch: p.branch, sha })
            .await?;
        tracing::info!(owner = %owner, repo = %repo, path = %full, action, commit = %commit.sha, "file written");
        Ok(json!({"path": full, "action": action, "commit": commit, "docroot": check.docroot}))
    }
}
