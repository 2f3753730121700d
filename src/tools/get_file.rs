use super::{parse_params, schema, RepoParams, ScopeParams, SharedContext};
use crate::{docroot::OperationKind, errors::AppError, mcp::registry::Tool};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Params {
    path: String,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
    #[serde(flatten)]
    target: RepoParams,
    #[serde(flatten)]
    scope: ScopeParams,
}

pub struct GetFileTool { ctx: SharedContext }

impl GetFileTool { pub fn new(ctx: SharedContext) -> Self { Self { ctx } } }

#[async_trait]
impl Tool for GetFileTool {
    fn name(&self) -> &'static str { "get_file" }
    fn capabilities(&self) -> serde_json::Value {
        json!({
            "input": schema(&["path"], json!({"path": {"type":"string"}, "ref": {"type":"string"}})),
            "output": {"type":"object","properties": {"path":{"type":"string"},"sha":{"type":"string"},"size":{"type":"integer"},"content":{"type":"string"}}}
        })
    }
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let p: Params = parse_params(params)?;
        let (owner, repo) = self.ctx.target(&p.target)?;
        let (full, check) = self.ctx.scoped_path(&owner, &repo, &p.path, p.scope, OperationKind::Read).await?;
        let file = self.ctx.store.get_file(&owner, &repo, &full, p.reference.as_deref()).await?;
        Ok(json!({
            "path": file.path,
            "sha": file.sha,
            "size": file.size,
            "content": file.content,
            "docroot": check.docroot,
            "docroot_source": check.source,
        }))
    }
}
