use super::{parse_params, schema, RepoParams, ScopeParams, SharedContext};
use crate::{
    docroot::{path_validator::has_dot_components, OperationKind},
    errors::AppError,
    mcp::registry::Tool,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Params {
    /// Empty lists the docroot itself.
    #[serde(default)]
    path: String,
    #[serde(default, rename = "ref")]
    reference: Option<String>,
    #[serde(flatten)]
    target: RepoParams,
    #[serde(flatten)]
    scope: ScopeParams,
}

pub struct ListContentsTool { ctx: SharedContext }

impl ListContentsTool { pub fn new(ctx: SharedContext) -> Self { Self { ctx } } }

#[async_trait]
impl Tool for ListContentsTool {
    fn name(&self) -> &'static str { "list_contents" }
    fn capabilities(&self) -> serde_json::Value {
        json!({
            "input": schema(&[], json!({"path": {"type":"string"}, "ref": {"type":"string"}})),
            "output": {"type":"object","properties": {"path":{"type":"string"},"entries":{"type":"array"}}}
        })
    }
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let p: Params = parse_params(params)?;
        let (owner, repo) = self.ctx.target(&p.target)?;
        let (full, check) = self.ctx.scoped_path(&owner, &repo, &p.path, p.scope, OperationKind::List).await?;
        let mut entries = self.ctx.store.list_contents(&owner, &repo, &full, p.reference.as_deref()).await?;
        if !p.scope.allow_dotfiles {
            entries.retain(|e| !has_dot_components(&e.name));
        }
        Ok(json!({"path": full, "docroot": check.docroot, "docroot_source": check.source, "entries": entries}))
    }
}
