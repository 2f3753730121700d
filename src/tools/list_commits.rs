use super::{default_per_page, parse_params, schema, RepoParams, ScopeParams, SharedContext};
use crate::{docroot::OperationKind, errors::AppError, mcp::registry::Tool, store::CommitQuery};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    sha: Option<String>,
    #[serde(default = "default_per_page")]
    per_page: u32,
    #[serde(flatten)]
    target: RepoParams,
    #[serde(flatten)]
    scope: ScopeParams,
}

pub struct ListCommitsTool { ctx: SharedContext }

impl ListCommitsTool { pub fn new(ctx: SharedContext) -> Self { Self { ctx } } }

#[async_trait]
impl Tool for ListCommitsTool {
    fn name(&self) -> &'static str { "list_commits" }
    fn capabilities(&self) -> serde_json::Value {
        json!({
            "input": schema(&[], json!({"path": {"type":"string"}, "sha": {"type":"string"}, "per_page": {"type":"integer"}})),
            "output": {"type":"object","properties": {"path":{"type":"string"},"commits":{"type":"array"}}}
        })
    }
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let p: Params = parse_params(params)?;
        let (owner, repo) = self.ctx.target(&p.target)?;
        // Without a path, history is scoped to the docroot itself.
        let (full, _) = self
            .ctx
            .scoped_path(&owner, &repo, p.path.as_deref().unwrap_or(""), p.scope, OperationKind::History)
            .await?;
        let path = (!full.is_empty()).then(|| full.clone());
        let commits = self
            .ctx
            .store
            .list_commits(&owner, &repo, CommitQuery { path, sha: p.sha, per_page: p.per_page.clamp(1, 100) })
            .await?;
        Ok(json!({"path": full, "commits": commits}))
    }
}
