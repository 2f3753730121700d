use super::{default_per_page, parse_params, schema, RepoParams, ScopeParams, SharedContext};
use crate::{
    docroot::{path_validator::should_enforce_docroot, OperationKind, ResolveOptions},
    errors::AppError,
    mcp::registry::Tool,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Params {
    query: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default = "default_per_page")]
    per_page: u32,
    #[serde(flatten)]
    target: RepoParams,
    #[serde(flatten)]
    scope: ScopeParams,
}

/// Code search qualified to the repository and, when enforced, to its docroot.
pub struct SearchCodeTool { ctx: SharedContext }

impl SearchCodeTool { pub fn new(ctx: SharedContext) -> Self { Self { ctx } } }

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &'static str { "search_code" }
    fn capabilities(&self) -> serde_json::Value {
        json!({
            "input": schema(&["query"], json!({"query": {"type":"string"}, "path": {"type":"string"}, "per_page": {"type":"integer"}})),
            "output": {"type":"object","properties": {"query":{"type":"string"},"results":{"type":"object"}}}
        })
    }
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let p: Params = parse_params(params)?;
        if p.query.trim().is_empty() {
            return Err(AppError::ToolError("query must not be empty".into()));
        }
        let (owner, repo) = self.ctx.target(&p.target)?;
        let scope_path = match p.path.as_deref().filter(|s| !s.is_empty()) {
            Some(path) => Some(self.ctx.scoped_path(&owner, &repo, path, p.scope, OperationKind::Search).await?.0),
            None => {
                let resolved = self
                    .ctx
                    .resolver
                    .resolve_docroot(&owner, &repo, ResolveOptions { tool_param: None, ignore_docroot: p.scope.ignore_docroot })
                    .await;
                should_enforce_docroot(Some(resolved.docroot.as_str()), p.scope.ignore_docroot).then_some(resolved.docroot)
            }
        };
        let mut query = format!("{} repo:{owner}/{repo}", p.query.trim());
        if let Some(path) = scope_path.filter(|s| !s.is_empty()) {
            query.push_str(&format!(" path:{path}"));
        }
        let results = self.ctx.store.search_code(&query, p.per_page.clamp(1, 100)).await?;
        Ok(json!({"query": query, "results": results}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use crate::tools::testing::context;
    use std::sync::Arc;

    #[tokio::test]
    async fn enforced_docroot_qualifies_query() {
        let store = Arc::new(MemoryStore::new());
        let tool = SearchCodeTool::new(context(store.clone(), Some("docs")));
        tool.call(json!({"query": "install"})).await.unwrap();
        tool.call(json!({"query": "install", "ignore_docroot": true})).await.unwrap();
        tool.call(json!({"query": "install", "path": "guides"})).await.unwrap();
        assert_eq!(
            store.searches(),
            vec![
                "install repo:acme/handbook path:docs".to_string(),
                "install repo:acme/handbook".to_string(),
                "install repo:acme/handbook path:docs/guides".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn search_path_outside_docroot_is_rejected() {
        let tool = SearchCodeTool::new(context(MemoryStore::new(), Some("docs")));
        let err = tool.call(json!({"query": "x", "path": "/src"})).await.unwrap_err();
        assert_eq!(err.code(), "outside_docroot");
    }

    #[tokio::test]
    async fn blank_query_is_a_tool_error() {
        let tool = SearchCodeTool::new(context(MemoryStore::new(), None));
        assert!(matches!(tool.call(json!({"query": "  "})).await, Err(AppError::ToolError(_))));
    }
}
