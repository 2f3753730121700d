use super::{parse_params, RepoParams, SharedContext};
use crate::{
    docroot::{path_validator::{normalize_docroot, validate_path}, resolver::options_for, CatalogRequest, OperationKind},
    errors::AppError,
    mcp::registry::Tool,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct Params {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    include_extensions: Option<Vec<String>>,
    #[serde(default)]
    branch: Option<String>,
    #[serde(default)]
    ignore_docroot: bool,
    #[serde(default)]
    allow_dotfiles: bool,
    #[serde(flatten)]
    target: RepoParams,
}

pub struct CatalogTool { ctx: SharedContext }

impl CatalogTool { pub fn new(ctx: SharedContext) -> Self { Self { ctx } } }

#[async_trait]
impl Tool for CatalogTool {
    fn name(&self) -> &'static str { "get_repository_catalog" }
    fn capabilities(&self) -> serde_json::Value {
        json!({
            "input": super::schema(&[], json!({
                "path": {"type":"string", "description": "Folder to catalog; overrides the configured docroot"},
                "include_extensions": {"type":"array", "items": {"type":"string"}},
                "branch": {"type":"string"}
            })),
            "output": {"type":"object","properties": {"catalog":{"type":"object"},"message":{"type":"string"},"docroot_source":{"type":"string"}}}
        })
    }
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, AppError> {
        let p: Params = parse_params(params)?;
        let (owner, repo) = self.ctx.target(&p.target)?;
        // An explicit boundary replaces the docroot, so only the dot-file policy applies to it.
        if let Some(path) = normalize_docroot(p.path.as_deref()).filter(|d| !d.is_empty()) {
            let check = validate_path(&path, None, options_for(OperationKind::Catalog, true, p.allow_dotfiles));
            if let (false, Some(reason)) = (check.valid, check.reason) {
                return Err(AppError::PathRejected { reason, message: check.error.unwrap_or_default() });
            }
        }
        let req = CatalogRequest {
            path: p.path,
            include_extensions: p.include_extensions,
            branch: p.branch,
            ignore_docroot: p.ignore_docroot,
            allow_dotfiles: p.allow_dotfiles,
        };
        let catalog = self.ctx.catalog.build_catalog(&owner, &repo, &req).await?;
        let message = format!(
            "Found {} documents across {} folders",
            catalog.statistics.total_files, catalog.statistics.total_folders
        );
        Ok(json!({
            "catalog": &*catalog,
            "message": message,
            "docroot_source": catalog.docroot_source.describe(),
        }))
    }
}
