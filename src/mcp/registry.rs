use crate::{errors::AppError, tools::SharedContext};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type DynTool = Arc<dyn Tool + Send + Sync + 'static>;

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<(String, DynTool)>,
}

impl ToolRegistry {
    pub fn new(ctx: SharedContext) -> Self {
        use crate::tools::{
            catalog::CatalogTool, delete_file::DeleteFileTool, get_file::GetFileTool, list_commits::ListCommitsTool,
            list_contents::ListContentsTool, put_file::PutFileTool, search_code::SearchCodeTool,
        };
        let built: Vec<DynTool> = vec![
            Arc::new(GetFileTool::new(ctx.clone())),
            Arc::new(PutFileTool::new(ctx.clone())),
            Arc::new(DeleteFileTool::new(ctx.clone())),
            Arc::new(ListContentsTool::new(ctx.clone())),
            Arc::new(ListCommitsTool::new(ctx.clone())),
            Arc::new(SearchCodeTool::new(ctx.clone())),
            Arc::new(CatalogTool::new(ctx)),
        ];
        let mut tools: Vec<(String, DynTool)> = built.into_iter().map(|t| (t.name().to_string(), t)).collect();
        tools.sort_by(|a, b| a.0.cmp(&b.0));
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<DynTool> { self.tools.iter().find(|(n, _)| n == name).map(|(_, t)| t.clone()) }
    pub fn list_names(&self) -> Vec<String> { self.tools.iter().map(|(n, _)| n.clone()).collect() }
    pub fn iter(&self) -> impl Iterator<Item = &DynTool> { self.tools.iter().map(|(_, t)| t) }
}

#[derive(Debug, Deserialize)]
pub struct CallRequest {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct CallResponse {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")] pub error: Option<super::types::ErrorObj>,
}

impl CallResponse {
    pub fn ok(id: String, result: serde_json::Value) -> Self { Self { id, result: Some(result), error: None } }
    pub fn err(id: String, e: &AppError) -> Self {
        Self { id, result: None, error: Some(super::types::ErrorObj { code: e.code().to_string(), message: e.to_string() }) }
    }
}

#[async_trait]
pub trait Tool {
    fn name(&self) -> &'static str;
    /// `{"input": <schema>, "output": <schema>}`
    fn capabilities(&self) -> serde_json::Value;
    async fn call(&self, params: serde_json::Value) -> Result<serde_json::Value, AppError>;
}
