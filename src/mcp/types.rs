use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub mcp_version: &'static str,
    pub tools: Vec<ToolInfo>,
    pub docroot: DocrootInfo,
}

#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub input_schema: serde_json::Value,
    pub output_schema: serde_json::Value,
}

/// Server-side scoping defaults advertised to clients.
#[derive(Debug, Serialize)]
pub struct DocrootInfo {
    pub server_default: Option<String>,
    pub repo_config_path: &'static str,
    pub cache_ttl_s: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorObj {
    pub code: String,
    pub message: String,
}
