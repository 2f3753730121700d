use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: Server,
    pub auth: Auth,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub github: GitHub,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub logging: Logging,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Server {
    pub bind_addr: String,
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
}
fn default_base_path() -> String { "/mcp".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct Auth {
    pub bearer_token: String,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Limits {
    #[serde(default = "default_max_request_kb")]
    pub max_request_kb: usize,
    #[serde(default = "default_global_rps")]
    pub global_rps: u32,
    #[serde(default = "default_global_burst")]
    pub global_burst: u32,
    #[serde(default = "default_per_token_rps")]
    pub per_token_rps: u32,
    #[serde(default = "default_per_token_burst")]
    pub per_token_burst: u32,
}
fn default_max_request_kb() -> usize { 1024 }
fn default_global_rps() -> u32 { 20 }
fn default_global_burst() -> u32 { 40 }
fn default_per_token_rps() -> u32 { 10 }
fn default_per_token_burst() -> u32 { 20 }

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_request_kb: default_max_request_kb(),
            global_rps: default_global_rps(),
            global_burst: default_global_burst(),
            per_token_rps: default_per_token_rps(),
            per_token_burst: default_per_token_burst(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHub {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub default_owner: Option<String>,
    #[serde(default)]
    pub default_repo: Option<String>,
    /// Server-wide docroot used when neither the call nor the repository sets one.
    #[serde(default)]
    pub default_docroot: Option<String>,
}
fn default_api_base_url() -> String { "https://api.github.com".to_string() }
fn default_user_agent() -> String { concat!("docgate/", env!("CARGO_PKG_VERSION")).to_string() }

impl Default for GitHub {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token: None,
            user_agent: default_user_agent(),
            default_owner: None,
            default_repo: None,
            default_docroot: None,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct Cache {
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_ttl", rename = "ttl_s")]
    pub ttl: Duration,
}
fn default_ttl() -> Duration { crate::docroot::cache::DEFAULT_TTL }

impl Default for Cache {
    fn default() -> Self { Self { ttl: default_ttl() } }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Logging {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}
fn default_log_level() -> String { "info".to_string() }

impl Default for Logging {
    fn default() -> Self { Self { level: default_log_level(), format: LogFormat::default() } }
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)?;
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            Ok(serde_json::from_str(&raw)?)
        } else {
            Ok(toml::from_str(&raw)?)
        }
    }

    /// Overlays `GH_TOKEN`, `GH_DEFAULT_OWNER`, `GH_DEFAULT_REPO` and `GH_DEFAULT_DOCROOT`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(token) = get("GH_TOKEN") { self.github.token = Some(token); }
        if let Some(owner) = get("GH_DEFAULT_OWNER") { self.github.default_owner = Some(owner); }
        if let Some(repo) = get("GH_DEFAULT_REPO") { self.github.default_repo = Some(repo); }
        if let Some(docroot) = get("GH_DEFAULT_DOCROOT") { self.github.default_docroot = Some(docroot); }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.auth.bearer_token.trim().is_empty() { anyhow::bail!("bearer_token must not be empty"); }
        if self.auth.allowed_origins.is_empty() { anyhow::bail!("allowed_origins must not be empty"); }
        if self.limits.max_request_kb == 0 { anyhow::bail!("max_request_kb must be > 0"); }
        if self.limits.global_rps == 0 || self.limits.per_token_rps == 0 { anyhow::bail!("rate limits must be > 0"); }
        if self.cache.ttl.is_zero() { anyhow::bail!("cache ttl_s must be > 0"); }
        if !self.server.base_path.starts_with('/') { anyhow::bail!("base_path must start with '/'"); }
        Ok(())
    }
}
