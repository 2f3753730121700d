mod config;
mod docroot;
mod errors;
mod logging;
mod mcp;
mod security;
mod server;
mod store;
mod tools;

use crate::config::Config;
use crate::store::{github::GitHubStore, DynStore};
use crate::tools::ToolContext;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from("docgate.toml");
    let mut i = 1;
    while i < args.len() {
        if args[i] == "--config" {
            i += 1;
            if i >= args.len() { eprintln!("--config requires a path"); std::process::exit(2); }
            config_path = PathBuf::from(&args[i]);
        }
        i += 1;
    }

    let mut cfg = Config::load(&config_path).with_context(|| format!("loading config {}", config_path.display()))?;
    cfg.apply_env(|k| std::env::var(k).ok());
    cfg.validate().context("validating config")?;
    logging::init(&cfg.logging);

    let store: DynStore = Arc::new(GitHubStore::new(&cfg.github).context("building GitHub client")?);
    let ctx = Arc::new(ToolContext::new(&cfg.github, cfg.cache.ttl, store));

    let addr = format!("{}:{}", cfg.server.bind_addr, cfg.server.port);
    let state = server::AppState::new(cfg, ctx);
    info!(
        addr = %addr,
        base_path = %state.cfg.server.base_path,
        tools = ?state.registry.list_names(),
        default_docroot = ?state.cfg.github.default_docroot,
        authenticated = state.cfg.github.token.is_some(),
        "docgate ready"
    );

    server::serve(state).await
}
