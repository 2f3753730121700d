use crate::{
    config::Config,
    docroot::repo_config::REPO_CONFIG_PATH,
    errors::{into_response, AppError},
    mcp::{
        registry::{CallRequest, CallResponse, ToolRegistry},
        types::{Capabilities, DocrootInfo, ToolInfo},
    },
    security::{self, RateLimiters},
    tools::SharedContext,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub registry: Arc<ToolRegistry>,
    pub rls: RateLimiters,
    pub ctx: SharedContext,
}

impl AppState {
    pub fn new(cfg: Config, ctx: SharedContext) -> Self {
        let rls = RateLimiters::from_limits(&cfg.limits);
        Self { registry: Arc::new(ToolRegistry::new(ctx.clone())), cfg: Arc::new(cfg), rls, ctx }
    }
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.cfg.server.bind_addr, state.cfg.server.port).parse()?;
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(shared: AppState) -> Router {
    let base = shared.cfg.server.base_path.trim_end_matches('/').to_string();
    let limit_bytes = shared.cfg.limits.max_request_kb * 1024;
    Router::new()
        .route("/healthz", get(health))
        .route(&format!("{base}/capabilities"), get(capabilities))
        .route(&format!("{base}/call"), post(call).layer(RequestBodyLimitLayer::new(limit_bytes)))
        .route(&format!("{base}/cache/clear"), post(clear_cache).layer(RequestBodyLimitLayer::new(limit_bytes)))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn health(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    match authorize(&state, &headers) {
        Ok(()) => (StatusCode::OK, Json(json!({"status":"ok"}))).into_response(),
        Err(e) => into_response(e).into_response(),
    }
}

async fn capabilities(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(e) = authorize(&state, &headers) {
        return into_response(e).into_response();
    }
    let tools: Vec<ToolInfo> = state
        .registry
        .iter()
        .map(|t| {
            let caps = t.capabilities();
            ToolInfo { name: t.name().to_string(), input_schema: caps["input"].clone(), output_schema: caps["output"].clone() }
        })
        .collect();
    let caps = Capabilities {
        mcp_version: "1.0",
        tools,
        docroot: DocrootInfo {
            server_default: state.cfg.github.default_docroot.clone(),
            repo_config_path: REPO_CONFIG_PATH,
            cache_ttl_s: state.cfg.cache.ttl.as_secs(),
        },
    };
    (StatusCode::OK, Json(caps)).into_response()
}

/// Caller identity pulled from headers for the audit line.
struct Caller {
    request_id: String,
    origin: String,
    token_present: bool,
    started: Instant,
}

impl Caller {
    fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            origin: headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()).unwrap_or("").to_string(),
            token_present: security::extract_bearer(headers).is_some(),
            started: Instant::now(),
        }
    }

    fn audit(&self, tool: &str, decision: &str, code: &str, bytes_out: u64) {
        tracing::info!(
            request_id = %self.request_id,
            origin = %self.origin,
            token_present = self.token_present,
            tool = tool,
            decision = decision,
            code = code,
            duration_ms = self.started.elapsed().as_millis() as u64,
            bytes_out = bytes_out,
            "audit"
        );
    }
}

async fn call(State(state): State<AppState>, headers: HeaderMap, Json(req): Json<CallRequest>) -> Response {
    let caller = Caller::from_headers(&headers);
    if let Err(e) = gate(&state, &headers) {
        caller.audit(&req.tool, "deny", e.code(), 0);
        return into_response(e).into_response();
    }

    let Some(tool) = state.registry.get(&req.tool) else {
        let e = AppError::NotFound(format!("tool '{}'", req.tool));
        caller.audit(&req.tool, "deny", e.code(), 0);
        return into_response(e).into_response();
    };

    let (status, body, decision, code) = match tool.call(req.params).await {
        Ok(result) => (StatusCode::OK, CallResponse::ok(req.id, result), "allow", "OK"),
        // Docroot and dot-file rejections are policy decisions, not tool failures.
        Err(e @ AppError::PathRejected { .. }) => (e.status(), CallResponse::err(req.id, &e), "deny", e.code()),
        Err(e) => (e.status(), CallResponse::err(req.id, &e), "error", e.code()),
    };
    let bytes_out = serde_json::to_vec(&body).map(|v| v.len()).unwrap_or(0) as u64;
    caller.audit(&req.tool, decision, code, bytes_out);
    (status, Json(body)).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct ClearCacheRequest {
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    repo: Option<String>,
}

/// Drops cached repository configs and catalogs. An empty body clears everything.
async fn clear_cache(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let caller = Caller::from_headers(&headers);
    if let Err(e) = gate(&state, &headers) {
        caller.audit("cache_clear", "deny", e.code(), 0);
        return into_response(e).into_response();
    }
    let req: ClearCacheRequest = if body.is_empty() {
        ClearCacheRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(req) => req,
            Err(e) => {
                let e = AppError::ToolError(format!("invalid body: {e}"));
                caller.audit("cache_clear", "error", e.code(), 0);
                return into_response(e).into_response();
            }
        }
    };
    state.ctx.clear_caches(req.owner.as_deref(), req.repo.as_deref());
    tracing::info!(owner = ?req.owner, repo = ?req.repo, "caches cleared");
    caller.audit("cache_clear", "allow", "OK", 0);
    (StatusCode::OK, Json(json!({"cleared": true, "owner": req.owner, "repo": req.repo}))).into_response()
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    security::require_bearer(headers, &state.cfg.auth.bearer_token)?;
    security::check_origin(headers, &state.cfg.auth.allowed_origins)?;
    Ok(())
}

/// Auth, declared size, then per-token and global rate limits.
fn gate(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    authorize(state, headers)?;
    security::content_length_ok(headers, state.cfg.limits.max_request_kb)?;
    let token = security::extract_bearer(headers);
    state.rls.check(token.as_deref())
}
