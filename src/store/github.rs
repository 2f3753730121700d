use super::{
    CommitQuery, CommitRef, ContentEntry, FileContents, PutFile, RemoteStore, StoreError, StoreResult,
    TreeListing,
};
use crate::{config::GitHub, docroot::repo_config::REPO_CONFIG_PATH};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{header, Method, RequestBuilder, StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

const API_VERSION: &str = "2022-11-28";

/// GitHub REST v3 client.
pub struct GitHubStore {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

#[derive(Deserialize)]
struct RawContents {
    path: String,
    sha: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WriteResponse {
    commit: CommitRef,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DirOrFile {
    Dir(Vec<ContentEntry>),
    File(ContentEntry),
}

impl GitHubStore {
    pub fn new(cfg: &GitHub) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().user_agent(cfg.user_agent.clone()).build()?;
        let base = Url::parse(&cfg.api_base_url)?;
        if base.cannot_be_a_base() {
            anyhow::bail!("api_base_url cannot be used as a base: {}", cfg.api_base_url);
        }
        let token = cfg.token.clone().filter(|t| !t.trim().is_empty());
        Ok(Self { http, base, token })
    }

    fn url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> StoreResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Transport("invalid api base url".into()))?
            .pop_if_empty()
            .extend(segments.into_iter().filter(|s| !s.is_empty()));
        Ok(url)
    }

    fn repo_url<'a>(&self, owner: &'a str, repo: &'a str, rest: impl IntoIterator<Item = &'a str>) -> StoreResult<Url> {
        self.url(["repos", owner, repo].into_iter().chain(rest))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self
            .http
            .request(method, url)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> StoreResult<T> {
        let resp = req.send().await.map_err(|e| StoreError::Transport(e.to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return resp.json::<T>().await.map_err(|e| StoreError::Decode(e.to_string()));
        }

        let url = resp.url().path().to_string();
        let message = resp
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        tracing::debug!(status = status.as_u16(), url = %url, message = %message, "github request failed");
        if status == StatusCode::NOT_FOUND {
            Err(StoreError::NotFound(url))
        } else {
            Err(StoreError::Http { status: status.as_u16(), message })
        }
    }

    async fn raw_contents(&self, owner: &str, repo: &str, path: &str, reference: Option<&str>) -> StoreResult<RawContents> {
        let mut url = self.repo_url(owner, repo, std::iter::once("contents").chain(path.split('/')))?;
        if let Some(r) = reference {
            url.query_pairs_mut().append_pair("ref", r);
        }
        self.send(self.request(Method::GET, url)).await
    }
}

fn decode_content(raw: &RawContents) -> StoreResult<Vec<u8>> {
    let encoded: String = raw
        .content
        .as_deref()
        .ok_or_else(|| StoreError::Decode(format!("{} has no inline content", raw.path)))?
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| StoreError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteStore for GitHubStore {
    async fn fetch_config(&self, owner: &str, repo: &str) -> StoreResult<Vec<u8>> {
        let raw = self.raw_contents(owner, repo, REPO_CONFIG_PATH, None).await?;
        decode_content(&raw)
    }

    async fn fetch_tree(&self, owner: &str, repo: &str, branch: &str) -> StoreResult<TreeListing> {
        let mut url = self.repo_url(owner, repo, ["git", "trees", branch])?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let listing: TreeListing = self.send(self.request(Method::GET, url)).await?;
        if listing.truncated {
            tracing::warn!(owner, repo, branch, entries = listing.tree.len(), "tree listing truncated by upstream");
        }
        Ok(listing)
    }

    async fn get_file(&self, owner: &str, repo: &str, path: &str, reference: Option<&str>) -> StoreResult<FileContents> {
        let raw = self.raw_contents(owner, repo, path, reference).await?;
        let bytes = decode_content(&raw)?;
        Ok(FileContents {
            content: String::from_utf8_lossy(&bytes).into_owned(),
            path: raw.path,
            sha: raw.sha,
            size: raw.size,
        })
    }

    async fn put_file(&self, owner: &str, repo: &str, req: PutFile) -> StoreResult<CommitRef> {
        let url = self.repo_url(owner, repo, std::iter::once("contents").chain(req.path.split('/')))?;
        let mut body = json!({
            "message": req.message,
            "content": base64::engine::general_purpose::STANDARD.encode(req.content.as_bytes()),
        });
        if let Some(sha) = &req.sha {
            body["sha"] = json!(sha);
        }
        if let Some(branch) = &req.branch {
            body["branch"] = json!(branch);
        }
        let resp: WriteResponse = self.send(self.request(Method::PUT, url).json(&body)).await?;
        Ok(resp.commit)
    }

    async fn delete_file(&self, owner: &str, repo: &str, path: &str, message: &str, sha: &str, branch: Option<&str>) -> StoreResult<CommitRef> {
        let url = self.repo_url(owner, repo, std::iter::once("contents").chain(path.split('/')))?;
        let mut body = json!({ "message": message, "sha": sha });
        if let Some(branch) = branch {
            body["branch"] = json!(branch);
        }
        let resp: WriteResponse = self.send(self.request(Method::DELETE, url).json(&body)).await?;
        Ok(resp.commit)
    }

    async fn list_contents(&self, owner: &str, repo: &str, path: &str, reference: Option<&str>) -> StoreResult<Vec<ContentEntry>> {
        let mut url = self.repo_url(owner, repo, std::iter::once("contents").chain(path.split('/')))?;
        if let Some(r) = reference {
            url.query_pairs_mut().append_pair("ref", r);
        }
        match self.send::<DirOrFile>(self.request(Method::GET, url)).await? {
            DirOrFile::Dir(entries) => Ok(entries),
            DirOrFile::File(entry) => Ok(vec![entry]),
        }
    }

    async fn list_commits(&self, owner: &str, repo: &str, query: CommitQuery) -> StoreResult<serde_json::Value> {
        let mut url = self.repo_url(owner, repo, ["commits"])?;
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(path) = &query.path {
                pairs.append_pair("path", path);
            }
            if let Some(sha) = &query.sha {
                pairs.append_pair("sha", sha);
            }
            pairs.append_pair("per_page", &query.per_page.to_string());
        }
        self.send(self.request(Method::GET, url)).await
    }

    async fn search_code(&self, query: &str, per_page: u32) -> StoreResult<serde_json::Value> {
        let mut url = self.url(["search", "code"])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("per_page", &per_page.to_string());
        self.send(self.request(Method::GET, url)).await
    }
}
