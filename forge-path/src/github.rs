//! The remote-Git backend: a GitHub repository pinned at a resolved commit,
//! served from an in-memory tree listing and an on-disk blob cache.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use thiserror::Error;

const API_VERSION: &str = "2022-11-28";
const METADATA_TIMEOUT: Duration = Duration::from_secs(3);
const BLOB_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_API_HOST: &str = "https://api.github.com";
const DEFAULT_RAW_HOST: &str = "https://raw.githubusercontent.com";

#[derive(Debug, Error)]
pub enum Error {
    #[error("GitHub request to {url} failed with status {status}")]
    Http { status: u16, url: String },
    #[error("GitHub request to {0} failed")]
    Transport(String, #[source] Box<ureq::Error>),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A process-wide cache of raw response bodies keyed by request URL, shared
/// by every [`Client`] regardless of when it was constructed — mirrors the
/// original's single `github.cache` map guarded by one mutex, so a second
/// resolution of the same ref or listing of the same tree, even from a
/// freshly built client, never re-issues the request.
fn response_cache() -> &'static Mutex<HashMap<String, Vec<u8>>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Vec<u8>>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

#[derive(Debug, Deserialize)]
struct RepoMeta {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct CommitMeta {
    sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub size: Option<u64>,
    #[allow(dead_code)]
    pub sha: String,
}

#[derive(Debug, Deserialize)]
struct TreeListing {
    tree: Vec<TreeEntry>,
    #[allow(dead_code)]
    truncated: bool,
}

/// A GitHub repository, its authentication, and the caches shared by every
/// [`crate::Path`] backed by it.
pub struct Client {
    agent: ureq::Agent,
    owner: String,
    repo: String,
    token: Option<String>,
    cache_dir: PathBuf,
    api_host: String,
    raw_host: String,
    trees: RwLock<HashMap<String, Arc<HashMap<String, TreeEntry>>>>,
}

impl Client {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: Option<String>, cache_dir: PathBuf) -> Self {
        Client::with_hosts(owner, repo, token, cache_dir, DEFAULT_API_HOST, DEFAULT_RAW_HOST)
    }

    /// Like [`Client::new`], but pointed at arbitrary API/raw-content hosts.
    /// Used in tests to target a local HTTP stub instead of github.com.
    fn with_hosts(
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: Option<String>,
        cache_dir: PathBuf,
        api_host: impl Into<String>,
        raw_host: impl Into<String>,
    ) -> Self {
        Client {
            agent: ureq::AgentBuilder::new().timeout(METADATA_TIMEOUT).build(),
            owner: owner.into(),
            repo: repo.into(),
            token,
            cache_dir,
            api_host: api_host.into(),
            raw_host: raw_host.into(),
            trees: RwLock::new(HashMap::new()),
        }
    }

    fn authed(&self, req: ureq::Request) -> ureq::Request {
        let req = req
            .set("Accept", "application/vnd.github+json")
            .set("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => req.set("Authorization", &format!("Bearer {token}")),
            None => req,
        }
    }

    /// Fetches and decodes `url`, serving from the process-wide response
    /// cache when a prior request (from any client) already populated it.
    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, Error> {
        if let Some(cached) = response_cache().lock().get(url) {
            return serde_json::from_slice(cached).map_err(|source| Error::Decode {
                url: url.to_string(),
                source,
            });
        }
        let resp = self
            .authed(self.agent.get(url))
            .call()
            .map_err(|e| match &e {
                ureq::Error::Status(status, _) => Error::Http {
                    status: *status,
                    url: url.to_string(),
                },
                ureq::Error::Transport(_) => Error::Transport(url.to_string(), Box::new(e)),
            })?;
        let mut bytes = Vec::new();
        std::io::copy(&mut resp.into_reader(), &mut bytes)?;
        let value = serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })?;
        response_cache().lock().insert(url.to_string(), bytes);
        Ok(value)
    }

    pub fn default_branch(&self) -> Result<String, Error> {
        let url = format!("{}/repos/{}/{}", self.api_host, self.owner, self.repo);
        let meta: RepoMeta = self.get_json(&url)?;
        Ok(meta.default_branch)
    }

    pub fn commit_sha(&self, ref_: &str) -> Result<String, Error> {
        let url = format!(
            "{}/repos/{}/{}/commits/{ref_}",
            self.api_host, self.owner, self.repo
        );
        let commit: CommitMeta = self.get_json(&url)?;
        Ok(commit.sha)
    }

    /// The recursive tree listing for `sha`, keyed by path. Cached for the
    /// lifetime of the client, and backed by the process-wide response cache
    /// that also survives across clients.
    pub fn tree(&self, sha: &str) -> Result<Arc<HashMap<String, TreeEntry>>, Error> {
        if let Some(cached) = self.trees.read().get(sha) {
            return Ok(Arc::clone(cached));
        }
        let url = format!(
            "{}/repos/{}/{}/git/trees/{sha}?recursive=true",
            self.api_host, self.owner, self.repo
        );
        let listing: TreeListing = self.get_json(&url)?;
        let by_path: HashMap<String, TreeEntry> =
            listing.tree.into_iter().map(|entry| (entry.path.clone(), entry)).collect();
        let by_path = Arc::new(by_path);
        self.trees.write().insert(sha.to_string(), Arc::clone(&by_path));
        Ok(by_path)
    }

    /// Fetches `path` at `sha`, serving from the on-disk cache when present.
    #[tracing::instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    pub fn blob(&self, sha: &str, path: &str) -> Result<Vec<u8>, Error> {
        let cache_path = self.cache_dir.join(&self.owner).join(&self.repo).join(sha).join(path);
        if let Ok(bytes) = fs::read(&cache_path) {
            tracing::debug!(%path, "cache hit");
            return Ok(bytes);
        }
        tracing::debug!(%path, "cache miss, fetching");
        let url = format!("{}/{}/{}/{sha}/{path}", self.raw_host, self.owner, self.repo);
        let resp = self
            .authed(self.agent.get(&url))
            .timeout(BLOB_TIMEOUT)
            .call()
            .map_err(|e| match &e {
                ureq::Error::Status(status, _) => Error::Http {
                    status: *status,
                    url: url.clone(),
                },
                ureq::Error::Transport(_) => Error::Transport(url.clone(), Box::new(e)),
            })?;
        let mut bytes = Vec::new();
        std::io::copy(&mut resp.into_reader(), &mut bytes)?;
        if let Some(parent) = cache_path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = fs::write(&cache_path, &bytes);
        Ok(bytes)
    }
}

/// What the user asked for the ref to be, before it is resolved to a sha.
#[derive(Clone)]
enum RefSpec {
    Unresolved(Option<String>),
    Resolved(String),
}

struct Resolution {
    spec: Mutex<RefSpec>,
}

/// A path within a GitHub repository, pinned at a (possibly not yet
/// resolved) ref.
#[derive(Clone)]
pub struct GitPath {
    client: Arc<Client>,
    segments: Vec<String>,
    resolution: Arc<Resolution>,
}

impl GitPath {
    pub fn new(client: Arc<Client>, path: &str, ref_: Option<String>) -> Self {
        let segments = split_segments(path);
        GitPath {
            client,
            segments,
            resolution: Arc::new(Resolution {
                spec: Mutex::new(RefSpec::Unresolved(ref_)),
            }),
        }
    }

    pub fn join(&self, parts: &[&str]) -> Self {
        let mut segments = self.segments.clone();
        for part in parts {
            for seg in split_segments(part) {
                match seg.as_str() {
                    "." => {}
                    ".." => {
                        segments.pop();
                    }
                    _ => segments.push(seg),
                }
            }
        }
        GitPath {
            client: Arc::clone(&self.client),
            segments,
            resolution: Arc::clone(&self.resolution),
        }
    }

    fn path(&self) -> String {
        self.segments.join("/")
    }

    /// Resolves the ref to a commit sha and fetches the recursive tree
    /// listing, memoizing both for every path sharing this repository.
    fn init(&self) -> Result<(String, Arc<HashMap<String, TreeEntry>>), Error> {
        let mut spec = self.resolution.spec.lock();
        let sha = match &*spec {
            RefSpec::Resolved(sha) => sha.clone(),
            RefSpec::Unresolved(ref_) => {
                let ref_ = match ref_ {
                    Some(r) => r.clone(),
                    None => self.client.default_branch()?,
                };
                let sha = self.client.commit_sha(&ref_)?;
                *spec = RefSpec::Resolved(sha.clone());
                sha
            }
        };
        drop(spec);
        let tree = self.client.tree(&sha)?;
        Ok((sha, tree))
    }

    pub fn exists(&self) -> Result<bool, Error> {
        let (_, tree) = self.init()?;
        if self.segments.is_empty() {
            return Ok(true);
        }
        Ok(tree.contains_key(&self.path()))
    }

    pub fn is_dir(&self) -> Result<bool, Error> {
        let (_, tree) = self.init()?;
        if self.segments.is_empty() {
            return Ok(true);
        }
        Ok(tree.get(&self.path()).map(|e| e.kind == "tree").unwrap_or(false))
    }

    pub fn open(&self) -> Result<Vec<u8>, Error> {
        let (sha, _) = self.init()?;
        self.client.blob(&sha, &self.path())
    }

    pub fn sha(&self) -> Option<String> {
        match &*self.resolution.spec.lock() {
            RefSpec::Resolved(sha) => Some(sha.clone()),
            RefSpec::Unresolved(_) => None,
        }
    }

}

impl std::fmt::Display for GitPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "https://github.com/{}/{}.git", self.client.owner, self.client.repo)?;
        if !self.segments.is_empty() {
            write!(f, "/{}", self.path())?;
        }
        if let Some(sha) = self.sha() {
            write!(f, "?ref={sha}")?;
        } else if let RefSpec::Unresolved(Some(ref_)) = &*self.resolution.spec.lock() {
            write!(f, "?ref={ref_}")?;
        }
        Ok(())
    }
}

fn split_segments(path: &str) -> Vec<String> {
    path.split('/').filter(|s| !s.is_empty()).map(str::to_string).collect()
}

/// Matches `[https://]github.com/{owner}/{repo}[.git][/path][?ref=...]`.
pub fn parse_remote(input: &str) -> Option<(String, String, Option<String>, Option<String>)> {
    let rest = input
        .strip_prefix("https://")
        .or_else(|| input.strip_prefix("http://"))
        .unwrap_or(input);
    let rest = rest.strip_prefix("github.com/")?;

    let (rest, ref_) = match rest.split_once("?ref=") {
        Some((before, r)) => (before, Some(r.to_string())),
        None => (rest, None),
    };

    let mut parts = rest.splitn(3, '/');
    let owner = parts.next()?.to_string();
    let mut repo = parts.next()?.to_string();
    if repo.is_empty() || owner.is_empty() {
        return None;
    }
    let path = parts.next().map(str::to_string);
    if let Some(stripped) = repo.strip_suffix(".git") {
        repo = stripped.to_string();
    }
    Some((owner, repo, path, ref_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Serves exactly `requests` HTTP requests against a fixed fixture, then
    /// stops accepting. Returns the stub's base URL and a counter of
    /// requests actually handled.
    fn spawn_stub(sha: &str, tree: Vec<u8>, blob: Vec<u8>, requests: usize) -> (String, Arc<AtomicUsize>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().expect("stub listens on a TCP socket");
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_thread = Arc::clone(&hits);
        let sha = sha.to_string();
        thread::spawn(move || {
            for request in server.incoming_requests().take(requests) {
                hits_thread.fetch_add(1, Ordering::SeqCst);
                let url = request.url().to_string();
                let response = if url.contains("/commits/") {
                    tiny_http::Response::from_data(format!(r#"{{"sha":"{sha}"}}"#).into_bytes())
                } else if url.contains("/git/trees/") {
                    tiny_http::Response::from_data(tree.clone())
                } else {
                    tiny_http::Response::from_data(blob.clone())
                };
                let _ = request.respond(response);
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn tree_fixture(path: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "tree": [{"path": path, "type": "blob", "sha": "deadbeef"}],
            "truncated": false,
        }))
        .unwrap()
    }

    #[test]
    fn second_open_serves_the_blob_from_the_on_disk_cache() {
        let cache_dir = tempfile::tempdir().unwrap();
        let (base, hits) = spawn_stub("c0ffee", tree_fixture("values.yaml"), b"value: 1\n".to_vec(), 3);
        let client = Arc::new(Client::with_hosts(
            "acme-cache-test",
            "widgets",
            None,
            cache_dir.path().to_path_buf(),
            base.clone(),
            base,
        ));
        let git_path = GitPath::new(client, "values.yaml", Some("main".to_string()));

        let first = git_path.open().unwrap();
        assert_eq!(first, b"value: 1\n");
        // ref resolution + tree listing + blob == 3 requests so far.
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        let second = git_path.open().unwrap();
        assert_eq!(second, first);
        assert_eq!(hits.load(Ordering::SeqCst), 3, "second open must not hit the network");
    }

    #[test]
    fn a_fresh_client_resolves_ref_and_tree_from_the_process_cache() {
        let cache_dir = tempfile::tempdir().unwrap();
        let (base, hits) = spawn_stub("c0ffee", tree_fixture("values.yaml"), b"value: 1\n".to_vec(), 2);
        let owner = "acme-process-cache-test";

        let first_client = Arc::new(Client::with_hosts(
            owner,
            "widgets",
            None,
            cache_dir.path().to_path_buf(),
            base.clone(),
            base.clone(),
        ));
        GitPath::new(first_client, "values.yaml", Some("main".to_string())).exists().unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2, "ref resolution + tree listing");

        // A second, independently constructed client for the same
        // owner/repo/ref must resolve the commit sha and tree listing from
        // the process-wide response cache rather than the network.
        let second_client = Arc::new(Client::with_hosts(
            owner,
            "widgets",
            None,
            cache_dir.path().to_path_buf(),
            base.clone(),
            base,
        ));
        let second_path = GitPath::new(second_client, "values.yaml", Some("main".to_string()));
        assert!(second_path.exists().unwrap());
        assert!(!second_path.is_dir().unwrap());
        assert_eq!(hits.load(Ordering::SeqCst), 2, "a fresh client must not repeat the network calls");
    }

    #[test]
    fn parse_remote_extracts_owner_repo_path_and_ref() {
        let (owner, repo, path, ref_) = parse_remote("github.com/acme/widgets/base?ref=main").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "widgets");
        assert_eq!(path.as_deref(), Some("base"));
        assert_eq!(ref_.as_deref(), Some("main"));
    }
}
