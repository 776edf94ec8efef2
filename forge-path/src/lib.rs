//! A uniform address space spanning the local filesystem and remote Git
//! content, with on-demand tree enumeration and cached content fetch.
//!
//! [`Path`] is an immutable handle created by [`Path::parse`] or
//! [`Path::local`]; [`Path::join`] returns a new, unresolved `Path`. Network
//! or filesystem I/O only happens inside [`Path::exists`], [`Path::is_dir`],
//! and [`Path::open`] — construction and [`Path::join`] never touch I/O.

mod github;
mod local;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

pub use github::Client as GitHubClient;

/// The name of the environment variable carrying a GitHub bearer token.
pub const GITHUB_TOKEN_VAR: &str = "GITHUB_TOKEN";
/// The name of the environment variable overriding the blob content cache
/// directory. Defaults to `{tempdir}/forge`.
pub const CACHE_DIR_VAR: &str = "FORGE_CACHE_DIR";

#[derive(Debug, Error)]
pub enum Error {
    #[error("path does not exist: {0}")]
    NotFound(String),
    #[error("not a file: {0}")]
    NotAFile(String),
    #[error("unsupported path scheme: {0:?}")]
    UnsupportedScheme(String),
    #[error("reading {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("remote Git request for {path}")]
    Remote {
        path: String,
        #[source]
        source: github::Error,
    },
}

#[derive(Clone)]
enum Repr {
    Local(local::LocalPath),
    Git(github::GitPath),
}

/// An address pointing at either a local filesystem location or a remote
/// Git location pinned to a (possibly lazily resolved) commit.
#[derive(Clone)]
pub struct Path(Repr);

impl Path {
    /// A `Path` anchored at a local filesystem root.
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Path(Repr::Local(local::LocalPath::new(root)))
    }

    /// A `Path` anchored at a GitHub repository, sharing `client`'s caches
    /// with every other `Path` built from the same client.
    pub fn github(client: Arc<GitHubClient>, path: &str, ref_: Option<String>) -> Self {
        Path(Repr::Git(github::GitPath::new(client, path, ref_)))
    }

    /// Parses a user-facing path string.
    ///
    /// `github.com/{owner}/{repo}[.git][/path][?ref=...]` (with an optional
    /// `https://`/`http://` prefix) resolves to the remote Git backend,
    /// authenticated from [`GITHUB_TOKEN_VAR`] and cached under
    /// [`CACHE_DIR_VAR`] (or a temp directory). Anything else resolves to
    /// the local filesystem, relative to `root`.
    pub fn parse(input: &str, root: impl AsRef<std::path::Path>) -> Self {
        if let Some((owner, repo, path, ref_)) = github::parse_remote(input) {
            let token = env::var(GITHUB_TOKEN_VAR).ok();
            let cache_dir = env::var(CACHE_DIR_VAR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| env::temp_dir().join("forge"));
            let client = Arc::new(GitHubClient::new(owner, repo, token, cache_dir));
            return Path::github(client, path.as_deref().unwrap_or(""), ref_);
        }
        let base = std::path::Path::new(input);
        let resolved = if base.is_absolute() {
            base.to_path_buf()
        } else {
            root.as_ref().join(base)
        };
        Path::local(resolved)
    }

    /// True when this string would parse to a local-filesystem `Path` that
    /// is itself not an absolute OS path — i.e. it should be joined against
    /// the current build root rather than treated as self-contained.
    pub fn is_relative_spec(input: &str) -> bool {
        github::parse_remote(input).is_none() && !std::path::Path::new(input).is_absolute()
    }

    /// Returns a new `Path` with `segments` appended. Never performs I/O.
    pub fn join(&self, segments: &[&str]) -> Self {
        match &self.0 {
            Repr::Local(p) => Path(Repr::Local(p.join(segments))),
            Repr::Git(p) => Path(Repr::Git(p.join(segments))),
        }
    }

    /// Whether the addressed location exists.
    pub fn exists(&self) -> Result<bool, Error> {
        match &self.0 {
            Repr::Local(p) => p.exists().map_err(|source| self.io_err(source)),
            Repr::Git(p) => p.exists().map_err(|source| self.remote_err(source)),
        }
    }

    /// Whether the addressed location is a directory. Not-found is reported
    /// as `Ok(false)`.
    pub fn is_dir(&self) -> Result<bool, Error> {
        match &self.0 {
            Repr::Local(p) => p.is_dir().map_err(|source| self.io_err(source)),
            Repr::Git(p) => p.is_dir().map_err(|source| self.remote_err(source)),
        }
    }

    /// Opens the addressed location for reading, returning its full
    /// contents.
    pub fn open(&self) -> Result<Vec<u8>, Error> {
        match &self.0 {
            Repr::Local(p) => {
                if !p.exists().unwrap_or(false) {
                    return Err(Error::NotFound(self.to_string()));
                }
                if p.is_dir().unwrap_or(false) {
                    return Err(Error::NotAFile(self.to_string()));
                }
                p.open().map_err(|source| self.io_err(source))
            }
            Repr::Git(p) => p.open().map_err(|source| self.remote_err(source)),
        }
    }

    fn io_err(&self, source: std::io::Error) -> Error {
        Error::Io {
            path: self.to_string(),
            source,
        }
    }

    fn remote_err(&self, source: github::Error) -> Error {
        Error::Remote {
            path: self.to_string(),
            source,
        }
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Repr::Local(p) => write!(f, "{p}"),
            Repr::Git(p) => write!(f, "{p}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_join_and_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.yaml"), b"x: 1").unwrap();
        let root = Path::local(dir.path());
        let file = root.join(&["a.yaml"]);
        assert!(file.exists().unwrap());
        assert!(!file.is_dir().unwrap());
        assert_eq!(file.open().unwrap(), b"x: 1");
    }

    #[test]
    fn local_missing_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::local(dir.path());
        let missing = root.join(&["nope.yaml"]);
        assert!(!missing.exists().unwrap());
        assert!(matches!(missing.open(), Err(Error::NotFound(_))));
    }

    #[test]
    fn parse_dispatches_remote_git() {
        let dir = tempfile::tempdir().unwrap();
        let p = Path::parse("github.com/acme/widgets/base?ref=main", dir.path());
        assert!(p.to_string().starts_with("https://github.com/acme/widgets.git/base"));
    }

    #[test]
    fn parse_dispatches_local() {
        let dir = tempfile::tempdir().unwrap();
        let p = Path::parse("sub/dir", dir.path());
        assert_eq!(p.to_string(), dir.path().join("sub/dir").display().to_string());
    }

    #[test]
    fn relative_spec_detection() {
        assert!(Path::is_relative_spec("sub/dir"));
        assert!(!Path::is_relative_spec("/abs/dir"));
        assert!(!Path::is_relative_spec("github.com/acme/widgets"));
    }
}
