//! The local filesystem backend.

use std::fs;
use std::path::PathBuf;

#[derive(Clone)]
pub struct LocalPath {
    cur: PathBuf,
}

impl LocalPath {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalPath { cur: root.into() }
    }

    pub fn join(&self, parts: &[&str]) -> Self {
        let mut cur = self.cur.clone();
        for part in parts {
            let part = PathBuf::from(part);
            if part.is_absolute() {
                cur = part;
            } else {
                cur.push(part);
            }
        }
        LocalPath { cur }
    }

    pub fn exists(&self) -> std::io::Result<bool> {
        Ok(self.cur.exists())
    }

    pub fn is_dir(&self) -> std::io::Result<bool> {
        Ok(self.cur.is_dir())
    }

    pub fn open(&self) -> std::io::Result<Vec<u8>> {
        fs::read(&self.cur)
    }

}

impl std::fmt::Display for LocalPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.cur.display())
    }
}
