//! Filesystem adapter contract and URI handling for Ember data sources.
//!
//! Architecture role:
//! - defines the [`FileSystem`] trait the spec provider consumes
//! - hosts the scheme registry resolving `local`, `s3`, `gs`, `abfs`
//! - provides the local adapter and URI parse/render helpers
//!
//! Cloud adapters are external: their schemes resolve only after an adapter
//! is registered at startup, otherwise lookups fail as unsupported.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use ember_common::{EmberError, Result};

pub mod local;
pub mod uri;

pub use local::LocalFileSystem;
pub use uri::{parse, render, Uri, LOCAL_SCHEME};

/// Metadata of one file or directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Last-modified time, unix seconds.
    pub timestamp: u64,
    /// Size in bytes.
    pub size: u64,
    /// Full path or object key.
    pub name: String,
    /// Bucket/container for object stores, empty for local files.
    pub domain: String,
}

impl FileInfo {
    /// Content-change signature: any rename, resize, or rewrite produces a
    /// different value, which the spec provider folds into spec ids.
    pub fn signature(&self) -> String {
        format!("{}_{}_{}", self.name, self.size, self.timestamp)
    }
}

/// Data-access contract consumed by the spec provider and block loaders.
pub trait FileSystem: Send + Sync {
    /// List a folder or a single path, returning entry metadata.
    fn list(&self, path: &str) -> Result<Vec<FileInfo>>;
    /// Read up to `len` bytes at `offset` into `buf`, returning bytes read.
    fn read(&self, path: &str, offset: u64, len: usize, buf: &mut [u8]) -> Result<usize>;
    /// Metadata of one path.
    fn info(&self, path: &str) -> Result<FileInfo>;
    /// Copy a file, typically to stage a remote object locally.
    fn copy(&self, from: &str, to: &str) -> Result<()>;
    /// Mirror `from` into `to`, optionally recursing into directories.
    fn sync(&self, from: &str, to: &str, recursive: bool) -> Result<()>;
    /// Create a temp file or directory and return its path.
    fn temp(&self, is_dir: bool) -> Result<String>;
    /// Remove a path and everything under it.
    fn rm(&self, path: &str) -> Result<()>;
}

impl std::fmt::Debug for dyn FileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn FileSystem")
    }
}

type SchemeRegistry = RwLock<HashMap<String, Arc<dyn FileSystem>>>;

fn registry() -> &'static SchemeRegistry {
    static REGISTRY: OnceLock<SchemeRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Register an adapter for a scheme (`s3`, `gs`, `abfs`, or custom).
pub fn register_filesystem(scheme: &str, fs: Arc<dyn FileSystem>) {
    registry()
        .write()
        .expect("filesystem registry lock")
        .insert(scheme.to_ascii_lowercase(), fs);
}

/// Resolve the adapter for a scheme.
///
/// `local` (and the empty scheme) always resolve; cloud schemes resolve only
/// after [`register_filesystem`].
pub fn filesystem_for(scheme: &str) -> Result<Arc<dyn FileSystem>> {
    let scheme = scheme.to_ascii_lowercase();
    if let Some(fs) = registry()
        .read()
        .expect("filesystem registry lock")
        .get(&scheme)
    {
        return Ok(Arc::clone(fs));
    }
    if scheme.is_empty() || scheme == LOCAL_SCHEME {
        return Ok(Arc::new(LocalFileSystem));
    }
    Err(EmberError::Unsupported(format!(
        "no filesystem adapter registered for scheme '{scheme}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_encodes_name_size_and_timestamp() {
        let info = FileInfo {
            is_dir: false,
            timestamp: 1_700_000_000,
            size: 42,
            name: "/data/events/part-0".to_string(),
            domain: String::new(),
        };
        assert_eq!(info.signature(), "/data/events/part-0_42_1700000000");
    }

    #[test]
    fn local_scheme_resolves_without_registration() {
        assert!(filesystem_for("local").is_ok());
        assert!(filesystem_for("").is_ok());
    }

    #[test]
    fn unregistered_cloud_scheme_is_unsupported() {
        let err = filesystem_for("abfs").expect_err("must fail");
        assert!(matches!(err, EmberError::Unsupported(_)));
    }
}
