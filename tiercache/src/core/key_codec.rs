//! Application key -> backend key normalization

use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    static ref SEPARATORS: Regex = Regex::new(r"[/\\]").unwrap();
    static ref DOT_RUNS: Regex = Regex::new(r"\.{2,}").unwrap();
    static ref EDGE_DOTS: Regex = Regex::new(r"^\.+|\.+$").unwrap();
    static ref EDGE_COLONS: Regex = Regex::new(r"^:+|:+$").unwrap();
}

/// Turns application keys and file paths into namespaced backend keys
///
/// Holds the root directory stripped from file paths; the root is fixed
/// for the lifetime of the codec.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    root: String,
}

impl KeyCodec {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_string_lossy().into_owned(),
        }
    }

    /// Codec rooted at the parent directory of the running executable
    pub fn from_entry_point() -> Self {
        let root = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(PathBuf::new);
        Self::new(root)
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Normalize `raw_key` and prefix it with `namespace`
    ///
    /// Steps run in a fixed order, each on the previous output:
    /// separators become `:`, dot runs collapse to one `.`, edge dots are
    /// stripped, edge colons are stripped, then `"<namespace>:"` is
    /// prepended.
    pub fn normalize(raw_key: &str, namespace: &str) -> String {
        let key = SEPARATORS.replace_all(raw_key, ":");
        let key = DOT_RUNS.replace_all(&key, ".");
        let key = EDGE_DOTS.replace_all(&key, "");
        let key = EDGE_COLONS.replace_all(&key, "");
        format!("{}:{}", namespace, key)
    }

    /// Strip `root_path` as a literal prefix of `file_path`, then normalize
    ///
    /// Only a single leading occurrence is removed; paths outside the root
    /// pass through unchanged.
    pub fn derive_file_key(file_path: &str, root_path: &str, namespace: &str) -> String {
        let relative = if root_path.is_empty() {
            file_path
        } else {
            file_path.strip_prefix(root_path).unwrap_or(file_path)
        };
        Self::normalize(relative, namespace)
    }

    /// Backend key for a file path relative to this codec's root
    pub fn file_key(&self, file_path: impl AsRef<Path>, namespace: &str) -> String {
        let path = file_path.as_ref().to_string_lossy();
        Self::derive_file_key(&path, &self.root, namespace)
    }
}
