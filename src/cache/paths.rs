// Cache path utilities.
// Resolves the per-user cache directory and maps signatures to entry files.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// File extension of a cache entry.
pub const ENTRY_EXTENSION: &str = "json";

/// Get the base cache directory (~/.cache/econops on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "econops").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Default directory holding cached responses.
pub fn responses_dir() -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("responses"))
}

/// Path to the entry file for a signature inside `dir`.
/// Returns `None` for an empty signature.
pub fn entry_path(dir: &Path, signature: &str) -> Option<PathBuf> {
    if signature.is_empty() {
        return None;
    }
    Some(dir.join(format!("{}.{}", file_stem(signature), ENTRY_EXTENSION)))
}

/// Whether a directory entry looks like a cached response.
pub fn is_entry(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION)
}

/// File name stem for a signature.
/// Plain `[0-9A-Za-z_-]` signatures are used as is; anything else is
/// hex-encoded behind a `~` prefix, which plain names never contain.
fn file_stem(signature: &str) -> String {
    let plain = signature
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if plain {
        signature.to_string()
    } else {
        format!("~{}", hex::encode(signature))
    }
}
