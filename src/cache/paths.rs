// Cache path utilities.
// Maps cache keys onto files under the platform cache directory.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Get the base cache directory (~/.cache/repopulse on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "repopulse").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Path to the file holding the entry for `key`.
pub fn entry_path(root: &Path, key: &str) -> PathBuf {
    root.join(format!("{}.json", encode_key(key)))
}

/// Encode a key as a file name.
/// Escapes every byte outside `[A-Za-z0-9._-]`, so distinct keys never share a file.
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'_' | b'-' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}
