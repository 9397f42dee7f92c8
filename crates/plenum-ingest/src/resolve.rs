// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

/// Resolve a logical dataset path to the concrete file to read: prefer the
/// gzip variant, then the zstd variant, then the plain file. When none
/// exists the literal requested path is returned so the caller's open fails
/// with a clear not-found instead of a resolver error. No side effects;
/// same filesystem state yields the same result.
#[must_use]
pub fn resolve_source(logical: &Path) -> PathBuf {
    for ext in ["gz", "zst"] {
        let candidate = append_extension(logical, ext);
        if candidate.is_file() {
            return candidate;
        }
    }
    logical.to_path_buf()
}

fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}
