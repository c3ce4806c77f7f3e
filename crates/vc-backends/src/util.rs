// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Small helpers shared by the backends

use regex::Regex;
use std::sync::OnceLock;

use vc_core::{VcError, VcResult};

/// Compile `pattern` once and keep it for the life of the process.
pub(crate) fn static_regex(
    cell: &'static OnceLock<Regex>,
    pattern: &str,
) -> VcResult<&'static Regex> {
    if let Some(re) = cell.get() {
        return Ok(re);
    }
    let re = Regex::new(pattern)
        .map_err(|e| VcError::Config(format!("bad pattern {}: {}", pattern, e)))?;
    Ok(cell.get_or_init(|| re))
}

/// Canonical repository-relative path: forward slashes, no leading or
/// trailing slash, no `.` segments. Parent references are rejected.
pub fn normalize_path(path: &str) -> VcResult<String> {
    let mut parts = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(VcError::InvalidPath(path.to_string())),
            s => parts.push(s),
        }
    }
    Ok(parts.join("/"))
}

/// Split a normalized path into its directory and file name.
pub fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

/// Join two normalized paths, either of which may be empty.
pub fn join_path(dir: &str, name: &str) -> String {
    match (dir.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => dir.to_string(),
        _ => format!("{}/{}", dir, name),
    }
}

/// Join a sourceroot (a local path or URL) with a relative path.
pub fn under_root(root: &str, path: &str) -> String {
    let root = root.trim_end_matches('/');
    if path.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root, path)
    }
}
