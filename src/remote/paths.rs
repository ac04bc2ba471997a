//! Helpers for forward-slash remote paths.

use std::path::{Component, Path};

pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Joins `name` under `base`, always producing forward slashes.
pub fn join_remote(base: &str, name: &str) -> String {
    let base = normalize_separators(base);
    let name = normalize_separators(name);
    let name = name.trim_start_matches('/');
    if base.is_empty() {
        return name.to_string();
    }
    if name.is_empty() {
        return base;
    }
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// Maps a path relative to a local root onto `remote_base`. An empty relative
/// path maps to `remote_base` itself.
pub fn join_relative(remote_base: &str, relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .fold(normalize_separators(remote_base), |acc, part| {
            join_remote(&acc, &part)
        })
}

/// Splits a directory path into `(parent, leaf)` after trimming one trailing
/// separator. The parent of a top-level absolute entry is `/`; a bare name
/// has an empty parent.
pub fn split_parent(dir: &str) -> (String, String) {
    let trimmed = dir.strip_suffix('/').unwrap_or(dir);
    match trimmed.rsplit_once('/') {
        Some(("", leaf)) => ("/".to_string(), leaf.to_string()),
        Some((parent, leaf)) => (parent.to_string(), leaf.to_string()),
        None => (String::new(), trimmed.to_string()),
    }
}

/// Last path segment of a local path, regardless of which separator the
/// caller used.
pub fn local_basename(path: &Path) -> Option<String> {
    let text = normalize_separators(&path.to_string_lossy());
    let trimmed = text.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

pub fn looks_like_dir(remote: &str) -> bool {
    remote.ends_with('/') || remote.ends_with('\\')
}

/// Single-quotes a value for a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
