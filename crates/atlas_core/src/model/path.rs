//! Repository-relative path normalization.

/// Normalized form of the repository root.
pub const ROOT_PATH: &str = ".";

/// Normalizes a repository-relative path.
///
/// Strips surrounding whitespace, every leading `./`, and trailing `/`.
/// Empty input and `.` both map to [`ROOT_PATH`].
pub fn normalize_path(path: &str) -> String {
    let mut current = path.trim();
    while let Some(rest) = current.strip_prefix("./") {
        current = rest;
    }
    let current = current.trim_end_matches('/');
    if current.is_empty() || current == ROOT_PATH {
        ROOT_PATH.to_string()
    } else {
        current.to_string()
    }
}

/// Joins a normalized directory and a child name. Root joins to the bare name.
pub fn join_path(directory: &str, name: &str) -> String {
    let directory = normalize_path(directory);
    if directory == ROOT_PATH {
        name.to_string()
    } else {
        format!("{directory}/{name}")
    }
}

/// Returns the normalized parent directory of `path`.
pub fn parent_path(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rsplit_once('/') {
        Some((parent, _)) => normalize_path(parent),
        None => ROOT_PATH.to_string(),
    }
}

/// Returns the last segment of `path`, or `.` for the root.
pub fn file_name(path: &str) -> String {
    let normalized = normalize_path(path);
    match normalized.rsplit_once('/') {
        Some((_, name)) => name.to_string(),
        None => normalized,
    }
}

/// Renders a normalized directory the way the tree API reports parents:
/// `.` for the root, `./<dir>` otherwise.
pub fn display_parent(directory: &str) -> String {
    let normalized = normalize_path(directory);
    if normalized == ROOT_PATH {
        normalized
    } else {
        format!("./{normalized}")
    }
}

/// Rejects empty paths, absolute paths, and `..` segments.
pub fn is_safe_relative_path(path: &str) -> bool {
    let trimmed = path.trim();
    !trimmed.is_empty()
        && !trimmed.starts_with('/')
        && !trimmed.contains('\\')
        && trimmed.split('/').all(|segment| segment != "..")
}
