//! Materialized path helpers
//!
//! Every tenant stores its ancestry as a `/`-joined chain of codes, root first
//! (e.g. `MIN/CROU-A/SVC-1`). All path composition and level derivation in the
//! crate goes through this module so the invariants live in one place:
//!
//! - `path == parent.path + "/" + code` (root: `path == code`)
//! - `level == segments(path) - 1`

/// Separator between path segments
pub const PATH_SEPARATOR: char = '/';

/// Byte immediately after [`PATH_SEPARATOR`] in ASCII order.
///
/// Used as the exclusive upper bound of descendant range scans.
const SEPARATOR_SUCCESSOR: char = '0';

/// Build the path of a node from its parent's path and its own code.
pub fn compose_path(parent_path: Option<&str>, code: &str) -> String {
    match parent_path {
        Some(parent) => format!("{}{}{}", parent, PATH_SEPARATOR, code),
        None => code.to_string(),
    }
}

/// Depth of a node derived from its path (root = 0)
pub fn level_of(path: &str) -> i64 {
    path.split(PATH_SEPARATOR).count() as i64 - 1
}

/// Inclusive lower and exclusive upper bound of every strict descendant path.
///
/// `path >= lower AND path < upper` selects exactly the paths starting with
/// `"<path>/"` under binary collation, without the wildcard pitfalls of `LIKE`.
pub fn descendant_range(path: &str) -> (String, String) {
    (
        format!("{}{}", path, PATH_SEPARATOR),
        format!("{}{}", path, SEPARATOR_SUCCESSOR),
    )
}

/// Whether `candidate` is `root` itself or lies below it
pub fn is_within(candidate: &str, root: &str) -> bool {
    candidate == root
        || candidate
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with(PATH_SEPARATOR))
}

/// Paths of every proper ancestor, root first.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    (1..segments.len())
        .map(|len| segments[..len].join(&PATH_SEPARATOR.to_string()))
        .collect()
}

/// Replace the `old_root` prefix of a descendant path with `new_root`.
///
/// Returns `None` when `path` is not strictly below `old_root`.
pub fn rebase_path(path: &str, old_root: &str, new_root: &str) -> Option<String> {
    let rest = path.strip_prefix(old_root)?;
    if !rest.starts_with(PATH_SEPARATOR) {
        return None;
    }
    Some(format!("{}{}", new_root, rest))
}
