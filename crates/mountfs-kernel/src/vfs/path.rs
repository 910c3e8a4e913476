//! Lexical helpers for `/`-separated virtual paths.
//!
//! Virtual paths never touch the host filesystem, so they are handled as
//! plain strings rather than `std::path::Path`.

/// Path separator for virtual paths.
pub const SEPARATOR: char = '/';

/// Clean a path into canonical absolute form.
///
/// Collapses repeated separators, resolves `.` and `..` lexically (`..` at
/// the root stays at the root) and strips any trailing separator except for
/// the root itself. An empty input yields `/`.
pub fn clean(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split(SEPARATOR) {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return SEPARATOR.to_string();
    }

    let mut out = String::with_capacity(path.len() + 1);
    for part in parts {
        out.push(SEPARATOR);
        out.push_str(part);
    }
    out
}

/// Parent directory of a cleaned path. The parent of `/` is `/`.
pub fn parent(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Final component of a cleaned path. The root has an empty base name.
pub fn base_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Join `rel` onto `base` and clean the result.
///
/// An absolute `rel` is not special-cased: it is appended like any other
/// component list, so callers must check for absolute targets themselves.
pub fn join(base: &str, rel: &str) -> String {
    clean(&format!("{base}/{rel}"))
}

/// Returns true if `prefix` covers `path` on a component boundary.
///
/// `/data` covers `/data` and `/data/x` but not `/dataset`; `/` covers
/// everything.
pub fn has_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(SEPARATOR),
        None => false,
    }
}

/// Strip a boundary-respecting `prefix` from `path`, keeping the result
/// rooted at `/`.
///
/// Returns `None` when `prefix` does not cover `path`.
pub fn strip_mount_prefix(path: &str, prefix: &str) -> Option<String> {
    if !has_prefix(path, prefix) {
        return None;
    }
    if prefix == "/" {
        return Some(path.to_string());
    }
    let rest = &path[prefix.len()..];
    if rest.is_empty() {
        Some(SEPARATOR.to_string())
    } else {
        Some(rest.to_string())
    }
}

/// Iterate over every prefix of a cleaned path, shortest first, ending with
/// the full path. The root itself is not yielded.
pub fn prefixes(path: &str) -> impl Iterator<Item = &str> {
    path.char_indices()
        .filter(|&(idx, c)| c == SEPARATOR && idx > 0)
        .map(move |(idx, _)| &path[..idx])
        .chain(std::iter::once(path).filter(|p| *p != "/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), "/");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("//data///users/"), "/data/users");
        assert_eq!(clean("data"), "/data");
        assert_eq!(clean("/a/./b/../c"), "/a/c");
        assert_eq!(clean("/../.."), "/");
    }

    #[test]
    fn test_parent_and_base_name() {
        assert_eq!(parent("/mnt/dir/link"), "/mnt/dir");
        assert_eq!(parent("/mnt"), "/");
        assert_eq!(parent("/"), "/");
        assert_eq!(base_name("/mnt/dir/link"), "link");
        assert_eq!(base_name("/"), "");
    }

    #[test]
    fn test_join_relative() {
        assert_eq!(join("/mnt/dir2", "../dir1/file.txt"), "/mnt/dir1/file.txt");
        assert_eq!(join("/", "a"), "/a");
    }

    #[test]
    fn test_prefix_boundary() {
        assert!(has_prefix("/data", "/data"));
        assert!(has_prefix("/data/file", "/data"));
        assert!(!has_prefix("/dataset", "/data"));
        assert!(has_prefix("/anything", "/"));
    }

    #[test]
    fn test_strip_mount_prefix() {
        assert_eq!(strip_mount_prefix("/data", "/data").as_deref(), Some("/"));
        assert_eq!(
            strip_mount_prefix("/data/users/alice", "/data/users").as_deref(),
            Some("/alice")
        );
        assert_eq!(strip_mount_prefix("/other/file", "/").as_deref(), Some("/other/file"));
        assert_eq!(strip_mount_prefix("/dataset", "/data"), None);
    }

    #[test]
    fn test_prefixes() {
        let all: Vec<_> = prefixes("/a/b/c").collect();
        assert_eq!(all, vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(prefixes("/").count(), 0);
    }
}
