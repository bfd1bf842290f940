//! Helpers for the `/`-separated absolute paths used by every store
//!  and by the overlay tree on top of it.

use crate::error::{Result, StoreError};

pub const SEPARATOR: char = '/';

/// Check that a path is absolute.
pub fn validate(path: &str) -> Result<()> {
    if !path.starts_with(SEPARATOR) {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

/// Strip trailing separators, keeping a lone `/` intact.
pub fn trim(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() && path.starts_with(SEPARATOR) {
        "/"
    } else {
        trimmed
    }
}

/// Join path pieces with exactly one separator between them.
pub fn combine(base: &str, name: &str) -> String {
    let mut out = String::with_capacity(base.len() + name.len() + 1);
    out.push_str(base);
    if !out.ends_with(SEPARATOR) {
        out.push(SEPARATOR);
    }
    out.push_str(name.trim_start_matches(SEPARATOR));
    out
}

/// Split an absolute path into its parent and final component.
///
/// `/a/b/` yields `("/a", "b")`, `/a` yields `("/", "a")` and `/` yields `("/", "")`.
pub fn split_parent(path: &str) -> (&str, &str) {
    let path = trim(path);
    match path.rfind(SEPARATOR) {
        Some(0) | None => ("/", path.trim_start_matches(SEPARATOR)),
        Some(pos) => (&path[..pos], &path[pos + 1..]),
    }
}

/// Iterate over the components below the root.
pub fn components(path: &str) -> impl Iterator<Item = &str> {
    let path = trim(path);
    let rest = path.strip_prefix(SEPARATOR).unwrap_or(path);
    rest.split(SEPARATOR).filter(move |_| !rest.is_empty())
}

/// Every ancestor of `path` below the root, shortest first, ending with `path` itself.
pub fn prefixes(path: &str) -> Vec<String> {
    let mut current = String::new();
    components(path)
        .map(|part| {
            current.push(SEPARATOR);
            current.push_str(part);
            current.clone()
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_parent() {
        assert_eq!(split_parent("/a/b"), ("/a", "b"));
        assert_eq!(split_parent("/a/b/"), ("/a", "b"));
        assert_eq!(split_parent("/a"), ("/", "a"));
        assert_eq!(split_parent("/"), ("/", ""));
    }

    #[test]
    fn test_combine() {
        assert_eq!(combine("/root", "meta"), "/root/meta");
        assert_eq!(combine("/root/", "meta"), "/root/meta");
        assert_eq!(combine("/", "meta"), "/meta");
        assert_eq!(combine("/data/abc", "/def"), "/data/abc/def");
    }

    #[test]
    fn test_components() {
        assert_eq!(components("/").count(), 0);
        assert_eq!(components("/a/b/c").collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(components("/a/b/").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(prefixes("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert!(prefixes("/").is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(validate("/ok").is_ok());
        assert!(validate("relative").is_err());
        assert!(validate("").is_err());
    }
}
