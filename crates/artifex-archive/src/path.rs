//! Compound paths: entries addressed across nested archive layers.
//!
//! `outer.zip!/inner.tar.gz!/data/file.txt` names `data/file.txt` inside
//! `inner.tar.gz`, which is itself an entry of `outer.zip`.

use std::fmt;

/// Separator between archive layers.
pub const SEPARATOR: &str = "!/";

/// A path split into per-layer segments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompoundPath {
    segments: Vec<String>,
}

impl CompoundPath {
    /// Split `path` on [`SEPARATOR`].
    ///
    /// Trailing empty segments are dropped. With `keep_trailing_empty`, a
    /// path ending in the separator gets exactly one empty last segment,
    /// meaning the root of the last-named archive.
    pub fn split(path: &str, keep_trailing_empty: bool) -> Self {
        let mut segments: Vec<String> = path.split(SEPARATOR).map(str::to_string).collect();
        if segments.len() > 1 {
            while segments.last().is_some_and(String::is_empty) {
                segments.pop();
            }
        }
        if keep_trailing_empty && path.ends_with(SEPARATOR) {
            segments.push(String::new());
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when the path crosses at least one archive boundary.
    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }
}

impl fmt::Display for CompoundPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join(SEPARATOR))
    }
}

impl<S: Into<String>> FromIterator<S> for CompoundPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Convert backslashes to `/` and collapse runs of slashes.
pub fn convert_and_collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        let c = if c == '\\' { '/' } else { c };
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Comparison form of a segment or entry name: slashes converted and
/// collapsed, one leading and one trailing slash removed.
pub fn normalize(segment: &str) -> String {
    let collapsed = convert_and_collapse_slashes(segment);
    let trimmed = collapsed.strip_prefix('/').unwrap_or(&collapsed);
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    trimmed.to_string()
}

pub(crate) fn strip_leading_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

fn trim_slashes(path: &str) -> &str {
    path.trim_start_matches('/').trim_end_matches('/')
}

/// Equality ignoring leading and trailing slashes.
pub fn path_eq(a: &str, b: &str) -> bool {
    trim_slashes(a) == trim_slashes(b)
}

/// True when a raw entry name addresses `segment`.
pub fn entry_matches(entry_name: &str, segment: &str) -> bool {
    path_eq(
        &convert_and_collapse_slashes(entry_name),
        &convert_and_collapse_slashes(segment),
    )
}

/// Parent of a possibly compound path.
///
/// `a.zip!/b` has parent `a.zip`, `a.zip!/dir/b` has parent `a.zip!/dir`, and
/// a single component has parent `""`.
pub fn parent_path(path: &str) -> String {
    let collapsed = convert_and_collapse_slashes(path);
    let path = collapsed.strip_suffix('/').unwrap_or(&collapsed);
    let parent = path.rfind('/').map_or("", |idx| &path[..idx]);
    parent.strip_suffix('!').unwrap_or(parent).to_string()
}

/// Last `/`-separated component of an entry name.
pub fn file_name(name: &str) -> &str {
    let name = name.trim_end_matches(['/', '\\']);
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// `name` without its last extension: `report.txt.zst` becomes `report.txt`.
pub fn strip_extension(name: &str) -> &str {
    let base = file_name(name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &name[..name.len() - (base.len() - idx)],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn segs(path: &str, keep: bool) -> Vec<String> {
        CompoundPath::split(path, keep).into_segments()
    }

    #[test]
    fn split_nested() {
        assert_eq!(
            segs("outer.zip!/inner.tar.gz!/data/file.txt", false),
            ["outer.zip", "inner.tar.gz", "data/file.txt"]
        );
    }

    #[test]
    fn split_trailing_separator() {
        assert_eq!(segs("a.zip!/", false), ["a.zip"]);
        assert_eq!(segs("a.zip!/", true), ["a.zip", ""]);
        assert_eq!(segs("a.zip!/b.zip!/", true), ["a.zip", "b.zip", ""]);
    }

    #[test]
    fn split_keeps_inner_empty_segments() {
        assert_eq!(segs("!/a", false), ["", "a"]);
        assert_eq!(segs("a!/!/b", false), ["a", "", "b"]);
    }

    #[test]
    fn split_empty_and_bare_separator() {
        assert_eq!(segs("", false), [""]);
        assert!(segs("!/", false).is_empty());
        assert_eq!(segs("!/", true), [""]);
    }

    #[test]
    fn split_is_literal() {
        assert_eq!(segs("a.!/b", false), ["a.", "b"]);
        assert_eq!(segs("a!b/c", false), ["a!b/c"]);
    }

    #[test]
    fn display_rejoins() {
        let path = CompoundPath::split("a.zip!/b.tar!/c", false);
        assert_eq!(path.to_string(), "a.zip!/b.tar!/c");
        assert!(path.is_nested());
        assert_eq!(path.last(), Some("c"));
    }

    #[test]
    fn normalize_segment() {
        assert_eq!(normalize("/a//b\\c/"), "a/b/c");
        assert_eq!(normalize("\\\\x"), "x");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("/"), "");
    }

    #[test]
    fn path_eq_ignores_edge_slashes() {
        assert!(path_eq("/a/b/", "a/b"));
        assert!(path_eq("a", "a/"));
        assert!(!path_eq("a/b", "a/c"));
    }

    #[test]
    fn entry_matches_raw_names() {
        assert!(entry_matches("\\data\\file.txt", "data/file.txt"));
        assert!(entry_matches("dir/", "dir"));
        assert!(!entry_matches("data/file.txt", "file.txt"));
    }

    #[test]
    fn parent_of_compound_paths() {
        assert_eq!(parent_path("a.zip!/b"), "a.zip");
        assert_eq!(parent_path("a.zip!/dir/b"), "a.zip!/dir");
        assert_eq!(parent_path("a.zip!/dir/b/"), "a.zip!/dir");
        assert_eq!(parent_path("dir\\b"), "dir");
        assert_eq!(parent_path("b"), "");
    }

    #[test]
    fn strip_extension_of_last_component() {
        assert_eq!(strip_extension("report.txt.zst"), "report.txt");
        assert_eq!(strip_extension("dir.d/archive"), "dir.d/archive");
        assert_eq!(strip_extension(".hidden"), ".hidden");
        assert_eq!(strip_extension("a/b.zst"), "a/b");
    }

    #[test]
    fn file_name_of_entry() {
        assert_eq!(file_name("a/b/c.txt"), "c.txt");
        assert_eq!(file_name("a\\b"), "b");
        assert_eq!(file_name("dir/"), "dir");
    }

    proptest! {
        #[test]
        fn split_without_separator_is_identity(path in "[a-z0-9./_\\\\-]{0,40}") {
            prop_assume!(!path.contains(SEPARATOR));
            prop_assert_eq!(segs(&path, false), vec![path.clone()]);
            prop_assert_eq!(segs(&path, true), vec![path]);
        }

        #[test]
        fn trailing_separator_adds_one_empty_segment(
            parts in proptest::collection::vec("[a-z0-9._/]{1,12}", 1..4)
        ) {
            let parts: Vec<String> = parts
                .into_iter()
                .filter(|p| !p.ends_with('!'))
                .collect();
            prop_assume!(!parts.is_empty());
            let path = format!("{}{SEPARATOR}", parts.join(SEPARATOR));
            let without = segs(&path, false);
            let with = segs(&path, true);
            prop_assert_eq!(with.len(), without.len() + 1);
            prop_assert_eq!(with.last().map(String::as_str), Some(""));
            prop_assert_eq!(&with[..without.len()], &without[..]);
        }

        #[test]
        fn normalize_is_idempotent(path in "[a-z/\\\\]{0,30}") {
            let once = normalize(&path);
            prop_assert!(!once.contains("//"));
            prop_assert!(!once.contains('\\'));
            prop_assert_eq!(normalize(&once), once.clone());
        }
    }
}
