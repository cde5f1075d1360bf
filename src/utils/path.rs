//! Separator-agnostic path helpers.
//!
//! Both `/` and `\` count as separators, so paths coming from config files
//! or other platforms split the same way. Malformed input (empty strings,
//! trailing separators) degrades to empty results.

const SEPARATORS: [char; 2] = ['/', '\\'];

/// Final segment of `path`, or the whole string if there is no separator.
///
/// `"blog\\post/index.html"` → `"index.html"`
pub fn basename(path: &str) -> &str {
    path.rsplit(SEPARATORS).next().unwrap_or(path)
}

/// Text after the last `.` of the final segment, case preserved.
///
/// Returns `None` when the basename has no dot.
pub fn extension(path: &str) -> Option<&str> {
    let name = basename(path);
    name.rfind('.').map(|idx| &name[idx + 1..])
}

/// Directory names between the root and the basename, in order.
///
/// A leading root (`/`, or a drive prefix such as `C:`) is dropped, as are
/// empty segments produced by doubled or trailing separators.
///
/// `"/usr/share/doc/readme.txt"` → `["usr", "share", "doc"]`
pub fn segments(path: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = path.split(SEPARATORS).collect();
    // the last part is the basename (empty for a trailing separator)
    parts.pop();

    let skip_root = parts.first().is_some_and(|first| is_drive(first));
    parts
        .into_iter()
        .skip(usize::from(skip_root))
        .filter(|part| !part.is_empty())
        .collect()
}

/// `C:`-style drive prefix.
fn is_drive(part: &str) -> bool {
    part.len() >= 2 && part.ends_with(':')
}
