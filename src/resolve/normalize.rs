//! Lexical path handling
//!
//! Nothing here touches the filesystem. Traversal is decided on the string and
//! component level, before any stat or open happens.

use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};

/// Percent-decode a raw request path.
///
/// Returns `None` when the decoded bytes are not UTF-8 or contain a NUL byte.
/// Malformed escapes such as `%zz` are kept verbatim.
pub fn decode_request_path(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if decoded.contains('\0') {
        return None;
    }
    Some(decoded.into_owned())
}

/// Split a decoded request path into normalized relative segments.
///
/// Both `/` and `\` separate segments. Empty and `.` segments are dropped,
/// `..` removes the previous segment. A `..` with nothing left to remove is
/// kept so the containment check after joining can reject it.
pub fn normalize_relative(path: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    segments
}

/// Collapse `.` and `..` components of a path without resolving symlinks.
///
/// `..` directly under the root is dropped, the way the OS treats `/..`.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    out.iter().collect()
}

/// Extension of the last segment: the text after its last `.`, or `""`.
pub fn extension_of(segments: &[&str]) -> String {
    segments
        .last()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

/// True when `candidate` equals `root` or lies beneath it.
///
/// `Path::starts_with` compares whole components, so `/srv/public-old` is not
/// inside `/srv/public`.
pub fn is_within(candidate: &Path, root: &Path) -> bool {
    candidate.starts_with(root)
}
