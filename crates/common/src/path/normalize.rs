// Canonical spelling of workspace resource paths.

use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

/// Longest accepted canonical path, in characters, leading `/` included.
pub const MAX_PATH_CHARS: usize = 512;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("resource path names no resource")]
    Empty,

    #[error("resource path is {chars} characters long, the limit is {MAX_PATH_CHARS}")]
    TooLong { chars: usize },

    #[error("resource path may not step through `{0}`")]
    Traversal(String),

    #[error("resource path contains a NUL character")]
    NullByte,

    #[error("resource path has a blank segment")]
    BlankSegment,
}

/// Canonical full path of a workspace resource, e.g. `/project/src/Main.java`.
///
/// Two spellings of the same resource normalize to the same string, which is
/// what makes identities derived from it comparable. Input is NFKC-folded,
/// either slash separates segments, and empty segments vanish. `.`, `..` and
/// whitespace-only segments are errors rather than being resolved.
pub fn normalize_resource_path(input: &str) -> Result<String, PathError> {
    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let folded: String = input.nfkc().collect();
    let mut canonical = String::with_capacity(folded.len() + 1);
    for segment in folded.split(['/', '\\']).filter(|segment| !segment.is_empty()) {
        check_segment(segment)?;
        canonical.push('/');
        canonical.push_str(segment);
    }

    if canonical.is_empty() {
        return Err(PathError::Empty);
    }
    let chars = canonical.chars().count();
    if chars > MAX_PATH_CHARS {
        return Err(PathError::TooLong { chars });
    }
    Ok(canonical)
}

fn check_segment(segment: &str) -> Result<(), PathError> {
    match segment {
        "." | ".." => Err(PathError::Traversal(segment.to_string())),
        _ if segment.trim().is_empty() => Err(PathError::BlankSegment),
        _ => Ok(()),
    }
}

/// Segments of an already-canonical path.
pub fn components(canonical: &str) -> impl Iterator<Item = &str> {
    canonical.split('/').filter(|segment| !segment.is_empty())
}
