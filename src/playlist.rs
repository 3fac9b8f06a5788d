//! Resolution and validation of the declarative file specification.

use std::ffi::OsStr;
use std::path::Path;

use crate::config::SlideProperties;

/// Extensions the paint primitive can display.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "svg", "gif", "webp"];

/// Resolve the declarative inputs into an ordered candidate list. A resolved
/// logo path wins over the metadata list, which wins over the files string.
/// Pure function of its inputs.
pub fn resolve_candidates(props: &SlideProperties, logo_file: Option<&str>) -> Vec<String> {
    if let Some(logo) = logo_file
        && !logo.is_empty()
    {
        return vec![logo.to_owned()];
    }
    if !props.metadata.is_empty() {
        return props.metadata.iter().map(|m| m.file.clone()).collect();
    }
    parse_file_list(&props.files)
}

/// Split a pipe-delimited file list. Any empty segment means a stray
/// delimiter; the whole string is ambiguous and resolves to no files rather
/// than a partial parse.
fn parse_file_list(list: &str) -> Vec<String> {
    if list.trim().is_empty() {
        return Vec::new();
    }
    let segments: Vec<&str> = list.split('|').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Vec::new();
    }
    segments.into_iter().map(str::to_owned).collect()
}

/// Keep the candidates whose extension is whitelisted, preserving order and
/// duplicates.
pub fn validate_files(candidates: &[String], whitelist: &[&str]) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| has_valid_extension(c, whitelist))
        .cloned()
        .collect()
}

/// Lowercased extension of a cache path, if it has one.
#[must_use]
pub fn file_extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

fn has_valid_extension(path: &str, whitelist: &[&str]) -> bool {
    file_extension(path).is_some_and(|ext| whitelist.iter().any(|w| *w == ext))
}
