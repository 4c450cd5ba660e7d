//! Supported audio types and file identifier normalization.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

/// Suffixes the repository accepts, leading dot included.
pub const SUPPORTED_SUFFIXES: [&str; 4] = [".mp3", ".ogg", ".wav", ".flac"];

#[allow(clippy::expect_used)] // The pattern is a literal
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w.\-]").expect("valid identifier pattern"));

/// The default supported suffix set.
pub fn supported_suffixes() -> BTreeSet<String> {
    SUPPORTED_SUFFIXES.iter().map(|s| (*s).to_string()).collect()
}

/// Suffix of `name` with its leading dot, lowercased.
pub fn suffix_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

/// Turn a requested name into a safe repository identifier.
///
/// Characters outside word characters, `.` and `-` become `_`. When the
/// result lacks a supported suffix, the suffix of `source_name` is
/// appended if that one is supported.
pub fn to_file_id(
    requested: &str,
    source_name: &str,
    supported: &BTreeSet<String>,
) -> Result<String> {
    let mut file_id = DISALLOWED.replace_all(requested, "_").into_owned();

    if suffix_of(&file_id).is_some_and(|s| supported.contains(&s)) {
        return Ok(file_id);
    }

    match suffix_of(source_name) {
        Some(suffix) if supported.contains(&suffix) => {
            file_id.push_str(&suffix);
            Ok(file_id)
        }
        _ => Err(Error::UnsupportedMediaType(format!(
            "Only the following are supported: {}",
            supported.iter().cloned().collect::<Vec<_>>().join(", ")
        ))),
    }
}

/// Validate an audio URL scraped from a web page.
pub fn check_audio_url<'a>(url: Option<&'a str>, supported: &BTreeSet<String>) -> Result<&'a str> {
    let url = url
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::NotFound("No audio found".to_string()))?;

    if !url.starts_with("http") {
        return Err(Error::InvalidArgument(
            "Audio could not be extracted from the website".to_string(),
        ));
    }

    let path = url.split(['?', '#']).next().unwrap_or(url);
    if !supported.iter().any(|s| path.to_lowercase().ends_with(s)) {
        return Err(Error::UnsupportedMediaType(
            "Audio file type provided by the site is not supported".to_string(),
        ));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sanitizes_and_keeps_suffix() {
        let id = to_file_id("my horn!.mp3", "whatever.bin", &supported_suffixes()).unwrap();
        assert_eq!(id, "my_horn_.mp3");
    }

    #[test]
    fn test_infers_suffix_from_source() {
        let id = to_file_id("fanfare", "upload.FLAC", &supported_suffixes()).unwrap();
        assert_eq!(id, "fanfare.flac");
    }

    #[test]
    fn test_rejects_unknown_suffix() {
        let err = to_file_id("notes", "notes.txt", &supported_suffixes()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_path_separators_are_replaced() {
        let id = to_file_id("../../etc/passwd", "x.wav", &supported_suffixes()).unwrap();
        assert!(!id.contains('/'));
        assert!(id.ends_with(".wav"));
    }

    #[test]
    fn test_check_audio_url() {
        let supported = supported_suffixes();
        assert!(matches!(check_audio_url(None, &supported), Err(Error::NotFound(_))));
        assert!(matches!(
            check_audio_url(Some("ftp://x/a.mp3"), &supported),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            check_audio_url(Some("https://x/a.aac"), &supported),
            Err(Error::UnsupportedMediaType(_))
        ));
        assert_eq!(
            check_audio_url(Some("https://x/a.ogg?dl=1"), &supported).unwrap(),
            "https://x/a.ogg?dl=1"
        );
    }

    proptest! {
        #[test]
        fn prop_file_id_only_safe_chars(name in ".{0,40}") {
            if let Ok(id) = to_file_id(&name, "x.mp3", &supported_suffixes()) {
                prop_assert!(!id.contains('/') && !id.contains('\\'));
                prop_assert!(!id.chars().any(char::is_whitespace));
            }
        }
    }
}
