//! Target naming for download tasks.
//!
//! A task's final file is `<stem><ext>` in the target directory, derived
//! from the last path segment of its URL. Naming is a pure function of the
//! URL list so a re-run maps every URL to the same target and the
//! "already exists" skip stays reliable.

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use url::Url;

use super::constants::PART_SUFFIX;

/// File name used when the URL has no usable last segment.
pub const FALLBACK_FILE_NAME: &str = "download.bin";

/// Extension assumed when the URL carries none.
pub const FALLBACK_EXTENSION: &str = ".bin";

/// Splits the URL's last path segment into `(stem, ext)`.
///
/// The segment is percent-decoded and sanitized. `ext` keeps its leading dot
/// and falls back to `.bin`; `stem` falls back to `download`.
#[must_use]
pub fn stem_and_extension_from_url(url: &str) -> (String, String) {
    let name = file_name_from_url(url);
    split_extension(&name)
}

/// Decoded, sanitized last path segment of `url`, or [`FALLBACK_FILE_NAME`].
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return FALLBACK_FILE_NAME.to_string();
    };
    let Some(last) = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
    else {
        return FALLBACK_FILE_NAME.to_string();
    };
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let sanitized = sanitize_filename(&decoded);
    if sanitized.trim_matches(|c| c == '_' || c == '.').is_empty() {
        FALLBACK_FILE_NAME.to_string()
    } else {
        sanitized
    }
}

fn split_extension(name: &str) -> (String, String) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => {
            (name[..pos].to_string(), name[pos..].to_string())
        }
        _ => {
            let stem = name.trim_end_matches('.');
            let stem = if stem.is_empty() { "download" } else { stem };
            (stem.to_string(), FALLBACK_EXTENSION.to_string())
        }
    }
}

/// Makes `(stem, ext)` pairs unique within one batch.
///
/// The first occurrence keeps its name; later ones become `stem_2`,
/// `stem_3`, ... Comparison is case-insensitive so targets stay distinct on
/// case-insensitive filesystems.
pub(crate) fn disambiguate_stems(names: &mut [(String, String)]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut taken: HashSet<String> = names
        .iter()
        .map(|(stem, ext)| format!("{stem}{ext}").to_lowercase())
        .collect();
    let mut first_seen: HashSet<String> = HashSet::new();

    for (stem, ext) in names.iter_mut() {
        let key = format!("{stem}{ext}").to_lowercase();
        if first_seen.insert(key.clone()) {
            continue;
        }
        let counter = seen.entry(key).or_insert(1);
        loop {
            *counter += 1;
            let candidate = format!("{stem}_{counter}");
            let candidate_key = format!("{candidate}{ext}").to_lowercase();
            if taken.insert(candidate_key) {
                *stem = candidate;
                break;
            }
        }
    }
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces `/ \ : * ? " < > |` and control characters with `_`, strips
/// surrounding whitespace and trailing dots, and rewrites dot-only segments.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = sanitized.trim_end_matches('.').to_string();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Sibling path holding bytes while a transfer is in flight.
#[must_use]
pub fn part_path(final_path: &Path) -> PathBuf {
    let mut os = final_path.as_os_str().to_os_string();
    os.push(PART_SUFFIX);
    PathBuf::from(os)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename_removes_invalid_chars() {
        assert_eq!(sanitize_filename("file:name.zip"), "file_name.zip");
        assert_eq!(sanitize_filename("file*name.zip"), "file_name.zip");
        assert_eq!(sanitize_filename("file<name>.zip"), "file_name_.zip");
        assert_eq!(sanitize_filename("file|name.zip"), "file_name.zip");
    }

    #[test]
    fn test_sanitize_filename_strips_trailing_dots_and_space() {
        assert_eq!(sanitize_filename("  report.  "), "report");
    }

    #[test]
    fn test_sanitize_filename_preserves_valid_chars() {
        assert_eq!(sanitize_filename("R2-1903010.zip"), "R2-1903010.zip");
        assert_eq!(sanitize_filename("日本語.docx"), "日本語.docx");
    }

    #[test]
    fn test_stem_and_extension_from_url() {
        let (stem, ext) = stem_and_extension_from_url(
            "https://www.3gpp.org/ftp/tsg_ran/WG2_RL2/TSGR2_105bis/Docs/R2-1903010.zip",
        );
        assert_eq!(stem, "R2-1903010");
        assert_eq!(ext, ".zip");
    }

    #[test]
    fn test_stem_and_extension_percent_decoded() {
        let (stem, ext) = stem_and_extension_from_url("https://example.com/a/my%20doc.pptx");
        assert_eq!(stem, "my doc");
        assert_eq!(ext, ".pptx");
    }

    #[test]
    fn test_stem_and_extension_without_extension_defaults_to_bin() {
        let (stem, ext) = stem_and_extension_from_url("https://example.com/files/README");
        assert_eq!(stem, "README");
        assert_eq!(ext, ".bin");
    }

    #[test]
    fn test_stem_and_extension_empty_path_fallback() {
        let (stem, ext) = stem_and_extension_from_url("https://example.com/");
        assert_eq!((stem.as_str(), ext.as_str()), ("download", ".bin"));
        let (stem, ext) = stem_and_extension_from_url("not a url");
        assert_eq!((stem.as_str(), ext.as_str()), ("download", ".bin"));
    }

    #[test]
    fn test_stem_and_extension_dotfile_keeps_name() {
        let (stem, ext) = stem_and_extension_from_url("https://example.com/.hidden");
        assert_eq!(stem, ".hidden");
        assert_eq!(ext, ".bin");
    }

    #[test]
    fn test_encoded_traversal_stays_single_segment() {
        let name = file_name_from_url("https://example.com/x/..%2F..%2Fetc%2Fpasswd");
        assert!(!name.contains('/'), "got: {name}");
        assert!(is_safe_filename_segment(&name));
    }

    #[test]
    fn test_disambiguate_stems_suffixes_repeats() {
        let mut names = vec![
            ("doc".to_string(), ".zip".to_string()),
            ("other".to_string(), ".zip".to_string()),
            ("DOC".to_string(), ".zip".to_string()),
            ("doc".to_string(), ".zip".to_string()),
        ];
        disambiguate_stems(&mut names);
        let stems: Vec<&str> = names.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(stems, ["doc", "other", "DOC_2", "doc_3"]);
    }

    #[test]
    fn test_disambiguate_stems_avoids_existing_suffix_names() {
        let mut names = vec![
            ("doc".to_string(), ".zip".to_string()),
            ("doc_2".to_string(), ".zip".to_string()),
            ("doc".to_string(), ".zip".to_string()),
        ];
        disambiguate_stems(&mut names);
        let stems: Vec<&str> = names.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(stems, ["doc", "doc_2", "doc_3"]);
    }

    #[test]
    fn test_part_path_appends_suffix() {
        let path = part_path(Path::new("/tmp/DOCS/R2-1.zip"));
        assert_eq!(path, PathBuf::from("/tmp/DOCS/R2-1.zip.part"));
    }
}
