//! Assembly of the URL list from arguments, an input file and/or stdin.

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

use anyhow::{Context, Result};
use url::Url;

/// URLs accepted for fetching plus the lines that were rejected.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct UrlList {
    pub(crate) urls: Vec<String>,
    pub(crate) rejected: Vec<String>,
}

/// Collects input text from positional URLs, `input_file` and piped stdin.
///
/// Stdin is read only when it is not a terminal and no other source was
/// given. Returns `None` when there is no input at all.
pub(crate) fn read_input_text(urls: &[String], input_file: Option<&Path>) -> Result<Option<String>> {
    let mut segments = Vec::new();
    if !urls.is_empty() {
        segments.push(urls.join("\n"));
    }
    if let Some(path) = input_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file '{}'", path.display()))?;
        segments.push(text);
    }

    if segments.is_empty() && !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        if !buffer.trim().is_empty() {
            segments.push(buffer);
        }
    }

    Ok(if segments.is_empty() {
        None
    } else {
        Some(segments.join("\n"))
    })
}

/// Splits input text into http(s) URLs, one per line.
///
/// Blank lines and `#` comments are dropped silently; anything else that is
/// not an absolute http(s) URL lands in `rejected`.
pub(crate) fn parse_url_lines(text: &str) -> UrlList {
    let mut list = UrlList::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let accepted = Url::parse(line).is_ok_and(|url| matches!(url.scheme(), "http" | "https"));
        if accepted {
            list.urls.push(line.to_string());
        } else {
            list.rejected.push(line.to_string());
        }
    }
    list
}
