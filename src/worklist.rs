use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::InputError;
use crate::record::WorkItem;

/// One entry of a work list file: a bare URL, or an object carrying `url`
/// (so a previous failed file can be fed straight back in).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Entry {
    Url(String),
    Record { url: String },
    Other(Value),
}

/// Load the ordered work list. Blank and repeated URLs are dropped.
pub fn load(path: &Path) -> Result<Vec<WorkItem>, InputError> {
    let raw = std::fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let items = parse(&raw).map_err(|source| InputError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loaded {} URLs from {}", items.len(), path.display());
    Ok(items)
}

/// Parse a JSON array of URLs. Hand-maintained lists often end in `];`,
/// so one trailing semicolon is accepted.
pub fn parse(raw: &str) -> Result<Vec<WorkItem>, serde_json::Error> {
    let trimmed = raw.trim_end();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    let entries: Vec<Entry> = serde_json::from_str(body)?;

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(entries.len());
    for (pos, entry) in entries.into_iter().enumerate() {
        let url = match entry {
            Entry::Url(url) | Entry::Record { url } => url.trim().to_string(),
            Entry::Other(v) => {
                warn!("Skipping entry {}: not a URL ({})", pos, v);
                continue;
            }
        };
        if url.is_empty() {
            warn!("Skipping entry {}: blank URL", pos);
            continue;
        }
        if !seen.insert(url.clone()) {
            warn!("Skipping entry {}: duplicate URL {}", pos, url);
            continue;
        }
        items.push(WorkItem {
            index: items.len(),
            url,
        });
    }
    Ok(items)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(items: &[WorkItem]) -> Vec<&str> {
        items.iter().map(|i| i.url.as_str()).collect()
    }

    #[test]
    fn plain_url_array() {
        let items = parse(r#"["https://x.test/a", "https://x.test/b"]"#).unwrap();
        assert_eq!(urls(&items), ["https://x.test/a", "https://x.test/b"]);
        assert_eq!(items[1].index, 1);
    }

    #[test]
    fn trailing_semicolon_is_tolerated() {
        let items = parse("[\"https://x.test/a\"];\n").unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn failed_file_is_a_work_list() {
        let raw = r#"[{"url": "https://x.test/c", "error": "timeout"}, {"url": "https://x.test/d", "error": "HTTP 503"}]"#;
        let items = parse(raw).unwrap();
        assert_eq!(urls(&items), ["https://x.test/c", "https://x.test/d"]);
    }

    #[test]
    fn blanks_and_duplicates_are_dropped_and_indices_stay_dense() {
        let raw = r#"["https://x.test/a", "  ", "https://x.test/a", 42, "https://x.test/b"]"#;
        let items = parse(raw).unwrap();
        assert_eq!(urls(&items), ["https://x.test/a", "https://x.test/b"]);
        assert_eq!(items[1].index, 1);
    }

    #[test]
    fn not_an_array_is_an_error() {
        assert!(parse(r#"{"url": "https://x.test/a"}"#).is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load(Path::new("does/not/exist.json")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.json"));
    }
}
