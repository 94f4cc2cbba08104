use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

/// Collapse every whitespace run to one space and trim the ends.
pub fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First number in the text, the way a lenient `parseFloat` reads a label like "4.5 (120+)".
pub fn leading_number(s: &str) -> Option<f64> {
    NUMBER_RE
        .find(s)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Resolve protocol-relative and relative URLs against `base` with standard
/// URL joining. Input that cannot be resolved comes back trimmed.
pub fn absolutize(url: &str, base: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    if let Some(rest) = url.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    match Url::parse(base).and_then(|b| b.join(url)) {
        Ok(joined) => joined.to_string(),
        Err(_) => url.to_string(),
    }
}

/// Split on any of the delimiter characters, dropping blank pieces.
pub fn split_any(s: &str, delimiters: &str) -> Vec<String> {
    s.split(|c: char| delimiters.contains(c))
        .map(normalize)
        .filter(|p| !p.is_empty())
        .collect()
}
