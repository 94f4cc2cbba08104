//! Extraction strategies as plain data.
//!
//! A strategy narrows the search to a [`Region`], reads raw strings out of it
//! with a [`Matcher`], then rewrites them with a chain of [`Transform`]s.
//! Nothing here touches the network; everything runs against a parsed
//! document or one of its elements.

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::text::{absolutize, normalize, split_any};
use crate::error::SchemaError;

pub fn css(selector: &str) -> Result<Selector, SchemaError> {
    Selector::parse(selector).map_err(|e| SchemaError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Where to look inside the current scope.
#[derive(Debug, Clone)]
pub enum Region {
    /// The scope itself.
    Whole,
    /// The scope itself, but only when it matches the selector.
    Own(Selector),
    /// Every element matching the selector.
    Select(Selector),
    /// Containers whose `marker` text contains one of `needles`
    /// (or equals one of them, when `exact`).
    Marked {
        container: Selector,
        marker: Selector,
        needles: Vec<String>,
        exact: bool,
    },
    /// Elements matching `anchor` whose text contains `needle`, lifted `up` parents.
    Anchored {
        anchor: Selector,
        needle: String,
        up: usize,
    },
}

impl Region {
    pub fn own(selector: &str) -> Result<Self, SchemaError> {
        Ok(Region::Own(css(selector)?))
    }

    pub fn select(selector: &str) -> Result<Self, SchemaError> {
        Ok(Region::Select(css(selector)?))
    }

    /// Box-style container identified by a heading that mentions one of `needles`.
    pub fn headed(container: &str, heading: &str, needles: &[&str]) -> Result<Self, SchemaError> {
        Ok(Region::Marked {
            container: css(container)?,
            marker: css(heading)?,
            needles: needles.iter().map(|n| n.to_string()).collect(),
            exact: false,
        })
    }

    /// Container whose label element reads exactly `label`.
    pub fn keyed(container: &str, label_selector: &str, label: &str) -> Result<Self, SchemaError> {
        Ok(Region::Marked {
            container: css(container)?,
            marker: css(label_selector)?,
            needles: vec![label.to_string()],
            exact: true,
        })
    }

    pub fn anchored(anchor: &str, needle: &str, up: usize) -> Result<Self, SchemaError> {
        Ok(Region::Anchored {
            anchor: css(anchor)?,
            needle: needle.to_string(),
            up,
        })
    }

    pub fn locate<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match self {
            Region::Whole => vec![scope],
            Region::Own(sel) => {
                if sel.matches(&scope) {
                    vec![scope]
                } else {
                    Vec::new()
                }
            }
            Region::Select(sel) => scope.select(sel).collect(),
            Region::Marked {
                container,
                marker,
                needles,
                exact,
            } => scope
                .select(container)
                .filter(|c| {
                    let label = joined_text(c.select(marker));
                    !label.is_empty()
                        && needles.iter().any(|n| {
                            if *exact {
                                label == *n
                            } else {
                                label.contains(n.as_str())
                            }
                        })
                })
                .collect(),
            Region::Anchored { anchor, needle, up } => {
                let mut found: Vec<ElementRef<'a>> = Vec::new();
                for el in scope.select(anchor) {
                    if !text_of(el).contains(needle.as_str()) {
                        continue;
                    }
                    if let Some(lifted) = lift(el, *up) {
                        if !found.iter().any(|f| f.id() == lifted.id()) {
                            found.push(lifted);
                        }
                    }
                }
                found
            }
        }
    }
}

/// How raw strings are read out of each region element.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Full text of the element.
    Text,
    /// Element text with the text of matching descendants cut out (drops a heading or label).
    TextWithout(Selector),
    /// Text of every matching descendant.
    Select(Selector),
    /// Attribute value of every matching descendant.
    Attr { selector: Selector, attr: String },
    /// Text of the element sibling `hops` steps ahead, if it matches the selector.
    Sibling { selector: Selector, hops: usize },
    /// Capture group 1 (or the whole match) of every pattern match in the element text.
    Pattern(Regex),
}

impl Matcher {
    pub fn text_without(selector: &str) -> Result<Self, SchemaError> {
        Ok(Matcher::TextWithout(css(selector)?))
    }

    pub fn select(selector: &str) -> Result<Self, SchemaError> {
        Ok(Matcher::Select(css(selector)?))
    }

    pub fn attr(selector: &str, attr: &str) -> Result<Self, SchemaError> {
        Ok(Matcher::Attr {
            selector: css(selector)?,
            attr: attr.to_string(),
        })
    }

    pub fn sibling(selector: &str, hops: usize) -> Result<Self, SchemaError> {
        Ok(Matcher::Sibling {
            selector: css(selector)?,
            hops,
        })
    }

    pub fn pattern(pattern: &str) -> Result<Self, SchemaError> {
        Ok(Matcher::Pattern(Regex::new(pattern)?))
    }

    pub fn read(&self, el: ElementRef<'_>) -> Vec<String> {
        match self {
            Matcher::Text => vec![text_of(el)],
            Matcher::TextWithout(sel) => {
                let mut text = text_of(el);
                for inner in el.select(sel) {
                    let cut = text_of(inner);
                    if !cut.is_empty() {
                        text = text.replacen(&cut, "", 1);
                    }
                }
                vec![text]
            }
            Matcher::Select(sel) => el.select(sel).map(text_of).collect(),
            Matcher::Attr { selector, attr } => el
                .select(selector)
                .filter_map(|e| e.value().attr(attr))
                .map(str::to_string)
                .collect(),
            Matcher::Sibling { selector, hops } => el
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .nth(hops.saturating_sub(1))
                .filter(|sib| *hops > 0 && selector.matches(sib))
                .map(text_of)
                .into_iter()
                .collect(),
            Matcher::Pattern(re) => {
                let text = text_of(el);
                re.captures_iter(&text)
                    .filter_map(|c| c.get(1).or_else(|| c.get(0)))
                    .map(|m| m.as_str().to_string())
                    .collect()
            }
        }
    }
}

/// Post-processing applied to the raw strings, in order.
#[derive(Debug, Clone)]
pub enum Transform {
    /// Collapse whitespace runs (useful before a pattern that expects single spaces).
    Collapse,
    /// Remove the first occurrence of a literal (e.g. a "Location:" label).
    Remove(String),
    Replace { pattern: Regex, with: String },
    /// Keep capture group 1; values that do not match are dropped.
    Capture(Regex),
    /// Split every value on any of the delimiter characters.
    Split(String),
    /// Split every value into its non-blank lines.
    Lines,
    Join(String),
    First,
    Nth(usize),
    Absolutize(String),
}

impl Transform {
    pub fn remove(literal: &str) -> Self {
        Transform::Remove(literal.to_string())
    }

    pub fn replace(pattern: &str, with: &str) -> Result<Self, SchemaError> {
        Ok(Transform::Replace {
            pattern: Regex::new(pattern)?,
            with: with.to_string(),
        })
    }

    pub fn capture(pattern: &str) -> Result<Self, SchemaError> {
        Ok(Transform::Capture(Regex::new(pattern)?))
    }

    pub fn split(delimiters: &str) -> Self {
        Transform::Split(delimiters.to_string())
    }

    pub fn apply(&self, values: Vec<String>) -> Vec<String> {
        match self {
            Transform::Collapse => values.iter().map(|v| normalize(v)).collect(),
            Transform::Remove(literal) => values
                .into_iter()
                .map(|v| v.replacen(literal.as_str(), "", 1))
                .collect(),
            Transform::Replace { pattern, with } => values
                .into_iter()
                .map(|v| pattern.replace_all(&v, with.as_str()).into_owned())
                .collect(),
            Transform::Capture(re) => values
                .iter()
                .filter_map(|v| re.captures(v))
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect(),
            Transform::Split(delims) => values.iter().flat_map(|v| split_any(v, delims)).collect(),
            Transform::Lines => values
                .iter()
                .flat_map(|v| v.lines().map(str::trim).filter(|l| !l.is_empty()).map(str::to_string).collect::<Vec<_>>())
                .collect(),
            Transform::Join(sep) => {
                if values.is_empty() {
                    values
                } else {
                    vec![values.join(sep)]
                }
            }
            Transform::First => values.into_iter().take(1).collect(),
            Transform::Nth(n) => values.into_iter().nth(*n).into_iter().collect(),
            Transform::Absolutize(base) => values.iter().map(|v| absolutize(v, base)).collect(),
        }
    }
}

/// One matcher + transform chain, tried as a unit in a cascade.
#[derive(Debug, Clone)]
pub struct Strategy {
    pub region: Region,
    pub matcher: Matcher,
    pub transforms: Vec<Transform>,
}

impl Strategy {
    pub fn new(region: Region, matcher: Matcher) -> Self {
        Strategy {
            region,
            matcher,
            transforms: Vec::new(),
        }
    }

    /// Text of every element matching `selector` anywhere in scope.
    pub fn select(selector: &str) -> Result<Self, SchemaError> {
        Ok(Strategy::new(Region::Whole, Matcher::select(selector)?))
    }

    /// Text of the parent of a label element, e.g. `<p><span>Location:</span> Delhi</p>`.
    pub fn labelled(anchor: &str, label: &str) -> Result<Self, SchemaError> {
        Ok(Strategy::new(Region::anchored(anchor, label, 1)?, Matcher::Text))
    }

    pub fn then(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Raw (un-normalized) values this strategy reads from `scope`.
    pub fn values(&self, scope: ElementRef<'_>) -> Vec<String> {
        let raw: Vec<String> = self
            .region
            .locate(scope)
            .into_iter()
            .flat_map(|el| self.matcher.read(el))
            .collect();
        self.transforms.iter().fold(raw, |acc, t| t.apply(acc))
    }

    /// Container nodes for nested records. Only `Text` (the region elements
    /// themselves) and `Select` (their matching descendants) locate nodes.
    pub fn containers<'a>(&self, scope: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        let regions = self.region.locate(scope);
        match &self.matcher {
            Matcher::Text => regions,
            Matcher::Select(sel) => {
                let mut out: Vec<ElementRef<'a>> = Vec::new();
                for region in regions {
                    for el in region.select(sel) {
                        if !out.iter().any(|o| o.id() == el.id()) {
                            out.push(el);
                        }
                    }
                }
                out
            }
            _ => Vec::new(),
        }
    }
}

fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

fn joined_text<'a>(els: impl Iterator<Item = ElementRef<'a>>) -> String {
    normalize(&els.map(text_of).collect::<Vec<_>>().join(" "))
}

fn lift(el: ElementRef<'_>, up: usize) -> Option<ElementRef<'_>> {
    let mut current = el;
    for _ in 0..up {
        current = current.parent().and_then(ElementRef::wrap)?;
    }
    Some(current)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const DOC: &str = r#"
        <html><body>
          <div class="box-card"><h3>About Me</h3><p>First para.</p><p>Second para.</p></div>
          <div class="box-card"><h3>Courts</h3><ul><li>High Court</li><li>District Court</li></ul></div>
          <p><span>Location:</span> New Delhi, India</p>
          <div class="mobile-info"><div class="label-detail">Practice Areas</div>Divorce, Family</div>
          <div class="label-detail">Specialization</div><div>Criminal Law</div>
          <img class="photo" src="//cdn.example.com/p.jpg">
        </body></html>
    "#;

    fn values(doc: &Html, strategy: &Strategy) -> Vec<String> {
        strategy
            .values(doc.root_element())
            .iter()
            .map(|v| normalize(v))
            .collect()
    }

    #[test]
    fn headed_region_reads_paragraphs() {
        let doc = Html::parse_document(DOC);
        let s = Strategy::new(
            Region::headed("div.box-card", "h3, h2", &["About"]).unwrap(),
            Matcher::select("p").unwrap(),
        );
        assert_eq!(values(&doc, &s), vec!["First para.", "Second para."]);
    }

    #[test]
    fn labelled_strategy_with_remove() {
        let doc = Html::parse_document(DOC);
        let s = Strategy::labelled("span", "Location")
            .unwrap()
            .then(Transform::remove("Location:"));
        assert_eq!(values(&doc, &s), vec!["New Delhi, India"]);
    }

    #[test]
    fn keyed_region_with_text_without_and_split() {
        let doc = Html::parse_document(DOC);
        let s = Strategy::new(
            Region::keyed("div.mobile-info", ".label-detail", "Practice Areas").unwrap(),
            Matcher::text_without(".label-detail").unwrap(),
        )
        .then(Transform::split(","));
        assert_eq!(values(&doc, &s), vec!["Divorce", "Family"]);
    }

    #[test]
    fn sibling_matcher() {
        let doc = Html::parse_document(DOC);
        let s = Strategy::new(
            Region::anchored("div.label-detail", "Specialization", 0).unwrap(),
            Matcher::sibling("div", 1).unwrap(),
        );
        assert_eq!(values(&doc, &s), vec!["Criminal Law"]);
    }

    #[test]
    fn attr_with_absolutize() {
        let doc = Html::parse_document(DOC);
        let s = Strategy::new(Region::Whole, Matcher::attr("img.photo", "src").unwrap())
            .then(Transform::Absolutize("https://lawrato.com".into()));
        assert_eq!(values(&doc, &s), vec!["https://cdn.example.com/p.jpg"]);
    }

    #[test]
    fn missing_region_yields_nothing() {
        let doc = Html::parse_document(DOC);
        let s = Strategy::new(
            Region::headed("div.box-card", "h3, h2", &["Reviews"]).unwrap(),
            Matcher::select("p").unwrap(),
        );
        assert!(s.values(doc.root_element()).is_empty());
    }

    #[test]
    fn capture_drops_non_matching() {
        let t = Transform::capture(r"(\d+)").unwrap();
        assert_eq!(t.apply(vec!["abc".into(), "x 42".into()]), vec!["42"]);
    }

    #[test]
    fn containers_from_select() {
        let doc = Html::parse_document(DOC);
        let s = Strategy::new(
            Region::headed("div.box-card", "h3", &["Courts"]).unwrap(),
            Matcher::select("li").unwrap(),
        );
        assert_eq!(s.containers(doc.root_element()).len(), 2);
    }

    #[test]
    fn pattern_matcher_reads_capture_group() {
        let doc = Html::parse_document(r#"<div class="card">Call 98****10 or 90****22</div>"#);
        let s = Strategy::new(
            Region::select("div.card").unwrap(),
            Matcher::pattern(r"\b([0-9]{2,}\*{2,}[0-9]{2,})\b").unwrap(),
        );
        assert_eq!(values(&doc, &s), vec!["98****10", "90****22"]);
        assert_eq!(values(&doc, &s.then(Transform::First)), vec!["98****10"]);
    }

    #[test]
    fn join_keeps_empty_input_empty() {
        let join = Transform::Join(", ".into());
        assert!(join.apply(Vec::new()).is_empty());
        assert_eq!(join.apply(vec!["A".into(), "B".into()]), vec!["A, B"]);
    }

    #[test]
    fn invalid_selector_is_schema_error() {
        assert!(matches!(css("div[["), Err(SchemaError::Selector { .. })));
    }
}
