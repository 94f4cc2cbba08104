use scraper::{ElementRef, Html};

use super::strategy::Strategy;
use super::text::{leading_number, normalize};
use crate::record::{FieldMap, FieldValue};

#[derive(Debug, Clone)]
pub enum FieldKind {
    Text,
    Number,
    Flag,
    List,
    /// Nested entries; each located container is run through these sub-fields.
    Records(Vec<FieldSpec>),
}

impl FieldKind {
    /// What a field holds when every strategy came up empty.
    pub fn empty(&self) -> FieldValue {
        match self {
            FieldKind::Text => FieldValue::Text(String::new()),
            FieldKind::Number => FieldValue::Null,
            FieldKind::Flag => FieldValue::Flag(false),
            FieldKind::List => FieldValue::List(Vec::new()),
            FieldKind::Records(_) => FieldValue::Records(Vec::new()),
        }
    }
}

/// Declarative cascade for one output field: strategies are tried in order
/// and the first non-empty result wins.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub strategies: Vec<Strategy>,
    pub required: bool,
}

impl FieldSpec {
    pub fn new(name: &str, kind: FieldKind, strategies: Vec<Strategy>) -> Self {
        FieldSpec {
            name: name.to_string(),
            kind,
            strategies,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Run every field cascade against a parsed document.
pub fn extract(document: &Html, specs: &[FieldSpec]) -> FieldMap {
    extract_in(document.root_element(), specs)
}

/// Run every field cascade against one element (the document root, or a nested container).
pub fn extract_in(scope: ElementRef<'_>, specs: &[FieldSpec]) -> FieldMap {
    specs
        .iter()
        .map(|spec| (spec.name.clone(), resolve(scope, spec)))
        .collect()
}

pub fn resolve(scope: ElementRef<'_>, spec: &FieldSpec) -> FieldValue {
    spec.strategies
        .iter()
        .find_map(|strategy| attempt(scope, &spec.kind, strategy))
        .unwrap_or_else(|| spec.kind.empty())
}

fn attempt(scope: ElementRef<'_>, kind: &FieldKind, strategy: &Strategy) -> Option<FieldValue> {
    let value = match kind {
        FieldKind::Records(subs) => {
            let entries: Vec<FieldMap> = strategy
                .containers(scope)
                .into_iter()
                .map(|container| extract_in(container, subs))
                .filter(|entry| entry.values().any(|v| !v.is_empty()))
                .collect();
            FieldValue::Records(entries)
        }
        FieldKind::Flag => {
            // Presence is enough; flag markers are often empty icons.
            let hit = !strategy.values(scope).is_empty();
            FieldValue::Flag(hit)
        }
        FieldKind::Number => {
            let n = strategy
                .values(scope)
                .iter()
                .find_map(|v| leading_number(v))?;
            FieldValue::Number(n)
        }
        FieldKind::Text => {
            let text = strategy
                .values(scope)
                .iter()
                .map(|v| normalize(v))
                .find(|v| !v.is_empty())?;
            FieldValue::Text(text)
        }
        FieldKind::List => FieldValue::List(
            strategy
                .values(scope)
                .iter()
                .map(|v| normalize(v))
                .filter(|v| !v.is_empty())
                .collect(),
        ),
    };
    (!value.is_empty()).then_some(value)
}

// ── Tests ──
