use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parser::text::normalize;

/// Field name → value, used both for a whole profile and for one nested entry.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// One unit of crawl work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub url: String,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
    Records(Vec<FieldMap>),
}

impl FieldValue {
    /// Blank scalars, `false`, zero/non-finite numbers and collections without
    /// a single non-blank member are all empty.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Flag(b) => !b,
            FieldValue::Number(n) => *n == 0.0 || !n.is_finite(),
            FieldValue::Text(t) => normalize(t).is_empty(),
            FieldValue::List(items) => items.iter().all(|i| normalize(i).is_empty()),
            FieldValue::Records(entries) => entries
                .iter()
                .all(|entry| entry.values().all(FieldValue::is_empty)),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Extracted,
    Backfilled,
}

/// Lifecycle of one work item. Each stage is visited at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Fetching,
    FetchFailed,
    Fetched,
    Extracting,
    Backfilling,
    Recorded,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::FetchFailed | Stage::Recorded)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Pending => "pending",
            Stage::Fetching => "fetching",
            Stage::FetchFailed => "fetch-failed",
            Stage::Fetched => "fetched",
            Stage::Extracting => "extracting",
            Stage::Backfilling => "backfilling",
            Stage::Recorded => "recorded",
        };
        f.write_str(s)
    }
}

/// Result for one work item: either a field map or an error, never both.
///
/// Serialized flat, the way downstream consumers expect a profile:
/// `{"url": .., "name": .., "rating": .., ...}` or `{"url": .., "error": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireRecord")]
pub struct ScrapeRecord {
    url: String,
    #[serde(flatten)]
    fields: FieldMap,
    #[serde(skip)]
    provenance: BTreeMap<String, Provenance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ScrapeRecord {
    pub fn extracted(
        url: impl Into<String>,
        fields: FieldMap,
        provenance: BTreeMap<String, Provenance>,
    ) -> Self {
        ScrapeRecord {
            url: url.into(),
            fields,
            provenance,
            error: None,
        }
    }

    pub fn failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        ScrapeRecord {
            url: url.into(),
            fields: FieldMap::new(),
            provenance: BTreeMap::new(),
            error: Some(reason.into()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn provenance(&self, name: &str) -> Option<Provenance> {
        self.provenance.get(name).copied()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_failure(&self) -> bool {
        self.error.is_some()
    }

    /// True when `name` holds a non-empty value.
    pub fn has(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|v| !v.is_empty())
    }
}

#[derive(Deserialize)]
struct WireRecord {
    url: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    fields: FieldMap,
}

impl From<WireRecord> for ScrapeRecord {
    fn from(wire: WireRecord) -> Self {
        match wire.error {
            Some(reason) => ScrapeRecord::failed(wire.url, reason),
            None => {
                let provenance = wire
                    .fields
                    .keys()
                    .map(|k| (k.clone(), Provenance::Extracted))
                    .collect();
                ScrapeRecord::extracted(wire.url, wire.fields, provenance)
            }
        }
    }
}

// ── Tests ──
