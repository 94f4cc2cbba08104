use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{InputError, RequiredFieldMissing};
use crate::parser::cascade::{FieldKind, FieldSpec};
use crate::parser::schema;
use crate::parser::text::{leading_number, normalize, split_any};
use crate::record::{FieldMap, FieldValue, Provenance};

/// When a reference record may fill gaps in an extracted profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// Single-record debugging: the operator picked the reference for this URL.
    Always,
    /// Batch runs: only the profile whose extracted name equals the reference name.
    MatchingName,
}

/// Trusted field values used only to fill extraction gaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceRecord {
    fields: FieldMap,
}

impl ReferenceRecord {
    /// Load from a JSON object keyed by schema field names. A missing file is
    /// not an error: the run simply has no reference.
    pub fn load(path: &Path, specs: &[FieldSpec]) -> Result<Option<Self>, InputError> {
        if !path.exists() {
            debug!("No reference file at {}", path.display());
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path).map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| InputError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let reference = Self::from_json(&value, specs).ok_or_else(|| InputError::Shape {
            path: path.to_path_buf(),
            reason: "reference must be a JSON object".to_string(),
        })?;
        info!(
            "Loaded reference record from {} ({} fields)",
            path.display(),
            reference.fields.len()
        );
        Ok(Some(reference))
    }

    /// Convert a JSON object into schema-shaped values. Keys outside the
    /// schema and values that cannot take the field's shape are ignored.
    pub fn from_json(value: &Value, specs: &[FieldSpec]) -> Option<Self> {
        let object = value.as_object()?;
        let fields = specs
            .iter()
            .filter_map(|spec| {
                let raw = object.get(&spec.name)?;
                let converted = coerce(raw, &spec.kind)?;
                Some((spec.name.clone(), converted))
            })
            .collect();
        Some(ReferenceRecord { fields })
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name).filter(|v| !v.is_empty())
    }

    pub fn applies_to(&self, extracted: &FieldMap, policy: Applicability) -> bool {
        match policy {
            Applicability::Always => true,
            Applicability::MatchingName => {
                let ours = extracted.get(schema::NAME).and_then(FieldValue::as_text).map(normalize);
                let theirs = self.get(schema::NAME).and_then(FieldValue::as_text).map(normalize);
                matches!((ours, theirs), (Some(a), Some(b)) if !a.is_empty() && a == b)
            }
        }
    }
}

/// Final field map of one profile plus per-field provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Assembly {
    pub fields: FieldMap,
    pub provenance: BTreeMap<String, Provenance>,
    pub missing: Vec<RequiredFieldMissing>,
}

/// Fill every empty field from the reference. Extracted values always win,
/// and partially filled lists are never merged with the reference.
pub fn merge(mut extracted: FieldMap, reference: Option<&ReferenceRecord>, specs: &[FieldSpec]) -> Assembly {
    let mut provenance = BTreeMap::new();
    let mut missing = Vec::new();

    for spec in specs {
        let current = extracted
            .entry(spec.name.clone())
            .or_insert_with(|| spec.kind.empty());

        if !current.is_empty() {
            provenance.insert(spec.name.clone(), Provenance::Extracted);
        } else if let Some(value) = reference.and_then(|r| r.get(&spec.name)) {
            *current = value.clone();
            provenance.insert(spec.name.clone(), Provenance::Backfilled);
        }

        if spec.required && current.is_empty() {
            missing.push(RequiredFieldMissing(spec.name.clone()));
        }
    }

    Assembly {
        fields: extracted,
        provenance,
        missing,
    }
}

fn coerce(raw: &Value, kind: &FieldKind) -> Option<FieldValue> {
    let value = match (kind, raw) {
        (_, Value::Null) => return None,
        (FieldKind::Text, Value::String(s)) => FieldValue::Text(s.clone()),
        (FieldKind::Text, Value::Number(n)) => FieldValue::Text(n.to_string()),
        (FieldKind::Text, Value::Array(items)) => FieldValue::Text(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        (FieldKind::Number, Value::Number(n)) => FieldValue::Number(n.as_f64()?),
        (FieldKind::Number, Value::String(s)) => FieldValue::Number(leading_number(s)?),
        (FieldKind::Flag, Value::Bool(b)) => FieldValue::Flag(*b),
        (FieldKind::List, Value::Array(items)) => FieldValue::List(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
        ),
        (FieldKind::List, Value::String(s)) => FieldValue::List(split_any(s, ",")),
        (FieldKind::Records(subs), Value::Array(items)) => {
            FieldValue::Records(items.iter().filter_map(|item| coerce_entry(item, subs)).collect())
        }
        _ => return None,
    };
    Some(value)
}

/// Nested entries come either as objects or positionally, e.g. `[question, details, answer]`.
fn coerce_entry(item: &Value, subs: &[FieldSpec]) -> Option<FieldMap> {
    match item {
        Value::Object(map) => Some(
            subs.iter()
                .map(|sub| {
                    let v = map
                        .get(&sub.name)
                        .and_then(|raw| coerce(raw, &sub.kind))
                        .unwrap_or_else(|| sub.kind.empty());
                    (sub.name.clone(), v)
                })
                .collect(),
        ),
        Value::Array(positional) => Some(
            subs.iter()
                .enumerate()
                .map(|(i, sub)| {
                    let v = positional
                        .get(i)
                        .and_then(|raw| coerce(raw, &sub.kind))
                        .unwrap_or_else(|| sub.kind.empty());
                    (sub.name.clone(), v)
                })
                .collect(),
        ),
        _ => None,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specs() -> Vec<FieldSpec> {
        schema::profile("https://lawrato.com").unwrap()
    }

    fn extracted(pairs: &[(&str, FieldValue)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn gap_is_backfilled() {
        let specs = specs();
        let reference = ReferenceRecord::from_json(&json!({ "rating": 4.7 }), &specs).unwrap();
        let fields = extracted(&[
            ("name", FieldValue::Text("Advocate Priya Sharma".into())),
            ("rating", FieldValue::Null),
        ]);

        let out = merge(fields, Some(&reference), &specs);
        assert_eq!(out.fields["rating"], FieldValue::Number(4.7));
        assert_eq!(out.provenance["rating"], Provenance::Backfilled);
        assert_eq!(out.provenance["name"], Provenance::Extracted);
    }

    #[test]
    fn extracted_value_is_never_overwritten() {
        let specs = specs();
        let reference = ReferenceRecord::from_json(
            &json!({ "rating": 1.0, "location": "Elsewhere" }),
            &specs,
        )
        .unwrap();
        let fields = extracted(&[
            ("rating", FieldValue::Number(4.5)),
            ("location", FieldValue::Text("Bangalore".into())),
        ]);

        let out = merge(fields, Some(&reference), &specs);
        assert_eq!(out.fields["rating"], FieldValue::Number(4.5));
        assert_eq!(out.fields["location"], FieldValue::Text("Bangalore".into()));
    }

    #[test]
    fn partial_list_is_not_merged() {
        let specs = specs();
        let reference =
            ReferenceRecord::from_json(&json!({ "courts": ["A", "B", "C"] }), &specs).unwrap();
        let fields = extracted(&[("courts", FieldValue::List(vec!["A".into()]))]);

        let out = merge(fields, Some(&reference), &specs);
        assert_eq!(out.fields["courts"], FieldValue::List(vec!["A".into()]));
    }

    #[test]
    fn empty_list_is_backfilled() {
        let specs = specs();
        let reference =
            ReferenceRecord::from_json(&json!({ "courts": ["High Court"] }), &specs).unwrap();
        let out = merge(extracted(&[("courts", FieldValue::List(vec![]))]), Some(&reference), &specs);
        assert_eq!(out.fields["courts"], FieldValue::List(vec!["High Court".into()]));
        assert_eq!(out.provenance["courts"], Provenance::Backfilled);
    }

    #[test]
    fn missing_name_is_flagged_not_dropped() {
        let specs = specs();
        let out = merge(FieldMap::new(), None, &specs);
        assert_eq!(out.missing, vec![RequiredFieldMissing("name".into())]);
        // every schema field is present, as its empty value
        assert_eq!(out.fields.len(), specs.len());
        assert!(out.provenance.is_empty());
    }

    #[test]
    fn positional_entries_are_converted() {
        let specs = specs();
        let reference = ReferenceRecord::from_json(
            &json!({
                "questions_answered": [["Q1?", "some detail", "A1."]],
                "faq": [["What?", "That."]]
            }),
            &specs,
        )
        .unwrap();

        let Some(FieldValue::Records(qa)) = reference.get("questions_answered") else {
            panic!("expected records");
        };
        assert_eq!(qa[0]["question"], FieldValue::Text("Q1?".into()));
        assert_eq!(qa[0]["details"], FieldValue::Text("some detail".into()));
        assert_eq!(qa[0]["answer"], FieldValue::Text("A1.".into()));

        let Some(FieldValue::Records(faq)) = reference.get("faq") else {
            panic!("expected records");
        };
        assert_eq!(faq[0]["answer"], FieldValue::Text("That.".into()));
    }

    #[test]
    fn matching_name_policy() {
        let specs = specs();
        let reference =
            ReferenceRecord::from_json(&json!({ "name": "Advocate Rajesh K S" }), &specs).unwrap();
        let same = extracted(&[("name", FieldValue::Text(" Advocate  Rajesh K S ".into()))]);
        let other = extracted(&[("name", FieldValue::Text("Someone Else".into()))]);
        let nameless = extracted(&[("name", FieldValue::Text(String::new()))]);

        assert!(reference.applies_to(&same, Applicability::MatchingName));
        assert!(!reference.applies_to(&other, Applicability::MatchingName));
        assert!(!reference.applies_to(&nameless, Applicability::MatchingName));
        assert!(reference.applies_to(&other, Applicability::Always));
    }

    #[test]
    fn missing_reference_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ReferenceRecord::load(&dir.path().join("sample.json"), &specs()).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn reference_must_be_an_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(matches!(
            ReferenceRecord::load(&path, &specs()),
            Err(InputError::Shape { .. })
        ));
    }
}
