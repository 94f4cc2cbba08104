use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::Local;
use serde_json::{Map, Value};
use tracing::info;

use crate::checkpoint::write_json;
use crate::error::PersistenceError;
use crate::parser::cascade::FieldSpec;
use crate::parser::schema;
use crate::parser::text::{normalize, split_any};
use crate::record::{FieldValue, ScrapeRecord};

const FAILURES_SHOWN: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Completeness {
    pub field: String,
    pub count: usize,
    pub percent: f64,
}

/// Post-run statistics over one results file.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Sorted by percentage, highest first; ties keep schema order.
    pub completeness: Vec<Completeness>,
    pub top_locations: Vec<(String, usize)>,
    pub top_specializations: Vec<(String, usize)>,
    pub top_practice_areas: Vec<(String, usize)>,
    pub image_domains: Vec<(String, usize)>,
    pub average_rating: Option<f64>,
    pub rated: usize,
    pub required_missing: usize,
    pub first_failures: Vec<(String, String)>,
}

/// Where the analyzer writes its artifacts.
pub struct Artifacts<'a> {
    pub failed: &'a Path,
    pub clean: &'a Path,
    pub summary: &'a Path,
}

pub fn partition(records: &[ScrapeRecord]) -> (Vec<&ScrapeRecord>, Vec<&ScrapeRecord>) {
    records.iter().partition(|r| !r.is_failure())
}

pub fn analyze(records: &[ScrapeRecord], specs: &[FieldSpec], top_n: usize) -> Analysis {
    let (ok, failed) = partition(records);
    let successful = ok.len();

    let mut completeness: Vec<Completeness> = specs
        .iter()
        .map(|spec| {
            let count = ok.iter().filter(|r| r.has(&spec.name)).count();
            Completeness {
                field: spec.name.clone(),
                count,
                percent: percent(count, successful),
            }
        })
        .collect();
    completeness.sort_by(|a, b| b.percent.total_cmp(&a.percent));

    let mut locations = HashMap::new();
    let mut specializations = HashMap::new();
    let mut practice_areas = HashMap::new();
    let mut domains = HashMap::new();
    let mut rating_sum = 0.0;
    let mut rated = 0;

    for record in &ok {
        if let Some(primary) = record
            .field(schema::LOCATION)
            .and_then(FieldValue::as_text)
            .and_then(primary_location)
        {
            *locations.entry(primary).or_insert(0) += 1;
        }
        for token in tokens(record.field(schema::SPECIALIZATION)) {
            *specializations.entry(token).or_insert(0) += 1;
        }
        for token in tokens(record.field(schema::PRACTICE_AREAS)) {
            *practice_areas.entry(token).or_insert(0) += 1;
        }
        if let Some(host) = record
            .field(schema::IMG_URL)
            .and_then(FieldValue::as_text)
            .and_then(image_host)
        {
            *domains.entry(host).or_insert(0) += 1;
        }
        if let Some(rating) = record.field(schema::RATING).and_then(FieldValue::as_number) {
            if rating > 0.0 {
                rating_sum += rating;
                rated += 1;
            }
        }
    }

    let required: Vec<&str> = specs
        .iter()
        .filter(|s| s.required)
        .map(|s| s.name.as_str())
        .collect();
    let required_missing = ok
        .iter()
        .filter(|r| required.iter().any(|name| !r.has(name)))
        .count();

    Analysis {
        total: records.len(),
        successful,
        failed: failed.len(),
        completeness,
        top_locations: top(locations, top_n),
        top_specializations: top(specializations, top_n),
        top_practice_areas: top(practice_areas, top_n),
        image_domains: top(domains, usize::MAX),
        average_rating: (rated > 0).then(|| rating_sum / rated as f64),
        rated,
        required_missing,
        first_failures: failed
            .iter()
            .take(FAILURES_SHOWN)
            .map(|r| (r.url().to_string(), r.error().unwrap_or_default().to_string()))
            .collect(),
    }
}

/// Sparse copy of a successful record: empty strings, nulls and empty
/// collections are removed at every depth.
pub fn clean_export(record: &ScrapeRecord) -> Value {
    let full = serde_json::to_value(record).unwrap_or(Value::Null);
    prune(full).unwrap_or_else(|| Value::Object(Map::new()))
}

fn prune(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if normalize(&s).is_empty() => None,
        Value::Array(items) => {
            let kept: Vec<Value> = items.into_iter().filter_map(prune).collect();
            (!kept.is_empty()).then_some(Value::Array(kept))
        }
        Value::Object(map) => {
            let kept: Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| prune(v).map(|v| (k, v)))
                .collect();
            (!kept.is_empty()).then_some(Value::Object(kept))
        }
        other => Some(other),
    }
}

/// Write the failed subset, the clean export, and the text summary.
pub fn write_artifacts(
    records: &[ScrapeRecord],
    analysis: &Analysis,
    out: &Artifacts<'_>,
) -> Result<(), PersistenceError> {
    let (ok, failed) = partition(records);

    write_json(out.failed, &failed)?;
    info!("Saved {} failed URLs to {}", failed.len(), out.failed.display());

    let clean: Vec<Value> = ok.iter().map(|r| clean_export(r)).collect();
    write_json(out.clean, &clean)?;
    info!("Saved {} clean profiles to {}", clean.len(), out.clean.display());

    let summary = render(analysis);
    std::fs::write(out.summary, &summary).map_err(|source| PersistenceError::Io {
        path: out.summary.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn render(a: &Analysis) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "Scrape summary ({})", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(s, "==============================");
    let _ = writeln!(s, "Total:      {}", a.total);
    let _ = writeln!(
        s,
        "Successful: {} ({:.2}%)",
        a.successful,
        percent(a.successful, a.total)
    );
    let _ = writeln!(s, "Failed:     {} ({:.2}%)", a.failed, percent(a.failed, a.total));
    if a.required_missing > 0 {
        let _ = writeln!(s, "Missing a required field: {}", a.required_missing);
    }

    let _ = writeln!(s, "\nField completion:");
    let _ = writeln!(s, "{}", "-".repeat(44));
    for c in &a.completeness {
        let _ = writeln!(
            s,
            "{:<20} {:>5} / {} ({:.2}%)",
            c.field, c.count, a.successful, c.percent
        );
    }

    table(&mut s, "Top locations", &a.top_locations);
    table(&mut s, "Top specializations", &a.top_specializations);
    table(&mut s, "Top practice areas", &a.top_practice_areas);
    table(&mut s, "Image domains", &a.image_domains);

    let _ = writeln!(s, "\nAverage rating:");
    match a.average_rating {
        Some(avg) => {
            let _ = writeln!(s, "{:.2} (from {} profiles with ratings)", avg, a.rated);
        }
        None => {
            let _ = writeln!(s, "no ratings");
        }
    }

    let _ = writeln!(s, "\nFailed URLs:");
    if a.failed == 0 {
        let _ = writeln!(s, "none");
    } else {
        let _ = writeln!(
            s,
            "{} URLs failed. First {}:",
            a.failed,
            a.first_failures.len()
        );
        for (url, reason) in &a.first_failures {
            let _ = writeln!(s, "- {}: {}", url, reason);
        }
    }
    s
}

fn table(s: &mut String, title: &str, rows: &[(String, usize)]) {
    if rows.is_empty() {
        return;
    }
    let _ = writeln!(s, "\n{}:", title);
    let _ = writeln!(s, "{}", "-".repeat(44));
    for (name, count) in rows {
        let _ = writeln!(s, "{:<36} {:>5}", truncate(name, 33), count);
    }
}

/// First `max` characters, with `...` appended when anything was cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn percent(count: usize, of: usize) -> f64 {
    if of == 0 {
        0.0
    } else {
        count as f64 * 100.0 / of as f64
    }
}

/// "Bangalore, Karnataka" → "Bangalore".
fn primary_location(location: &str) -> Option<String> {
    let first = normalize(location.split(',').next()?);
    (!first.is_empty()).then_some(first)
}

fn tokens(value: Option<&FieldValue>) -> Vec<String> {
    match value {
        Some(FieldValue::Text(t)) => split_any(t, ",|;"),
        Some(FieldValue::List(items)) => items.iter().flat_map(|i| split_any(i, ",|;")).collect(),
        _ => Vec::new(),
    }
}

fn image_host(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed.host_str().map(str::to_string)
}

fn top(counts: HashMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut rows: Vec<(String, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(n);
    rows
}

// ── Tests ──
