use std::collections::{HashMap, HashSet};
use std::path::Path;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::backfill::{self, Applicability, ReferenceRecord};
use crate::checkpoint::Checkpoint;
use crate::error::{FetchError, PersistenceError, RequiredFieldMissing};
use crate::fetcher::{paced_fetch, Fetch, Pacer};
use crate::parser::{self, cascade::FieldSpec};
use crate::record::{Provenance, ScrapeRecord, Stage, WorkItem};

/// Everything one run owns: the accumulator behind its checkpoint handle,
/// the compiled schema, and the read-only reference.
pub struct RunContext {
    pub checkpoint: Checkpoint,
    pub schema: Vec<FieldSpec>,
    pub reference: Option<ReferenceRecord>,
    pub policy: Applicability,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ok: usize,
    pub failed: usize,
    pub resumed: usize,
    pub backfilled: usize,
    pub required_missing: usize,
}

/// Terminal result for one work item.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub record: ScrapeRecord,
    pub stage: Stage,
    pub missing: Vec<RequiredFieldMissing>,
}

impl RunContext {
    pub fn new(
        checkpoint: Checkpoint,
        schema: Vec<FieldSpec>,
        reference: Option<ReferenceRecord>,
        policy: Applicability,
    ) -> Self {
        RunContext {
            checkpoint,
            schema,
            reference,
            policy,
            stats: RunStats::default(),
        }
    }

    /// Seed the accumulator from a previous results file and return the
    /// items still to do. Every previous record is seeded, so each flush
    /// stays a complete snapshot even if the run stops early. Successful
    /// URLs are skipped; failed ones are retried and their new result
    /// replaces the seeded failure. Records for URLs outside this work
    /// list are carried after it.
    pub fn resume(&mut self, previous: Vec<ScrapeRecord>, items: Vec<WorkItem>) -> Vec<WorkItem> {
        let mut known: HashMap<String, ScrapeRecord> = HashMap::new();
        let mut carried = Vec::new();
        let wanted: HashSet<&str> = items.iter().map(|i| i.url.as_str()).collect();

        for record in previous {
            if !wanted.contains(record.url()) {
                carried.push(record);
                continue;
            }
            // a success beats an earlier failure for the same URL
            let keep_existing = known
                .get(record.url())
                .is_some_and(|existing| !existing.is_failure() || record.is_failure());
            if !keep_existing {
                known.insert(record.url().to_string(), record);
            }
        }

        let mut next_index = items.iter().map(|i| i.index + 1).max().unwrap_or(0);
        let mut pending = Vec::with_capacity(items.len());
        let mut retried = 0usize;
        for item in items {
            match known.remove(&item.url) {
                Some(record) if !record.is_failure() => {
                    self.checkpoint.seed(item.index, record);
                    self.stats.resumed += 1;
                }
                Some(failure) => {
                    self.checkpoint.seed(item.index, failure);
                    retried += 1;
                    pending.push(item);
                }
                None => pending.push(item),
            }
        }
        let carried_count = carried.len();
        for record in carried {
            self.checkpoint.seed(next_index, record);
            next_index += 1;
        }

        info!(
            "Resuming: {} already done, {} failures to retry, {} carried over, {} to fetch",
            self.stats.resumed,
            retried,
            carried_count,
            pending.len()
        );
        pending
    }

    /// Extract, backfill, and record one fetched (or failed) item.
    pub fn process(
        &mut self,
        item: &WorkItem,
        fetched: Result<String, FetchError>,
    ) -> Result<Outcome, PersistenceError> {
        let outcome = assemble(item, fetched, &self.schema, self.reference.as_ref(), self.policy);
        debug_assert!(outcome.stage.is_terminal());

        if outcome.record.is_failure() {
            self.stats.failed += 1;
        } else {
            self.stats.ok += 1;
            let record = &outcome.record;
            if record.fields().keys().any(|k| record.provenance(k) == Some(Provenance::Backfilled)) {
                self.stats.backfilled += 1;
            }
            if !outcome.missing.is_empty() {
                self.stats.required_missing += 1;
            }
        }

        self.checkpoint.record(item.index, outcome.record.clone())?;
        Ok(outcome)
    }
}

/// Fetch → extract → backfill for one work item. Pure apart from logging.
pub fn assemble(
    item: &WorkItem,
    fetched: Result<String, FetchError>,
    schema: &[FieldSpec],
    reference: Option<&ReferenceRecord>,
    policy: Applicability,
) -> Outcome {
    let html = match fetched {
        Ok(html) => {
            debug!("#{} {}", item.index, Stage::Fetched);
            html
        }
        Err(e) => {
            debug!("#{} {}: {}", item.index, Stage::FetchFailed, e);
            return Outcome {
                record: ScrapeRecord::failed(&item.url, e.to_string()),
                stage: Stage::FetchFailed,
                missing: Vec::new(),
            };
        }
    };

    debug!("#{} {} ({} bytes)", item.index, Stage::Extracting, html.len());
    let extracted = parser::process_page(&html, schema);

    debug!("#{} {}", item.index, Stage::Backfilling);
    let reference = reference.filter(|r| r.applies_to(&extracted, policy));
    let merged = backfill::merge(extracted, reference, schema);
    for flag in &merged.missing {
        warn!("{}: {}", item.url, flag);
    }

    Outcome {
        record: ScrapeRecord::extracted(&item.url, merged.fields, merged.provenance),
        stage: Stage::Recorded,
        missing: merged.missing,
    }
}

/// Process every item. Fetches run up to `concurrency` at a time behind the
/// shared pacer; extraction and checkpointing happen here, one at a time.
pub async fn run<F: Fetch + Sync>(
    fetcher: &F,
    pacer: &Pacer,
    items: Vec<WorkItem>,
    ctx: &mut RunContext,
    concurrency: usize,
) -> Result<RunStats, PersistenceError> {
    let total = items.len();
    debug!("{} items {}", total, Stage::Pending);

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut results = stream::iter(items)
        .map(|item| async move {
            debug!("#{} {} {}", item.index, Stage::Fetching, item.url);
            let fetched = paced_fetch(fetcher, pacer, &item.url).await;
            (item, fetched)
        })
        .buffer_unordered(concurrency.max(1));

    let mut done = 0usize;
    while let Some((item, fetched)) = results.next().await {
        done += 1;
        let outcome = ctx.process(&item, fetched)?;
        match outcome.record.error() {
            None => pb.println(format!("[{}/{}] ok      {}", done, total, item.url)),
            Some(reason) => {
                warn!("[{}/{}] failed  {}: {}", done, total, item.url, reason);
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Processed {} items ({} ok, {} errors)",
        total, ctx.stats.ok, ctx.stats.failed
    );
    Ok(ctx.stats.clone())
}

/// Debug a single URL: no pacing, raw document kept on disk, reference
/// applied unconditionally.
pub async fn run_single<F: Fetch>(
    fetcher: &F,
    url: &str,
    schema: &[FieldSpec],
    reference: Option<&ReferenceRecord>,
    raw_dump: &Path,
) -> Result<Outcome, PersistenceError> {
    let item = WorkItem {
        url: url.to_string(),
        index: 0,
    };
    let fetched = fetcher.fetch(url).await;
    if let Ok(html) = &fetched {
        std::fs::write(raw_dump, html).map_err(|source| PersistenceError::Io {
            path: raw_dump.to_path_buf(),
            source,
        })?;
        info!("Saved raw page to {}", raw_dump.display());
    }
    Ok(assemble(&item, fetched, schema, reference, Applicability::Always))
}

// ── Tests ──
