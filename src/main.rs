mod analyze;
mod backfill;
mod checkpoint;
mod error;
mod fetcher;
mod parser;
mod pipeline;
mod record;
mod settings;
mod worklist;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use backfill::{Applicability, ReferenceRecord};
use checkpoint::Checkpoint;
use fetcher::{HttpFetcher, Pacer};
use pipeline::RunContext;
use record::{FieldValue, Provenance, ScrapeRecord};
use settings::Settings;

#[derive(Parser)]
#[command(name = "lawyer_scraper", about = "Batch scraper for lawyer profile pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every URL in the work list, then analyze the results
    Run {
        /// Keep records from the existing output, skip finished URLs and retry failed ones
        #[arg(long)]
        resume: bool,
        /// Work list to read instead of the configured one (e.g. the failed file)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Scrape one URL and keep the raw page for inspection
    Single {
        url: String,
    },
    /// Re-analyze an existing results file
    Analyze {
        /// Results file (default: configured output)
        #[arg(short, long)]
        results: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let schema = parser::schema::profile(&settings.base_url)?;

    let result = match cli.command {
        Commands::Run { resume, input } => {
            let input = input.unwrap_or_else(|| settings.input.clone());
            let items = worklist::load(&input)?;
            if items.is_empty() {
                println!("No URLs in {}.", input.display());
                return Ok(());
            }

            let reference = ReferenceRecord::load(&settings.reference, &schema)?;
            let checkpoint = Checkpoint::new(&settings.output, settings.checkpoint_every);
            let mut ctx = RunContext::new(checkpoint, schema.clone(), reference, Applicability::MatchingName);

            let items = if resume && settings.output.exists() {
                let previous = checkpoint::load_records(&settings.output)?;
                let pending = ctx.resume(previous, items);
                println!("Resuming with {} records already saved.", ctx.checkpoint.len());
                pending
            } else {
                items
            };

            let (min, max) = settings.delay_window();
            let pacer = Pacer::new(min, max);
            let http = HttpFetcher::new(&settings.user_agent, settings.timeout())?;

            let t_scrape = Instant::now();
            println!(
                "Scraping {} pages (delay {}-{} ms, concurrency {})...",
                items.len(),
                settings.min_delay_ms,
                settings.max_delay_ms,
                settings.concurrency
            );
            let stats = pipeline::run(&http, &pacer, items, &mut ctx, settings.concurrency)
                .await
                .context("checkpoint write failed, run aborted")?;
            let records = ctx.checkpoint.finish()?;
            println!(
                "Scraped {} pages ({} ok, {} errors, {} resumed) in {}",
                stats.ok + stats.failed,
                stats.ok,
                stats.failed,
                stats.resumed,
                format_duration(t_scrape.elapsed())
            );
            if stats.backfilled > 0 {
                println!("{} records had gaps filled from the reference.", stats.backfilled);
            }
            if stats.required_missing > 0 {
                println!("{} records are missing a required field.", stats.required_missing);
            }

            report(&records, &schema, &settings)
        }
        Commands::Single { url } => {
            let reference = ReferenceRecord::load(&settings.reference, &schema)?;
            let http = HttpFetcher::new(&settings.user_agent, settings.timeout())?;
            let outcome = pipeline::run_single(
                &http,
                &url,
                &schema,
                reference.as_ref(),
                &settings.raw_dump,
            )
            .await?;

            checkpoint::write_json(&settings.single_output, &outcome.record)?;
            print_record(&outcome.record);
            for flag in &outcome.missing {
                println!("warning: {}", flag);
            }
            println!("\nSaved to {}", settings.single_output.display());
            Ok(())
        }
        Commands::Analyze { results } => {
            let path = results.unwrap_or_else(|| settings.output.clone());
            let records = checkpoint::load_records(&path)?;
            report(&records, &schema, &settings)
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn report(records: &[ScrapeRecord], schema: &[parser::cascade::FieldSpec], settings: &Settings) -> Result<()> {
    let analysis = analyze::analyze(records, schema, settings.top_n);
    analyze::write_artifacts(
        records,
        &analysis,
        &analyze::Artifacts {
            failed: &settings.failed_output,
            clean: &settings.clean_output,
            summary: &settings.summary_output,
        },
    )?;
    print!("\n{}", analyze::render(&analysis));
    info!("Summary saved to {}", settings.summary_output.display());
    Ok(())
}

fn print_record(record: &ScrapeRecord) {
    println!("URL: {}", record.url());
    if let Some(reason) = record.error() {
        println!("Error: {}", reason);
        return;
    }
    for (name, value) in record.fields() {
        let source = match record.provenance(name) {
            Some(Provenance::Extracted) => "extracted",
            Some(Provenance::Backfilled) => "backfilled",
            None => "-",
        };
        println!("{:<20} [{:<10}] {}", name, source, analyze::truncate(&describe(value), 80));
    }
}

fn describe(value: &FieldValue) -> String {
    match value {
        FieldValue::Null => "null".into(),
        FieldValue::Flag(b) => b.to_string(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Text(t) => t.clone(),
        FieldValue::List(items) => items.join(", "),
        FieldValue::Records(entries) => format!("{} entries", entries.len()),
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
