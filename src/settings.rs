use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Run settings: built-in defaults, then `scraper.toml`, then `SCRAPER_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub failed_output: PathBuf,
    pub clean_output: PathBuf,
    pub summary_output: PathBuf,
    pub reference: PathBuf,
    pub single_output: PathBuf,
    pub raw_dump: PathBuf,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub checkpoint_every: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub concurrency: usize,
    pub top_n: usize,
    pub base_url: String,
}

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("scraper").required(false))
                .add_source(Environment::with_prefix("SCRAPER")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        let settings: Settings = defaults(builder)?
            .build()
            .context("failed to read settings")?
            .try_deserialize()
            .context("invalid settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_delay_ms > self.max_delay_ms {
            bail!(
                "min_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.min_delay_ms,
                self.max_delay_ms
            );
        }
        if self.checkpoint_every == 0 {
            bail!("checkpoint_every must be at least 1");
        }
        if self.concurrency == 0 {
            bail!("concurrency must be at least 1");
        }
        Ok(())
    }

    pub fn delay_window(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Defaults go in first; sources added by the caller override them.
fn defaults(
    builder: config::ConfigBuilder<config::builder::DefaultState>,
) -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
    let builder = builder
        .set_default("input", "allLawyersList.json")?
        .set_default("output", "lawyers_data.json")?
        .set_default("failed_output", "lawyers_data_failed.json")?
        .set_default("clean_output", "lawyers_clean_data.json")?
        .set_default("summary_output", "lawyers_summary.txt")?
        .set_default("reference", "sample.json")?
        .set_default("single_output", "test_lawyer_data.json")?
        .set_default("raw_dump", "debug_page.html")?
        .set_default("min_delay_ms", 2000)?
        .set_default("max_delay_ms", 5000)?
        .set_default("checkpoint_every", 5)?
        .set_default("timeout_secs", 30)?
        .set_default("user_agent", DEFAULT_USER_AGENT)?
        .set_default("concurrency", 1)?
        .set_default("top_n", 10)?
        .set_default("base_url", "https://lawrato.com")?;
    Ok(builder)
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(toml: &str) -> Result<Settings> {
        Settings::from_builder(
            Config::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn defaults_match_the_batch_layout() {
        let s = from_toml("").unwrap();
        assert_eq!(s.input, PathBuf::from("allLawyersList.json"));
        assert_eq!(s.output, PathBuf::from("lawyers_data.json"));
        assert_eq!(s.failed_output, PathBuf::from("lawyers_data_failed.json"));
        assert_eq!(s.clean_output, PathBuf::from("lawyers_clean_data.json"));
        assert_eq!(s.checkpoint_every, 5);
        assert_eq!(s.concurrency, 1);
        assert_eq!(
            s.delay_window(),
            (Duration::from_millis(2000), Duration::from_millis(5000))
        );
    }

    #[test]
    fn file_overrides_defaults() {
        let s = from_toml("min_delay_ms = 10\nmax_delay_ms = 20\nconcurrency = 4").unwrap();
        assert_eq!(s.min_delay_ms, 10);
        assert_eq!(s.max_delay_ms, 20);
        assert_eq!(s.concurrency, 4);
        assert_eq!(s.top_n, 10);
    }

    #[test]
    fn inverted_delay_window_is_rejected() {
        let err = from_toml("min_delay_ms = 900\nmax_delay_ms = 100").unwrap_err();
        assert!(err.to_string().contains("min_delay_ms"));
    }

    #[test]
    fn zero_checkpoint_interval_is_rejected() {
        assert!(from_toml("checkpoint_every = 0").is_err());
        assert!(from_toml("concurrency = 0").is_err());
    }
}
