use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::FetchError;

/// Retrieves one raw document. One network call per invocation, no retry.
pub trait Fetch {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// Plain HTTP GET with a browser user agent.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(HttpFetcher { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

/// Global inter-request pacing shared by every worker.
///
/// Each request start is spaced from the previous one, and after a fetch
/// completes the next start is pushed out by a fresh random delay, so a
/// single sequential worker sleeps `[min, max]` between documents.
pub struct Pacer {
    min: Duration,
    max: Duration,
    ready_at: Mutex<Instant>,
}

impl Pacer {
    pub fn new(min: Duration, max: Duration) -> Self {
        Pacer {
            min,
            max: max.max(min),
            ready_at: Mutex::new(Instant::now()),
        }
    }

    /// Reserve the next free slot, then wait for it outside the lock so
    /// `complete` from finished workers is never held up by a sleeper.
    pub async fn acquire(&self) {
        let slot = {
            let mut ready_at = self.ready_at.lock().await;
            let slot = (*ready_at).max(Instant::now());
            *ready_at = slot + self.draw();
            slot
        };
        let now = Instant::now();
        if slot > now {
            debug!("Pacing: waiting {:.1}s", (slot - now).as_secs_f64());
            tokio::time::sleep_until(slot).await;
        }
    }

    /// Record that a fetch finished; the next one may not start before a new delay.
    pub async fn complete(&self) {
        let delay = self.draw();
        let mut ready_at = self.ready_at.lock().await;
        *ready_at = (*ready_at).max(Instant::now() + delay);
    }

    fn draw(&self) -> Duration {
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }
}

/// Pace, fetch, and mark completion.
pub async fn paced_fetch<F: Fetch>(fetcher: &F, pacer: &Pacer, url: &str) -> Result<String, FetchError> {
    pacer.acquire().await;
    let result = fetcher.fetch(url).await;
    pacer.complete().await;
    result
}

// ── Tests ──
