//! §4.G metrics core: a rolling 60-second ring of per-second buckets,
//! per-provider latency histograms, and a static per-model cost table.
//! Updates are fire-and-forget over an mpsc channel into one owning
//! task (channel-in, interval-flush), backed by in-memory counters
//! instead of a database.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

const WINDOW_SECONDS: usize = 60;
const HISTOGRAM_BOUNDS_MS: [u64; 10] = [10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000];
const SUBSCRIBE_HZ_MILLIS: u64 = 333;

/// Static per-million-token price table, keyed by a substring of the
/// model id (first match wins). Unknown models estimate as zero.
const COST_TABLE: &[(&str, f64, f64)] = &[
    ("claude-opus", 15.0, 75.0),
    ("claude-sonnet", 3.0, 15.0),
    ("claude-haiku", 0.8, 4.0),
    ("gpt-4o-mini", 0.15, 0.6),
    ("gpt-4o", 2.5, 10.0),
    ("o1", 15.0, 60.0),
    ("gemini-2.5-pro", 1.25, 10.0),
    ("gemini-2.5-flash", 0.3, 2.5),
    ("gemini", 0.3, 2.5),
];

pub fn estimate_cost_usd(model: &str, input_tokens: u64, output_tokens: u64) -> f64 {
    let lower = model.to_ascii_lowercase();
    let Some((_, in_price, out_price)) = COST_TABLE.iter().find(|(needle, _, _)| lower.contains(needle))
    else {
        return 0.0;
    };
    (input_tokens as f64 / 1_000_000.0) * in_price + (output_tokens as f64 / 1_000_000.0) * out_price
}

#[derive(Debug, Clone, Copy, Default)]
struct SecondBucket {
    requests: u64,
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Clone, Default)]
struct Histogram {
    counts: [u64; HISTOGRAM_BOUNDS_MS.len() + 1],
}

impl Histogram {
    fn observe(&mut self, latency_ms: u64) {
        for (i, bound) in HISTOGRAM_BOUNDS_MS.iter().enumerate() {
            if latency_ms <= *bound {
                self.counts[i] += 1;
                return;
            }
        }
        *self.counts.last_mut().unwrap() += 1;
    }
}

/// Derived, UI/scrape-facing view republished at `~3 Hz`.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub rpm: f64,
    pub tpm: f64,
    pub tps_last_second: f64,
    pub ttps_instant: f64,
    pub ttps_avg_60s: f64,
    pub cumulative_requests: u64,
    pub cumulative_input_tokens: u64,
    pub cumulative_output_tokens: u64,
    pub active_requests: i64,
    pub error_count: u64,
}

enum MetricsEvent {
    RequestStarted,
    RequestFinished {
        provider: String,
        input_tokens: u64,
        output_tokens: u64,
        latency_ms: u64,
        is_error: bool,
    },
    Scrape(tokio::sync::oneshot::Sender<String>),
}

struct MetricsState {
    buckets: VecDeque<SecondBucket>,
    cumulative_requests: u64,
    cumulative_input_tokens: u64,
    cumulative_output_tokens: u64,
    active_requests: i64,
    error_count: u64,
    histograms: HashMap<String, Histogram>,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            buckets: VecDeque::from(vec![SecondBucket::default(); WINDOW_SECONDS]),
            cumulative_requests: 0,
            cumulative_input_tokens: 0,
            cumulative_output_tokens: 0,
            active_requests: 0,
            error_count: 0,
            histograms: HashMap::new(),
        }
    }

    fn rotate(&mut self) {
        self.buckets.pop_front();
        self.buckets.push_back(SecondBucket::default());
    }

    fn apply(&mut self, event: MetricsEvent) {
        match event {
            MetricsEvent::RequestStarted => {
                self.active_requests += 1;
            }
            MetricsEvent::RequestFinished {
                provider,
                input_tokens,
                output_tokens,
                latency_ms,
                is_error,
            } => {
                self.active_requests -= 1;
                self.cumulative_requests += 1;
                self.cumulative_input_tokens += input_tokens;
                self.cumulative_output_tokens += output_tokens;
                if is_error {
                    self.error_count += 1;
                }
                if let Some(current) = self.buckets.back_mut() {
                    current.requests += 1;
                    current.input_tokens += input_tokens;
                    current.output_tokens += output_tokens;
                }
                self.histograms
                    .entry(provider)
                    .or_default()
                    .observe(latency_ms);
            }
            MetricsEvent::Scrape(reply) => {
                let _ = reply.send(self.render_prometheus());
            }
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let window_requests: u64 = self.buckets.iter().map(|b| b.requests).sum();
        let window_input: u64 = self.buckets.iter().map(|b| b.input_tokens).sum();
        let window_output: u64 = self.buckets.iter().map(|b| b.output_tokens).sum();
        let last = self.buckets.back().copied().unwrap_or_default();

        MetricsSnapshot {
            rpm: window_requests as f64,
            tpm: (window_input + window_output) as f64,
            tps_last_second: last.requests as f64,
            ttps_instant: (last.input_tokens + last.output_tokens) as f64,
            ttps_avg_60s: (window_input + window_output) as f64 / WINDOW_SECONDS as f64,
            cumulative_requests: self.cumulative_requests,
            cumulative_input_tokens: self.cumulative_input_tokens,
            cumulative_output_tokens: self.cumulative_output_tokens,
            active_requests: self.active_requests,
            error_count: self.error_count,
        }
    }

    fn render_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();
        out.push_str(&format!(
            "multigate_requests_total {}\n",
            snapshot.cumulative_requests
        ));
        out.push_str(&format!(
            "multigate_input_tokens_total {}\n",
            snapshot.cumulative_input_tokens
        ));
        out.push_str(&format!(
            "multigate_output_tokens_total {}\n",
            snapshot.cumulative_output_tokens
        ));
        out.push_str(&format!(
            "multigate_active_requests {}\n",
            snapshot.active_requests
        ));
        out.push_str(&format!("multigate_errors_total {}\n", snapshot.error_count));

        for (provider, histogram) in &self.histograms {
            let mut cumulative = 0u64;
            for (bound, count) in HISTOGRAM_BOUNDS_MS.iter().zip(histogram.counts.iter()) {
                cumulative += count;
                out.push_str(&format!(
                    "multigate_latency_ms_bucket{{provider=\"{provider}\",le=\"{bound}\"}} {cumulative}\n"
                ));
            }
            cumulative += histogram.counts.last().unwrap();
            out.push_str(&format!(
                "multigate_latency_ms_bucket{{provider=\"{provider}\",le=\"+Inf\"}} {cumulative}\n"
            ));
        }
        out
    }
}

/// Handle shared across request tasks. Cloning is cheap (an mpsc sender
/// plus a watch receiver factory); the owning task lives for the life
/// of the process.
#[derive(Clone)]
pub struct MetricsCore {
    events: mpsc::UnboundedSender<MetricsEvent>,
    snapshot: watch::Receiver<MetricsSnapshot>,
}

impl MetricsCore {
    pub fn spawn() -> Self {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<MetricsEvent>();
        let (snapshot_tx, snapshot_rx) = watch::channel(MetricsSnapshot::default());

        tokio::spawn(async move {
            let mut state = MetricsState::new();
            let mut second_tick = tokio::time::interval(Duration::from_secs(1));
            second_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut publish_tick =
                tokio::time::interval(Duration::from_millis(SUBSCRIBE_HZ_MILLIS));
            publish_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    event = events_rx.recv() => {
                        match event {
                            Some(event) => state.apply(event),
                            None => break,
                        }
                    }
                    _ = second_tick.tick() => state.rotate(),
                    _ = publish_tick.tick() => {
                        let _ = snapshot_tx.send(state.snapshot());
                    }
                }
            }
        });

        Self {
            events: events_tx,
            snapshot: snapshot_rx,
        }
    }

    pub fn request_started(&self) {
        let _ = self.events.send(MetricsEvent::RequestStarted);
    }

    pub fn request_finished(
        &self,
        provider: impl Into<String>,
        input_tokens: u64,
        output_tokens: u64,
        latency_ms: u64,
        is_error: bool,
    ) {
        let _ = self.events.send(MetricsEvent::RequestFinished {
            provider: provider.into(),
            input_tokens,
            output_tokens,
            latency_ms,
            is_error,
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<MetricsSnapshot> {
        self.snapshot.clone()
    }

    pub fn current(&self) -> MetricsSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Prometheus text-format scrape, including per-provider latency
    /// histograms. Round-trips through the owning task via a oneshot
    /// reply, since the histograms live inside its closure.
    pub async fn scrape_prometheus(&self) -> String {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        if self.events.send(MetricsEvent::Scrape(reply_tx)).is_err() {
            return String::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_table_matches_known_model_substring() {
        let cost = estimate_cost_usd("claude-sonnet-4-5", 1_000_000, 1_000_000);
        assert_eq!(cost, 3.0 + 15.0);
    }

    #[test]
    fn unknown_model_costs_zero() {
        assert_eq!(estimate_cost_usd("mystery-model", 1000, 1000), 0.0);
    }

    #[test]
    fn histogram_buckets_top_entry_into_the_right_bound() {
        let mut h = Histogram::default();
        h.observe(5);
        h.observe(30);
        h.observe(999_999);
        assert_eq!(h.counts[0], 1);
        assert_eq!(h.counts[2], 1);
        assert_eq!(*h.counts.last().unwrap(), 1);
    }

    #[tokio::test]
    async fn request_lifecycle_updates_cumulative_counters() {
        let metrics = MetricsCore::spawn();
        metrics.request_started();
        metrics.request_finished("claude-custom", 10, 20, 123, false);

        // allow the owning task's unbounded channel to drain
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut rx = metrics.subscribe();
        rx.changed().await.unwrap();
        let snapshot = rx.borrow().clone();
        assert_eq!(snapshot.cumulative_requests, 1);
        assert_eq!(snapshot.cumulative_input_tokens, 10);
        assert_eq!(snapshot.cumulative_output_tokens, 20);
    }
}
