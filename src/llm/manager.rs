//! LLM Decision Manager
//!
//! Bounded request queue plus one background worker that batches
//! requests and runs them through an [`LlmProvider`].
//!
//! Every request gets exactly one answer on its oneshot slot:
//! `Some(action)` on success, `None` (the fallback sentinel) on any
//! failure. Callers never wait on a full queue, and shutdown answers
//! everything still queued or mid-batch with `None`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::ai::action::AIAction;
use crate::ai::snapshot::StateSnapshot;
use crate::config::LlmConfig;
use crate::llm::grammar::action_grammar;
use crate::llm::parse::parse_llm_action;
use crate::llm::prompt::build_prompt;
use crate::llm::provider::LlmProvider;

/// Smoothing factor for the latency moving average.
pub const LATENCY_EMA_ALPHA: f64 = 0.1;

/// Result slot of one request.
pub type DecisionReceiver = oneshot::Receiver<Option<AIAction>>;

/// One queued decision request.
#[derive(Debug)]
pub struct InferenceRequest {
    /// World view the decision is for
    pub snapshot: StateSnapshot,
    /// Answer slot, consumed exactly once
    pub reply: oneshot::Sender<Option<AIAction>>,
    /// When the request was queued
    pub enqueued_at: Instant,
}

/// Pipeline counters.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct LlmStats {
    /// Every call to `request_decision`
    pub total_requests: u64,
    /// Requests answered with the fallback sentinel
    pub fallback_count: u64,
    /// Requests rejected because the queue was full or closed
    pub queue_rejections: u64,
    /// Batches processed
    pub batches: u64,
    /// Moving average of generation latency (milliseconds)
    pub avg_latency_ms: f64,
    /// Number of latency samples folded into the average
    pub latency_samples: u64,
}

impl LlmStats {
    /// Fold one latency sample into the moving average. The first sample
    /// seeds it.
    pub fn record_latency(&mut self, latency_ms: f64) {
        if self.latency_samples == 0 {
            self.avg_latency_ms = latency_ms;
        } else {
            self.avg_latency_ms = LATENCY_EMA_ALPHA * latency_ms + (1.0 - LATENCY_EMA_ALPHA) * self.avg_latency_ms;
        }
        self.latency_samples += 1;
    }

    /// Fraction of requests that fell back.
    pub fn fallback_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.fallback_count as f64 / self.total_requests as f64
    }
}

/// Queue and batching limits.
#[derive(Clone, Debug, PartialEq)]
pub struct ManagerSettings {
    /// Bounded queue capacity
    pub queue_capacity: usize,
    /// Max requests per batch
    pub max_batch_size: usize,
    /// Collection window after the first request of a batch
    pub batch_timeout: Duration,
}

impl From<&LlmConfig> for ManagerSettings {
    fn from(config: &LlmConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity.max(1),
            max_batch_size: config.max_batch_size.max(1),
            batch_timeout: Duration::from_millis(config.batch_timeout_ms),
        }
    }
}

fn lock_stats(stats: &Mutex<LlmStats>) -> std::sync::MutexGuard<'_, LlmStats> {
    stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable handle to the pipeline.
#[derive(Clone, Debug)]
pub struct LlmManager {
    tx: mpsc::Sender<InferenceRequest>,
    stats: Arc<Mutex<LlmStats>>,
    shutdown_tx: broadcast::Sender<()>,
    provider_name: String,
}

impl LlmManager {
    /// Spawn the worker and return a handle plus its join handle.
    pub fn start(provider: Arc<dyn LlmProvider>, settings: ManagerSettings) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(settings.queue_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let stats = Arc::new(Mutex::new(LlmStats::default()));
        let provider_name = provider.name().to_string();

        let worker = Worker {
            provider,
            rx,
            shutdown_rx,
            stats: Arc::clone(&stats),
            settings,
            grammar: action_grammar(),
        };
        let handle = tokio::spawn(worker.run());

        info!("LLM pipeline started with provider {}", provider_name);

        (Self { tx, stats, shutdown_tx, provider_name }, handle)
    }

    /// Queue a decision request without waiting.
    ///
    /// If the queue is full (or the worker is gone) the returned slot is
    /// already resolved with `None`.
    pub fn request_decision(&self, snapshot: StateSnapshot) -> DecisionReceiver {
        let (reply, rx) = oneshot::channel();
        lock_stats(&self.stats).total_requests += 1;

        let request = InferenceRequest { snapshot, reply, enqueued_at: Instant::now() };
        if let Err(e) = self.tx.try_send(request) {
            let request = match e {
                TrySendError::Full(r) => {
                    debug!("LLM queue full, falling back");
                    r
                }
                TrySendError::Closed(r) => {
                    debug!("LLM worker stopped, falling back");
                    r
                }
            };
            {
                let mut stats = lock_stats(&self.stats);
                stats.queue_rejections += 1;
                stats.fallback_count += 1;
            }
            let _ = request.reply.send(None);
        }

        rx
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> LlmStats {
        lock_stats(&self.stats).clone()
    }

    /// Provider name.
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }

    /// Signal the worker to stop. Outstanding requests are answered with
    /// `None`; await the join handle from [`start`](Self::start) to wait
    /// for that to finish.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

// =============================================================================
// WORKER
// =============================================================================

struct Worker {
    provider: Arc<dyn LlmProvider>,
    rx: mpsc::Receiver<InferenceRequest>,
    shutdown_rx: broadcast::Receiver<()>,
    stats: Arc<Mutex<LlmStats>>,
    settings: ManagerSettings,
    grammar: String,
}

impl Worker {
    #[instrument(skip(self), name = "llm_worker")]
    async fn run(mut self) {
        loop {
            // 1. Wait for the first request of a batch
            let first = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => break,
                req = self.rx.recv() => match req {
                    Some(r) => r,
                    None => break,
                },
            };

            // 2. Collect until full or the window closes
            let Some(batch) = self.collect_batch(first).await else {
                break;
            };

            // 3. Run the batch
            if !self.process_batch(batch).await {
                break;
            }
        }

        self.drain_queue();
        info!("LLM worker stopped");
    }

    /// Returns `None` if shutdown arrived while collecting (the partial
    /// batch has already been answered).
    async fn collect_batch(&mut self, first: InferenceRequest) -> Option<Vec<InferenceRequest>> {
        let mut batch = vec![first];
        let deadline = tokio::time::Instant::now() + self.settings.batch_timeout;

        while batch.len() < self.settings.max_batch_size {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    self.fail_all(batch);
                    return None;
                }
                req = self.rx.recv() => match req {
                    Some(r) => batch.push(r),
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline) => break,
            }
        }

        Some(batch)
    }

    /// Returns false if shutdown interrupted the batch.
    async fn process_batch(&mut self, batch: Vec<InferenceRequest>) -> bool {
        lock_stats(&self.stats).batches += 1;
        debug!("Processing LLM batch of {}", batch.len());

        // One availability probe per batch
        let available = tokio::select! {
            biased;
            _ = self.shutdown_rx.recv() => {
                self.fail_all(batch);
                return false;
            }
            available = self.provider.is_available() => available,
        };
        if !available {
            warn!("LLM provider {} unavailable, {} requests fall back", self.provider.name(), batch.len());
            self.fail_all(batch);
            return true;
        }

        let mut pending = batch.into_iter();
        while let Some(request) = pending.next() {
            if request.reply.is_closed() {
                // Caller went away; nobody to answer
                continue;
            }

            let prompt = build_prompt(&request.snapshot);
            let started = Instant::now();
            debug!("LLM request waited {:?} in queue", started.duration_since(request.enqueued_at));

            let outcome = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => None,
                result = self.provider.generate(&prompt, &self.grammar) => Some(result),
            };

            let Some(result) = outcome else {
                self.resolve(request, None);
                self.fail_all(pending);
                return false;
            };

            let action = match result {
                Ok(text) => {
                    lock_stats(&self.stats).record_latency(started.elapsed().as_secs_f64() * 1000.0);
                    match parse_llm_action(&text) {
                        Ok(action) => Some(action),
                        Err(e) => {
                            debug!("Unparseable LLM output ({}): {:?}", e, text);
                            None
                        }
                    }
                }
                Err(e) => {
                    warn!("LLM generation failed: {}", e);
                    None
                }
            };
            self.resolve(request, action);
        }

        true
    }

    fn resolve(&self, request: InferenceRequest, action: Option<AIAction>) {
        if action.is_none() {
            lock_stats(&self.stats).fallback_count += 1;
        }
        let _ = request.reply.send(action);
    }

    fn fail_all(&self, requests: impl IntoIterator<Item = InferenceRequest>) {
        for request in requests {
            self.resolve(request, None);
        }
    }

    /// Close the queue and answer everything still in it.
    fn drain_queue(&mut self) {
        self.rx.close();
        let mut drained = 0usize;
        while let Ok(request) = self.rx.try_recv() {
            self.resolve(request, None);
            drained += 1;
        }
        if drained > 0 {
            info!("Answered {} queued LLM requests with fallback on shutdown", drained);
        }
    }
}
