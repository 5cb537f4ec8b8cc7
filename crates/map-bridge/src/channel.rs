//! Host → page command delivery.
//!
//! A command goes out at once when the page is attached and its readiness
//! gate is open. Otherwise it is handed to a retry task that wakes on the gate
//! transition or on a fixed poll interval and gives up after a bounded number
//! of attempts. Closing the channel (or dropping it) cancels every retry task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use transit_common::{Config, Result, TransitError};

use crate::command::{CommandKind, MapCommand};
use crate::gate::ReadinessGate;

/// The embedded map page as seen from the host.
pub trait MapPage: Send + Sync {
    /// Posts one serialized command. Fails when the page is gone.
    fn post_message(&self, message: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(300),
            max_attempts: 20,
        }
    }
}

impl RetryPolicy {
    /// A zero attempt budget still gets one attempt.
    pub fn from_config(config: &Config) -> Self {
        Self {
            interval: config.retry_interval(),
            max_attempts: config.bridge_retry_max_attempts.max(1),
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Outcome of [`CommandChannel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Posted to the page immediately.
    Sent,
    /// Handed to a retry task.
    Queued,
}

type PageSlot = Arc<RwLock<Option<Arc<dyn MapPage>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PendingKey {
    // Only the newest command of a superseding kind is kept.
    Latest(CommandKind),
    Once(u64),
}

struct PendingRetry {
    id: u64,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<PendingKey, PendingRetry>>>;

pub struct CommandChannel {
    page: PageSlot,
    gate: ReadinessGate,
    policy: RetryPolicy,
    pending: PendingMap,
    next_id: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
}

impl CommandChannel {
    pub fn new(gate: ReadinessGate, policy: RetryPolicy) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            page: Arc::new(RwLock::new(None)),
            gate,
            policy,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            shutdown_tx,
        }
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Points the channel at a mounted page.
    pub async fn attach(&self, page: Arc<dyn MapPage>) {
        *self.page.write().await = Some(page);
        info!("🗺️ Map page attached");
    }

    pub async fn detach(&self) {
        if self.page.write().await.take().is_some() {
            info!("Map page detached");
        }
    }

    /// Number of live retry tasks.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Delivers `command` now if possible, otherwise queues it for retry.
    ///
    /// A queued command of a superseding kind replaces any undelivered one of
    /// the same kind.
    pub async fn send(&self, command: MapCommand) -> Result<Delivery> {
        if self.is_closed() {
            return Err(TransitError::PageUnavailable("command channel closed".to_string()));
        }

        let kind = command.kind();
        let message = command.to_message()?;

        if kind.supersedes_pending() {
            // An older queued command of this kind must not land after this one.
            if let Some(stale) = self.pending.lock().await.remove(&PendingKey::Latest(kind)) {
                debug!(?kind, "Superseding pending command");
                stale.handle.abort();
            }
        }

        if self.gate.is_ready() && try_deliver(&self.page, &message).await {
            return Ok(Delivery::Sent);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let key = if kind.supersedes_pending() {
            PendingKey::Latest(kind)
        } else {
            PendingKey::Once(id)
        };

        let task = RetryTask {
            kind,
            message,
            page: self.page.clone(),
            gate: self.gate.clone(),
            ready_rx: self.gate.subscribe(),
            shutdown_rx: self.shutdown_tx.subscribe(),
            policy: self.policy,
        };
        let pending = self.pending.clone();

        // Hold the lock across spawn so the task cannot finish and look for
        // its entry before the entry exists.
        let mut guard = self.pending.lock().await;
        let handle = tokio::spawn(async move {
            let finished = task.run().await;
            if finished {
                let mut pending = pending.lock().await;
                if pending.get(&key).map(|p| p.id) == Some(id) {
                    pending.remove(&key);
                }
            }
        });
        if let Some(previous) = guard.insert(key, PendingRetry { id, handle }) {
            previous.handle.abort();
        }
        debug!(?kind, "Command queued until the map page is ready");
        Ok(Delivery::Queued)
    }

    /// Cancels every retry task and refuses further commands.
    ///
    /// Must be called when the page unmounts.
    pub async fn close(&self) {
        self.shutdown_tx.send_replace(true);
        let mut pending = self.pending.lock().await;
        let cancelled = pending.len();
        for (_, retry) in pending.drain() {
            retry.handle.abort();
        }
        if cancelled > 0 {
            info!("Cancelled {} pending map command(s)", cancelled);
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        if let Ok(mut pending) = self.pending.try_lock() {
            for (_, retry) in pending.drain() {
                retry.handle.abort();
            }
        }
    }
}

/// Posts to the attached page, if any. `true` on success.
async fn try_deliver(page: &PageSlot, message: &str) -> bool {
    let slot = page.read().await;
    let Some(page) = slot.as_ref() else {
        return false;
    };
    match page.post_message(message) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to post map command: {}", e);
            false
        }
    }
}

struct RetryTask {
    kind: CommandKind,
    message: String,
    page: PageSlot,
    gate: ReadinessGate,
    ready_rx: watch::Receiver<bool>,
    shutdown_rx: watch::Receiver<bool>,
    policy: RetryPolicy,
}

impl RetryTask {
    /// Returns `false` when cancelled by shutdown, `true` when delivered or exhausted.
    async fn run(mut self) -> bool {
        for attempt in 1..=self.policy.attempts() {
            tokio::select! {
                _ = self.shutdown_rx.changed() => return false,
                changed = self.ready_rx.changed() => {
                    if changed.is_err() {
                        // Gate sender gone; fall back to plain polling.
                        tokio::time::sleep(self.policy.interval).await;
                    }
                }
                _ = tokio::time::sleep(self.policy.interval) => {}
            }

            if *self.shutdown_rx.borrow() {
                return false;
            }
            if self.gate.is_ready() && try_deliver(&self.page, &self.message).await {
                debug!(kind = ?self.kind, attempt, "Delivered queued map command");
                return true;
            }
        }

        warn!(
            kind = ?self.kind,
            attempts = self.policy.attempts(),
            "Map page never became ready, dropping command"
        );
        true
    }
}
