//! Synchronizer state machine
//!
//! Owns the write side of the replica. On the first event, or after the
//! chain breaks, it installs a fresh snapshot; afterwards every diff must
//! continue the sequence left by the previous one.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{SnapshotSource, StreamEvent};
use crate::backoff::Backoff;
use crate::config::Config;
use crate::error::{ReplicaError, Result};
use crate::metrics::SyncMetrics;
use crate::orderbook::{DiffEvent, SharedBook};

/// Synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No trusted snapshot; the next event triggers a fetch
    Uninitialized,
    /// Snapshot fetch in progress
    Resyncing,
    Synced,
}

/// What happened to a single stream event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied,
    /// Already covered by the book
    Stale,
    /// Starts past the book sequence; dropped while waiting for a contiguous event
    Gap,
    /// Broke the chain from the previous event; a new snapshot was installed
    Resynced,
    /// Transport disconnect; the book was emptied
    Reset,
}

/// Limits for snapshot retries and tolerated protocol errors
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub snapshot_max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_protocol_errors: u32,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            snapshot_max_attempts: config.snapshot_max_attempts,
            base_delay: config.reconnect_delay(),
            max_delay: config.max_backoff(),
            max_protocol_errors: config.max_protocol_errors,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Keeps a [`SharedBook`] consistent with the exchange
pub struct Synchronizer<S> {
    symbol: String,
    limit: u32,
    snapshots: S,
    book: SharedBook,
    state: SyncState,
    /// `last_update_id` of the previously applied diff, unset after a snapshot
    last_applied: Option<u64>,
    retry: RetryPolicy,
    protocol_errors: u32,
    metrics: Arc<SyncMetrics>,
    /// Interrupts snapshot fetches and retry delays
    cancel: CancellationToken,
}

impl<S: SnapshotSource> Synchronizer<S> {
    pub fn new(
        symbol: &str,
        limit: u32,
        snapshots: S,
        book: SharedBook,
        retry: RetryPolicy,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            limit,
            snapshots,
            book,
            state: SyncState::Uninitialized,
            last_applied: None,
            retry,
            protocol_errors: 0,
            metrics,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort snapshot recovery with [`ReplicaError::Cancelled`] once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    pub fn book(&self) -> SharedBook {
        self.book.clone()
    }

    /// Process one stream event
    pub async fn handle(&mut self, event: StreamEvent) -> Result<SyncOutcome> {
        match event {
            StreamEvent::Diff(diff) => self.on_diff(diff).await,
            StreamEvent::Disconnected { reason } => {
                self.on_disconnect(&reason).await;
                Ok(SyncOutcome::Reset)
            }
        }
    }

    /// Validate a diff against the book sequence and apply it if contiguous.
    ///
    /// Fails only when a required snapshot cannot be fetched.
    pub async fn on_diff(&mut self, event: DiffEvent) -> Result<SyncOutcome> {
        if self.state != SyncState::Synced {
            self.resync().await?;
        }

        let current = self.book.read().await.last_update_id();

        if event.last_update_id <= current {
            debug!(
                symbol = %self.symbol,
                last = event.last_update_id,
                book_last_update_id = current,
                "Dropping stale depth event"
            );
            self.metrics.events_stale.inc();
            return Ok(SyncOutcome::Stale);
        }

        if event.first_update_id > current + 1 {
            // Kept in Synced: waits for an event that starts at current + 1
            warn!(
                symbol = %self.symbol,
                expected = current + 1,
                first = event.first_update_id,
                last = event.last_update_id,
                "Sequence gap, dropping depth event"
            );
            self.metrics.events_gap.inc();
            return Ok(SyncOutcome::Gap);
        }

        if let Some(previous) = self.last_applied {
            if event.first_update_id != previous + 1 {
                warn!(
                    symbol = %self.symbol,
                    expected = previous + 1,
                    first = event.first_update_id,
                    last = event.last_update_id,
                    "Depth events not contiguous, resyncing"
                );
                self.resync().await?;
                return Ok(SyncOutcome::Resynced);
            }
        }

        self.book.write().await.apply_diff(&event);
        self.last_applied = Some(event.last_update_id);
        self.protocol_errors = 0;

        self.metrics.events_applied.inc();
        self.metrics.set_last_update_id(event.last_update_id);

        Ok(SyncOutcome::Applied)
    }

    /// Forget the book; events missed during the disconnect break the chain
    pub async fn on_disconnect(&mut self, reason: &str) {
        warn!(symbol = %self.symbol, reason = %reason, "Stream disconnected, discarding book");

        self.book.write().await.reset();
        self.last_applied = None;
        self.state = SyncState::Uninitialized;

        self.metrics.disconnects.inc();
        self.metrics.set_last_update_id(0);
    }

    /// Record an undecodable stream payload.
    ///
    /// The dropped event may have carried updates, so the next event
    /// re-anchors on a snapshot. Too many in a row is fatal.
    pub fn on_protocol_error(&mut self, err: &ReplicaError) -> Result<()> {
        self.protocol_errors += 1;
        self.metrics.protocol_errors.inc();

        if self.protocol_errors > self.retry.max_protocol_errors {
            return Err(ReplicaError::Protocol(format!(
                "{} consecutive undecodable depth events, last: {}",
                self.protocol_errors, err
            )));
        }

        warn!(
            symbol = %self.symbol,
            error = %err,
            count = self.protocol_errors,
            "Undecodable depth event, resync on next event"
        );
        self.last_applied = None;
        self.state = SyncState::Uninitialized;
        Ok(())
    }

    /// Fetch a snapshot and install it in place of the current book.
    ///
    /// The fetch runs without holding the book lock.
    pub async fn resync(&mut self) -> Result<()> {
        self.state = SyncState::Resyncing;
        self.last_applied = None;

        let mut backoff = Backoff::new(self.retry.base_delay, self.retry.max_delay);

        loop {
            let attempt = backoff.attempt() + 1;
            info!(symbol = %self.symbol, limit = self.limit, attempt, "Fetching order book snapshot");

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(self.abort_resync()),
                fetched = self.snapshots.fetch_snapshot(&self.symbol, self.limit) => fetched,
            };

            match fetched {
                Ok(snapshot) => {
                    let last_update_id = snapshot.last_update_id;
                    self.book.write().await.replace(&snapshot);
                    self.state = SyncState::Synced;

                    self.metrics.resyncs.inc();
                    self.metrics.set_last_update_id(last_update_id);

                    info!(
                        symbol = %self.symbol,
                        last_update_id,
                        bids = snapshot.bids.len(),
                        asks = snapshot.asks.len(),
                        "Order book initialized from snapshot"
                    );
                    return Ok(());
                }
                Err(e) if attempt < self.retry.snapshot_max_attempts => {
                    if matches!(e, ReplicaError::Protocol(_)) {
                        self.metrics.protocol_errors.inc();
                    }
                    let delay = backoff.next_delay();
                    warn!(
                        symbol = %self.symbol,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Snapshot fetch failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(self.abort_resync()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => {
                    self.state = SyncState::Uninitialized;
                    return Err(ReplicaError::Initialization {
                        attempts: attempt,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    fn abort_resync(&mut self) -> ReplicaError {
        info!(symbol = %self.symbol, "Snapshot recovery cancelled");
        self.state = SyncState::Uninitialized;
        ReplicaError::Cancelled
    }
}
