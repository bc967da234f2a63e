//! Snapshot/diff synchronization
//!
//! The synchronizer anchors the replica on a REST snapshot and then only
//! trusts diff events that continue the sequence chain.

mod synchronizer;

pub use synchronizer::{RetryPolicy, SyncOutcome, SyncState, Synchronizer};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{ReplicaError, Result};
use crate::orderbook::{DiffEvent, Snapshot};

/// Something that produces full book snapshots on demand
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_snapshot(&self, symbol: &str, limit: u32) -> Result<Snapshot>;
}

/// Item delivered by a [`StreamSource`]
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Diff(DiffEvent),
    /// The transport dropped; anything until the next event may have been missed
    Disconnected { reason: String },
}

/// Non-terminating producer of diff events.
///
/// Implementations reconnect on their own but must yield
/// [`StreamEvent::Disconnected`] before delivering events from a new
/// connection. A recoverable error is returned for payloads that cannot be
/// decoded; a fatal one when the transport gives up.
#[async_trait]
pub trait StreamSource: Send {
    async fn next_event(&mut self) -> Result<StreamEvent>;
}

/// Feed stream events into the synchronizer until cancelled or a fatal error.
///
/// Cancellation is checked between events and interrupts snapshot recovery
/// when the synchronizer was built [`with_cancellation`](Synchronizer::with_cancellation).
pub async fn drive<St, Sn>(
    stream: &mut St,
    synchronizer: &mut Synchronizer<Sn>,
    cancel: &CancellationToken,
) -> Result<()>
where
    St: StreamSource + ?Sized,
    Sn: SnapshotSource,
{
    info!(symbol = %synchronizer.symbol(), "Starting depth synchronization");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(symbol = %synchronizer.symbol(), "Depth synchronization cancelled");
                return Ok(());
            }
            next = stream.next_event() => next,
        };

        match next {
            Ok(event) => match synchronizer.handle(event).await {
                Ok(_) => {}
                Err(ReplicaError::Cancelled) => {
                    info!(symbol = %synchronizer.symbol(), "Depth synchronization cancelled during resync");
                    return Ok(());
                }
                Err(e) => return Err(e),
            },
            Err(e) if e.is_recoverable() => {
                synchronizer.on_protocol_error(&e)?;
            }
            Err(e) => {
                warn!(symbol = %synchronizer.symbol(), error = %e, "Stream failed");
                return Err(e);
            }
        }
    }
}
