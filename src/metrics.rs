//! Prometheus metrics for the synchronizer

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::error::{ReplicaError, Result};

/// Counters describing how diff events were handled
#[derive(Clone)]
pub struct SyncMetrics {
    registry: Registry,
    pub events_applied: IntCounter,
    pub events_stale: IntCounter,
    pub events_gap: IntCounter,
    pub resyncs: IntCounter,
    pub disconnects: IntCounter,
    pub protocol_errors: IntCounter,
    pub last_update_id: IntGauge,
}

impl SyncMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let events_applied =
            IntCounter::new("depth_events_applied_total", "Diff events applied to the book")?;
        let events_stale = IntCounter::new(
            "depth_events_stale_total",
            "Diff events dropped as older than the book",
        )?;
        let events_gap = IntCounter::new(
            "depth_events_gap_total",
            "Diff events dropped for starting past the book sequence",
        )?;
        let resyncs = IntCounter::new("depth_resyncs_total", "Snapshots installed")?;
        let disconnects =
            IntCounter::new("depth_disconnects_total", "Stream disconnects observed")?;
        let protocol_errors = IntCounter::new(
            "depth_protocol_errors_total",
            "Undecodable snapshot or diff payloads",
        )?;
        let last_update_id =
            IntGauge::new("depth_last_update_id", "Sequence id of the replica")?;

        registry.register(Box::new(events_applied.clone()))?;
        registry.register(Box::new(events_stale.clone()))?;
        registry.register(Box::new(events_gap.clone()))?;
        registry.register(Box::new(resyncs.clone()))?;
        registry.register(Box::new(disconnects.clone()))?;
        registry.register(Box::new(protocol_errors.clone()))?;
        registry.register(Box::new(last_update_id.clone()))?;

        Ok(Self {
            registry,
            events_applied,
            events_stale,
            events_gap,
            resyncs,
            disconnects,
            protocol_errors,
            last_update_id,
        })
    }

    pub fn set_last_update_id(&self, id: u64) {
        self.last_update_id.set(i64::try_from(id).unwrap_or(i64::MAX));
    }

    /// Render all metrics in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ReplicaError::Metrics(e.to_string()))
    }
}
