//! REST snapshot client
//!
//! Fetches `GET /depth` snapshots used to anchor the replica.

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::orderbook::Snapshot;
use crate::parser::DepthSnapshot;
use crate::sync::SnapshotSource;

/// Binance depth snapshot client
#[derive(Debug, Clone)]
pub struct BinanceSnapshotClient {
    http: reqwest::Client,
    rest_endpoint: String,
}

impl BinanceSnapshotClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.snapshot_timeout())
            .build()?;

        Ok(Self {
            http,
            rest_endpoint: config.rest_endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn depth_url(&self) -> String {
        format!("{}/depth", self.rest_endpoint)
    }
}

#[async_trait]
impl SnapshotSource for BinanceSnapshotClient {
    async fn fetch_snapshot(&self, symbol: &str, limit: u32) -> Result<Snapshot> {
        let url = self.depth_url();
        let symbol = symbol.to_uppercase();

        debug!(symbol = %symbol, url = %url, limit, "Requesting depth snapshot");

        let limit_param = limit.to_string();
        let body = self
            .http
            .get(&url)
            .query(&[("symbol", symbol.as_str()), ("limit", limit_param.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        debug!(symbol = %symbol, len = body.len(), "Snapshot received");

        Ok(DepthSnapshot::parse(&body)?.into())
    }
}
