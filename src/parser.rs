//! Parser module for Binance depth payloads
//!
//! Handles deserialization of depth diff messages and REST depth snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

use crate::error::{ReplicaError, Result};
use crate::orderbook::{DiffEvent, Order, Snapshot};

/// Binance depth update message
#[derive(Debug, Clone, Deserialize)]
pub struct DepthUpdate {
    /// Event type
    #[serde(rename = "e", default)]
    pub event_type: Option<String>,

    /// Event time (milliseconds)
    #[serde(rename = "E", default)]
    pub event_time: Option<u64>,

    /// Symbol
    #[serde(rename = "s", default)]
    pub symbol: Option<String>,

    /// First update ID in event
    #[serde(rename = "U")]
    pub first_update_id: u64,

    /// Final update ID in event
    #[serde(rename = "u")]
    pub final_update_id: u64,

    /// Bids to update
    #[serde(rename = "b", deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<Order>,

    /// Asks to update
    #[serde(rename = "a", deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<Order>,
}

impl From<DepthUpdate> for DiffEvent {
    fn from(update: DepthUpdate) -> Self {
        DiffEvent {
            first_update_id: update.first_update_id,
            last_update_id: update.final_update_id,
            bids: update.bids,
            asks: update.asks,
        }
    }
}

/// Order book snapshot from REST API
#[derive(Debug, Clone, Deserialize)]
pub struct DepthSnapshot {
    /// Last update ID
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,

    /// Bids
    #[serde(deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<Order>,

    /// Asks
    #[serde(deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<Order>,
}

impl DepthSnapshot {
    /// Parse a REST depth response body
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl From<DepthSnapshot> for Snapshot {
    fn from(snapshot: DepthSnapshot) -> Self {
        Snapshot {
            last_update_id: snapshot.last_update_id,
            bids: snapshot.bids,
            asks: snapshot.asks,
        }
    }
}

/// Parsed WebSocket message
#[derive(Debug, Clone)]
pub enum ParsedMessage {
    DepthUpdate(DepthUpdate),
    /// Subscription acks and anything else that carries no depth data
    Unknown(String),
}

impl ParsedMessage {
    /// Parse a raw WebSocket message.
    ///
    /// Anything that looks like a depth update but fails to decode is a
    /// protocol error, not an unknown message.
    pub fn parse(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;

        // Combined stream wrapper: {"stream": "...", "data": {...}}
        if let (Some(stream), Some(data)) = (
            value.get("stream").and_then(|s| s.as_str()),
            value.get("data"),
        ) {
            if stream.contains("@depth") {
                return Self::parse_depth(data.clone());
            }
            return Ok(ParsedMessage::Unknown(raw.to_string()));
        }

        if is_depth_payload(&value) {
            return Self::parse_depth(value);
        }

        Ok(ParsedMessage::Unknown(raw.to_string()))
    }

    fn parse_depth(value: serde_json::Value) -> Result<Self> {
        let depth: DepthUpdate = serde_json::from_value(value)?;
        if depth.first_update_id > depth.final_update_id {
            return Err(ReplicaError::Protocol(format!(
                "first update id {} is after final update id {}",
                depth.first_update_id, depth.final_update_id
            )));
        }
        Ok(ParsedMessage::DepthUpdate(depth))
    }
}

fn is_depth_payload(value: &serde_json::Value) -> bool {
    match value.get("e").and_then(|e| e.as_str()) {
        Some(event_type) => event_type == "depthUpdate",
        None => value.get("U").is_some() || value.get("u").is_some(),
    }
}

/// Custom deserializer for price levels from array of string pairs
fn deserialize_price_levels<'de, D>(deserializer: D) -> std::result::Result<Vec<Order>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<String>> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|pair| {
            if pair.len() != 2 {
                return Err(serde::de::Error::custom("Invalid price level format"));
            }
            let price = Decimal::from_str(&pair[0]).map_err(serde::de::Error::custom)?;
            let quantity = Decimal::from_str(&pair[1]).map_err(serde::de::Error::custom)?;
            if quantity < Decimal::ZERO {
                return Err(serde::de::Error::custom(format!(
                    "negative quantity {} at price {}",
                    quantity, price
                )));
            }
            Ok(Order { price, quantity })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_depth_update() {
        let raw = r#"{
            "e": "depthUpdate",
            "E": 1672531200000,
            "s": "BTCUSDT",
            "U": 100,
            "u": 105,
            "b": [["50000.00", "1.5"], ["49999.00", "2.0"]],
            "a": [["50001.00", "1.0"], ["50002.00", "0.00000000"]]
        }"#;

        let msg = ParsedMessage::parse(raw).unwrap();
        if let ParsedMessage::DepthUpdate(depth) = msg {
            assert_eq!(depth.symbol.as_deref(), Some("BTCUSDT"));
            assert_eq!(depth.bids.len(), 2);
            assert_eq!(depth.bids[0].price, dec!(50000.00));
            assert!(depth.asks[1].quantity.is_zero());

            let event = DiffEvent::from(depth);
            assert_eq!(event.first_update_id, 100);
            assert_eq!(event.last_update_id, 105);
        } else {
            panic!("Expected DepthUpdate");
        }
    }

    #[test]
    fn test_parse_minimal_depth_update() {
        let raw = r#"{"U": 7, "u": 9, "b": [], "a": [["1.5", "3"]]}"#;
        match ParsedMessage::parse(raw).unwrap() {
            ParsedMessage::DepthUpdate(depth) => {
                assert!(depth.event_type.is_none());
                assert_eq!(depth.asks, vec![Order::new(dec!(1.5), dec!(3))]);
            }
            other => panic!("Expected DepthUpdate, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_combined_stream_wrapper() {
        let raw = r#"{
            "stream": "btcusdt@depth",
            "data": {"e": "depthUpdate", "E": 1, "s": "BTCUSDT", "U": 1, "u": 2, "b": [], "a": []}
        }"#;
        assert!(matches!(
            ParsedMessage::parse(raw).unwrap(),
            ParsedMessage::DepthUpdate(_)
        ));
    }

    #[test]
    fn test_subscription_ack_is_unknown() {
        let raw = r#"{"result": null, "id": 1}"#;
        assert!(matches!(
            ParsedMessage::parse(raw).unwrap(),
            ParsedMessage::Unknown(_)
        ));
    }

    #[test]
    fn test_malformed_depth_is_protocol_error() {
        let bad_price = r#"{"e": "depthUpdate", "U": 1, "u": 2, "b": [["abc", "1"]], "a": []}"#;
        assert!(matches!(
            ParsedMessage::parse(bad_price),
            Err(ReplicaError::Protocol(_))
        ));

        let bad_pair = r#"{"U": 1, "u": 2, "b": [["1"]], "a": []}"#;
        assert!(matches!(
            ParsedMessage::parse(bad_pair),
            Err(ReplicaError::Protocol(_))
        ));

        let inverted = r#"{"U": 5, "u": 2, "b": [], "a": []}"#;
        assert!(matches!(
            ParsedMessage::parse(inverted),
            Err(ReplicaError::Protocol(_))
        ));

        assert!(ParsedMessage::parse("not json").is_err());
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let raw = r#"{"U": 1, "u": 2, "b": [["100", "-1"]], "a": []}"#;
        assert!(matches!(
            ParsedMessage::parse(raw),
            Err(ReplicaError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_snapshot() {
        let raw = r#"{
            "lastUpdateId": 1027024,
            "bids": [["4.00000000", "431.00000000"]],
            "asks": [["4.00000200", "12.00000000"]]
        }"#;

        let snapshot: Snapshot = DepthSnapshot::parse(raw).unwrap().into();
        assert_eq!(snapshot.last_update_id, 1027024);
        assert_eq!(snapshot.bids, vec![Order::new(dec!(4), dec!(431))]);
        assert_eq!(snapshot.asks[0].price, dec!(4.000002));
    }

    #[test]
    fn test_snapshot_missing_field_is_protocol_error() {
        let raw = r#"{"bids": [], "asks": []}"#;
        assert!(matches!(
            DepthSnapshot::parse(raw),
            Err(ReplicaError::Protocol(_))
        ));
    }
}
