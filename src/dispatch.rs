//! Per-topic inbound payload parsing (spec §9 "Dynamic payloads"):
//! inbound JSON is untyped and its shape depends on topic, so each
//! topic is parsed into its own tagged variant rather than handled as
//! a loose `serde_json::Value`. A payload that fails to parse into its
//! topic's variant is a `DecodeError` (spec §7): logged and dropped,
//! never propagated.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{BrokerError, BrokerResult};
use crate::observation::{Detection, ObservationPayload, QrDetection};
use crate::scene::SceneConfig;
use crate::transport::{TOPIC_DATA, TOPIC_END_CLIENT, TOPIC_NEW_CLIENT, TOPIC_REQUEST_CONFIG};
use std::collections::HashMap;

/// A parsed inbound message, tagged by topic.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    ClientLifecycle { source: String, joining: bool },
    Observation { source: String, payload: ObservationPayload },
    ConfigRequest,
}

#[derive(Deserialize)]
struct SourceOnly {
    source: String,
}

#[derive(Deserialize)]
struct CategoricalDataPayload {
    source: String,
    object_list: HashMap<String, Option<Detection>>,
}

#[derive(Deserialize)]
struct ParkingDataPayload {
    source: String,
    object_list: Vec<QrDetection>,
}

/// Parses `raw` according to `topic`'s expected shape and the scene
/// variant (which governs whether `object_list` is a map or a list).
/// Unknown topics are treated the same as a decode failure: the caller
/// subscribes only to the four topics in spec §6, so an unrecognized
/// topic here would indicate an adapter bug, not a legitimate message.
pub fn parse(topic: &str, raw: &[u8], scene: &SceneConfig) -> BrokerResult<InboundEvent> {
    match topic {
        TOPIC_NEW_CLIENT => {
            let p: SourceOnly = decode(topic, raw)?;
            Ok(InboundEvent::ClientLifecycle { source: p.source, joining: true })
        }
        TOPIC_END_CLIENT => {
            let p: SourceOnly = decode(topic, raw)?;
            Ok(InboundEvent::ClientLifecycle { source: p.source, joining: false })
        }
        TOPIC_DATA => parse_data(raw, scene),
        TOPIC_REQUEST_CONFIG => Ok(InboundEvent::ConfigRequest),
        other => Err(BrokerError::UnknownTopic(other.to_string())),
    }
}

fn parse_data(raw: &[u8], scene: &SceneConfig) -> BrokerResult<InboundEvent> {
    match scene {
        SceneConfig::Categorical(_) => {
            let p: CategoricalDataPayload = decode(TOPIC_DATA, raw)?;
            Ok(InboundEvent::Observation {
                source: p.source,
                payload: ObservationPayload::Categorical(p.object_list),
            })
        }
        SceneConfig::Parking(_) => {
            let p: ParkingDataPayload = decode(TOPIC_DATA, raw)?;
            Ok(InboundEvent::Observation {
                source: p.source,
                payload: ObservationPayload::Parking(p.object_list),
            })
        }
    }
}

fn decode<'a, T: Deserialize<'a>>(topic: &str, raw: &'a [u8]) -> BrokerResult<T> {
    serde_json::from_slice(raw).map_err(|source| BrokerError::Decode {
        topic: topic.to_string(),
        source,
    })
}
