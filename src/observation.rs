//! Per-client observation shapes (spec §3 "Observation").
//!
//! Both variants are unified behind one `Observation { payload,
//! timestamp }` shape — spec §9 flags the reference source's split
//! between a `Decision.getTimeStamp()` accessor and a plain `timestamp`
//! field as an inconsistency to resolve, not to port.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::scene::Position;

/// A single categorical detection: label, confidence in [0,1], distance
/// in world units. Travels on the wire as a `[label, confidence,
/// distance]` triple, matching the reference source's list encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f64,
    pub distance: f64,
}

impl Detection {
    /// The sentinel substituted for a slot no client reported on.
    pub fn none_sentinel() -> Self {
        Detection {
            label: "None".to_string(),
            confidence: 0.1,
            distance: 0.0,
        }
    }
}

impl<'de> Deserialize<'de> for Detection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (label, confidence, distance) = <(String, f64, f64)>::deserialize(deserializer)?;
        Ok(Detection {
            label,
            confidence,
            distance,
        })
    }
}

impl Serialize for Detection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTuple;
        let mut tup = serializer.serialize_tuple(3)?;
        tup.serialize_element(&self.label)?;
        tup.serialize_element(&self.confidence)?;
        tup.serialize_element(&self.distance)?;
        tup.end()
    }
}

/// A single QR detection in the parking variant.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QrDetection {
    pub text: String,
    pub position: Position,
    pub distance: f64,
}

impl QrDetection {
    pub const EMPTY_TEXT: &'static str = "EMPTY";

    pub fn is_empty_report(&self) -> bool {
        self.text == Self::EMPTY_TEXT
    }
}

/// The per-client observation payload, tagged by scene variant.
#[derive(Debug, Clone)]
pub enum ObservationPayload {
    Categorical(HashMap<String, Option<Detection>>),
    Parking(Vec<QrDetection>),
}

/// A client's latest observation, stamped with broker receipt time.
/// Immutable once stored; overwritten wholesale on the next arrival
/// (spec §4.3).
#[derive(Debug, Clone)]
pub struct Observation {
    pub payload: ObservationPayload,
    pub timestamp: f64,
}

impl Observation {
    pub fn new(payload: ObservationPayload, timestamp: f64) -> Self {
        Self { payload, timestamp }
    }

    /// Freshness check per spec §4.3: `now - stamp <= oldest_allowable_data`.
    pub fn is_fresh(&self, now: f64, oldest_allowable_data: f64) -> bool {
        now - self.timestamp <= oldest_allowable_data
    }
}
