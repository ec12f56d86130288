//! Scene configuration (spec §3 "Scene Configuration", §6 "Configuration
//! document").
//!
//! Loaded once at startup from a JSON file alongside `BrokerSettings`.
//! The raw text is kept verbatim so it can be republished byte-for-byte
//! on the `config` topic (spec §6: "payload is the configuration
//! document verbatim"), while a typed view drives the fusion engine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{BrokerError, BrokerResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn distance_to(&self, other: &Position) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Index of the anchor nearest `pos`, ties broken by first-encountered
/// order (matches `parking_broker.py`'s `getClosestObject`, which only
/// replaces the running best on a strict `<`). `None` if `anchors` is
/// empty.
pub fn nearest_anchor_index(anchors: &[Position], pos: &Position) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, anchor) in anchors.iter().enumerate() {
        let d = anchor.distance_to(pos);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}

/// Scene configuration for the categorical variant: slot-name -> world
/// position, plus the opaque vehicle locations block republished as-is.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoricalScene {
    pub object_locations: HashMap<String, Position>,
    #[serde(default)]
    pub vehicle_locations: serde_json::Value,
}

/// Scene configuration for the parking variant: anchor positions for
/// empty and occupied spots, optional ground truth, and the decision
/// history ring capacity for the run controller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ParkingScene {
    pub empty_parking_spot_locations: Vec<Position>,
    pub occupied_parking_spot_locations: Vec<Position>,
    #[serde(default)]
    pub true_parking_occupants: Vec<String>,
    pub max_decision_history: usize,
    #[serde(default)]
    pub vehicle_locations: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum SceneConfig {
    Categorical(CategoricalScene),
    Parking(ParkingScene),
}

impl SceneConfig {
    /// Slot identifiers addressed by a verdict for this scene, in a
    /// stable order (categorical: configured slot-name order; parking:
    /// anchor index as string, "0".."N").
    pub fn slot_ids(&self) -> Vec<String> {
        match self {
            SceneConfig::Categorical(c) => c.object_locations.keys().cloned().collect(),
            SceneConfig::Parking(p) => (0..p.occupied_parking_spot_locations.len())
                .map(|i| i.to_string())
                .collect(),
        }
    }
}

/// The configuration document as loaded from disk: the raw text (for
/// verbatim republication) plus the parsed, typed view.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    pub raw: String,
    pub scene: SceneConfig,
}

impl ConfigDocument {
    pub fn load(path: &Path) -> BrokerResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BrokerError::Config(format!("reading {}: {e}", path.display())))?;
        let scene = if let Ok(parking) = serde_json::from_str::<ParkingScene>(&raw) {
            SceneConfig::Parking(parking)
        } else {
            let categorical: CategoricalScene = serde_json::from_str(&raw)
                .map_err(|e| BrokerError::Config(format!("parsing {}: {e}", path.display())))?;
            SceneConfig::Categorical(categorical)
        };
        Ok(Self { raw, scene })
    }
}
