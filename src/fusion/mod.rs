//! Fusion engine (spec §4.4 / §4.5): the two reputation-weighted voting
//! algorithms behind one interface, selected at startup from the scene
//! configuration rather than at compile time (spec §9 "Two variants,
//! one broker").

pub mod categorical;
pub mod parking;

use std::collections::BTreeMap;

use crate::observation::ObservationPayload;
use crate::scene::SceneConfig;

/// slot/spot id -> winning label. `BTreeMap` gives a deterministic
/// iteration and serialization order independent of hash-map layout,
/// which matters for property test P3 (determinism) and for stable
/// `verdict` payload diffs between cycles.
pub type VerdictMap = BTreeMap<String, String>;

/// One fresh, live client's contribution to a fusion cycle: a
/// snapshot taken before computation begins so fusion observes a
/// consistent view even if the caller later mutates the registry
/// (spec §5: "copy-then-compute").
#[derive(Debug, Clone)]
pub struct FusionInput {
    pub name: String,
    pub reputation: f64,
    pub payload: ObservationPayload,
}

/// Outcome of a parking fusion cycle needed both for the verdict and
/// for the reputation updater's nearest-anchor lookups (spec §4.6
/// "Parking").
#[derive(Debug, Clone, Default)]
pub struct ParkingAssignment {
    pub verdict: VerdictMap,
}

pub enum FusionEngine {
    Categorical,
    Parking,
}

impl FusionEngine {
    pub fn for_scene(scene: &SceneConfig) -> Self {
        match scene {
            SceneConfig::Categorical(_) => FusionEngine::Categorical,
            SceneConfig::Parking(_) => FusionEngine::Parking,
        }
    }

    /// Run the verdict algorithm for this variant against a snapshot of
    /// fresh, live clients.
    pub fn fuse(&self, scene: &SceneConfig, inputs: &[FusionInput]) -> VerdictMap {
        match (self, scene) {
            (FusionEngine::Categorical, SceneConfig::Categorical(cfg)) => {
                categorical::fuse(cfg, inputs)
            }
            (FusionEngine::Parking, SceneConfig::Parking(cfg)) => parking::fuse(cfg, inputs).verdict,
            _ => VerdictMap::new(),
        }
    }
}
