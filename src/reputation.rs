//! Reputation updater (spec §4.6): per-cycle score deltas from verdict
//! agreement, applied only to clients whose observation was fresh
//! enough to have counted toward that verdict.

use crate::fusion::{FusionInput, VerdictMap};
use crate::observation::ObservationPayload;
use crate::registry::ClientRegistry;
use crate::scene::{nearest_anchor_index, ParkingScene, SceneConfig};
use crate::settings::BrokerSettings;

const NONE_LABEL: &str = "None";
const EMPTY_LABEL: &str = "EMPTY";

/// Summary of one reputation-update pass, logged by the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReputationOutcome {
    pub clients_updated: usize,
    pub disagreements: usize,
}

/// Apply the post-verdict reputation update for every client in
/// `inputs` (already freshness-filtered by the caller) and return a
/// summary. No-op (returns `Default::default()`) unless the caller has
/// already checked `registry.len() >= 2` — spec §4.6: "When fewer than
/// two clients are registered, reputation updates are skipped."
pub fn update(
    registry: &mut ClientRegistry,
    scene: &SceneConfig,
    verdict: &VerdictMap,
    inputs: &[FusionInput],
    settings: &BrokerSettings,
) -> ReputationOutcome {
    match scene {
        SceneConfig::Categorical(_) => update_categorical(registry, verdict, inputs, settings),
        SceneConfig::Parking(cfg) => update_parking(registry, cfg, verdict, inputs, settings),
    }
}

fn update_categorical(
    registry: &mut ClientRegistry,
    verdict: &VerdictMap,
    inputs: &[FusionInput],
    settings: &BrokerSettings,
) -> ReputationOutcome {
    let mut outcome = ReputationOutcome::default();

    for input in inputs {
        let ObservationPayload::Categorical(slots) = &input.payload else {
            continue;
        };

        let mut sum_delta = 0.0;
        let mut disagreements = 0usize;
        for (slot, winner) in verdict {
            let client_label = slots
                .get(slot)
                .cloned()
                .flatten()
                .map(|d| d.label)
                .unwrap_or_else(|| NONE_LABEL.to_string());

            if winner == NONE_LABEL {
                // No ground truth to reward or penalize against.
                continue;
            }
            if client_label == *winner {
                sum_delta += 1.0;
            } else {
                sum_delta -= 1.0;
                disagreements += 1;
            }
        }

        if let Ok(client) = registry.lookup_mut(&input.name) {
            let new_rep = client.reputation() + sum_delta * settings.reputation_increment;
            client.set_reputation(new_rep, settings.min_reputation);
            outcome.clients_updated += 1;
            outcome.disagreements += disagreements;
        }
    }

    outcome
}

fn update_parking(
    registry: &mut ClientRegistry,
    scene: &ParkingScene,
    verdict: &VerdictMap,
    inputs: &[FusionInput],
    settings: &BrokerSettings,
) -> ReputationOutcome {
    let mut outcome = ReputationOutcome::default();
    if verdict.is_empty() {
        return outcome;
    }

    for input in inputs {
        let ObservationPayload::Parking(detections) = &input.payload else {
            continue;
        };

        let mut hits = 0usize;
        let mut misses = 0usize;
        for qr in detections {
            let agrees = if qr.is_empty_report() {
                nearest_anchor_index(&scene.empty_parking_spot_locations, &qr.position)
                    .and_then(|idx| verdict.get(&idx.to_string()))
                    .is_some_and(|label| label == EMPTY_LABEL)
            } else {
                nearest_anchor_index(&scene.occupied_parking_spot_locations, &qr.position)
                    .and_then(|idx| verdict.get(&idx.to_string()))
                    .is_some_and(|label| label == &qr.text)
            };
            if agrees {
                hits += 1;
            } else {
                misses += 1;
            }
        }

        let total = hits + misses;
        if let Ok(client) = registry.lookup_mut(&input.name) {
            if total > 0 {
                client.record_accuracy(hits as f64 / verdict.len() as f64);
            }
            let delta =
                hits as f64 * settings.reputation_increment - misses as f64 * settings.reputation_decrement;
            let new_rep = client.reputation() + delta;
            client.set_reputation(new_rep, settings.min_reputation);
            outcome.clients_updated += 1;
            outcome.disagreements += misses;
        }
    }

    outcome
}
