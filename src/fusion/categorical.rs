//! Categorical fusion: reputation-weighted slot voting (spec §4.4).

use crate::observation::{Detection, ObservationPayload};
use crate::scene::CategoricalScene;

use super::{FusionInput, VerdictMap};

const NONE_LABEL: &str = "None";

/// For each configured slot, tally `confidence * reputation *
/// (1/ln(distance))` per label across fresh clients and report the
/// label with the greatest tally. Ties break by first-encountered
/// order (the order `inputs` is iterated in, i.e. the registry's
/// snapshot order). Distances `<= 1` would make `ln(distance) <= 0`
/// (non-positive or undefined weight) — such contributions are
/// skipped entirely rather than counted as zero-or-negative, per the
/// numeric guard in spec §4.4.
pub fn fuse(scene: &CategoricalScene, inputs: &[FusionInput]) -> VerdictMap {
    let mut verdict = VerdictMap::new();

    for slot in scene.object_locations.keys() {
        // (label, weight) pairs in first-seen order; a Vec keeps that
        // order explicit instead of relying on a hash map's iteration.
        let mut tally: Vec<(String, f64)> = Vec::new();

        for input in inputs {
            let detection = match &input.payload {
                ObservationPayload::Categorical(slots) => slots
                    .get(slot)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(Detection::none_sentinel),
                ObservationPayload::Parking(_) => Detection::none_sentinel(),
            };

            if detection.distance <= 1.0 {
                // ln(distance) <= 0: skip this client's contribution to
                // this slot entirely (spec §4.4 numeric edge case).
                continue;
            }

            let weight = detection.confidence * input.reputation * (1.0 / detection.distance.ln());

            match tally.iter_mut().find(|(label, _)| *label == detection.label) {
                Some(entry) => entry.1 += weight,
                None => tally.push((detection.label.clone(), weight)),
            }
        }

        let winner = tally
            .into_iter()
            .fold(None::<(String, f64)>, |best, (label, score)| match best {
                Some((best_label, best_score)) if score <= best_score => {
                    Some((best_label, best_score))
                }
                _ => Some((label, score)),
            })
            .map(|(label, _)| label)
            .unwrap_or_else(|| NONE_LABEL.to_string());

        verdict.insert(slot.clone(), winner);
    }

    verdict
}
