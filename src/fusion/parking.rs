//! Parking fusion: spatial QR-to-parking-spot assignment (spec §4.5).

use crate::observation::ObservationPayload;
use crate::scene::{nearest_anchor_index, Position};
use crate::scene::ParkingScene;

use super::{FusionInput, ParkingAssignment, VerdictMap};

const EMPTY_LABEL: &str = "EMPTY";

struct PlateTriple {
    plate: String,
    mean: Position,
}

/// Runs the four-step spatial assignment described in spec §4.5 and
/// returns the occupied-anchor verdict. Vacancy tallies on `empty[]`
/// are computed (matching the reference source) but, per spec §4.5,
/// are informational only — the verdict is derived purely from the
/// occupied-side assignment.
pub fn fuse(scene: &ParkingScene, inputs: &[FusionInput]) -> ParkingAssignment {
    let empty_anchors = &scene.empty_parking_spot_locations;
    let occupied_anchors = &scene.occupied_parking_spot_locations;

    let mut vacancy_counts = vec![0i64; empty_anchors.len()];
    // Preserve first-encountered order of plate texts: the displacement
    // stack below pops from the back, so the processing order mirrors
    // the reference source's `dict.items()` insertion order followed by
    // `list.pop()` from the end.
    let mut plate_order: Vec<String> = Vec::new();
    let mut plate_sums: std::collections::HashMap<String, (f64, f64, u32)> =
        std::collections::HashMap::new();

    for input in inputs {
        let ObservationPayload::Parking(detections) = &input.payload else {
            continue;
        };
        for qr in detections {
            if qr.is_empty_report() {
                if let Some(idx) = nearest_anchor_index(empty_anchors, &qr.position) {
                    vacancy_counts[idx] -= 1;
                }
            } else {
                let entry = plate_sums.entry(qr.text.clone()).or_insert_with(|| {
                    plate_order.push(qr.text.clone());
                    (0.0, 0.0, 0)
                });
                entry.0 += qr.position.x;
                entry.1 += qr.position.y;
                entry.2 += 1;
            }
        }
    }
    let _ = vacancy_counts; // informational only (spec §4.5)

    let mut stack: Vec<PlateTriple> = plate_order
        .iter()
        .map(|plate| {
            let (sx, sy, count) = plate_sums[plate];
            PlateTriple {
                plate: plate.clone(),
                mean: Position {
                    x: sx / count as f64,
                    y: sy / count as f64,
                },
            }
        })
        .collect();

    let mut taken: Vec<Option<PlateTriple>> = (0..occupied_anchors.len()).map(|_| None).collect();

    while let Some(candidate) = stack.pop() {
        let mut best: Option<(usize, f64)> = None;
        for (i, anchor) in occupied_anchors.iter().enumerate() {
            let dist = anchor.distance_to(&candidate.mean);
            let eligible = match &taken[i] {
                None => true,
                Some(occupant) => dist < anchor.distance_to(&occupant.mean),
            };
            if !eligible {
                continue;
            }
            match best {
                Some((_, best_dist)) if dist >= best_dist => {}
                _ => best = Some((i, dist)),
            }
        }

        let Some((idx, _)) = best else {
            // No occupied spot can accept this plate (every spot holds a
            // strictly closer occupant). The plate is dropped from this
            // cycle's verdict rather than looping forever.
            continue;
        };
        if let Some(displaced) = taken[idx].take() {
            stack.push(displaced);
        }
        taken[idx] = Some(candidate);
    }

    let mut verdict = VerdictMap::new();
    for (i, slot) in taken.into_iter().enumerate() {
        let label = slot.map(|t| t.plate).unwrap_or_else(|| EMPTY_LABEL.to_string());
        verdict.insert(i.to_string(), label);
    }

    ParkingAssignment { verdict }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::QrDetection;

    fn scene(occupied: Vec<Position>, empty: Vec<Position>) -> ParkingScene {
        ParkingScene {
            empty_parking_spot_locations: empty,
            occupied_parking_spot_locations: occupied,
            true_parking_occupants: vec![],
            max_decision_history: 10,
            vehicle_locations: serde_json::Value::Null,
        }
    }

    fn input(name: &str, detections: Vec<QrDetection>) -> FusionInput {
        FusionInput {
            name: name.to_string(),
            reputation: 0.5,
            payload: ObservationPayload::Parking(detections),
        }
    }

    #[test]
    fn scenario_displacement() {
        let scn = scene(
            vec![Position { x: 0.0, y: 0.0 }, Position { x: 10.0, y: 0.0 }],
            vec![],
        );
        // Processed XYZ then ABC in a single client's list so the stack
        // pop order is ABC (pushed last) first, matching spec scenario 4.
        let inputs = vec![input(
            "c1",
            vec![
                QrDetection {
                    text: "XYZ".to_string(),
                    position: Position { x: 2.0, y: 0.0 },
                    distance: 2.0,
                },
                QrDetection {
                    text: "ABC".to_string(),
                    position: Position { x: 1.0, y: 0.0 },
                    distance: 1.0,
                },
            ],
        )];
        let out = fuse(&scn, &inputs);
        assert_eq!(out.verdict.get("0").unwrap(), "ABC");
        assert_eq!(out.verdict.get("1").unwrap(), "XYZ");
    }

    #[test]
    fn no_detections_yields_all_empty() {
        let scn = scene(vec![Position { x: 0.0, y: 0.0 }, Position { x: 1.0, y: 1.0 }], vec![]);
        let out = fuse(&scn, &[]);
        assert_eq!(out.verdict.get("0").unwrap(), "EMPTY");
        assert_eq!(out.verdict.get("1").unwrap(), "EMPTY");
    }

    #[test]
    fn no_plate_ever_assigned_twice() {
        let scn = scene(
            vec![
                Position { x: 0.0, y: 0.0 },
                Position { x: 1.0, y: 0.0 },
                Position { x: 2.0, y: 0.0 },
            ],
            vec![],
        );
        let inputs = vec![input(
            "c1",
            vec![QrDetection {
                text: "SOLO".to_string(),
                position: Position { x: 0.1, y: 0.0 },
                distance: 1.0,
            }],
        )];
        let out = fuse(&scn, &inputs);
        let occurrences = out.verdict.values().filter(|v| *v == "SOLO").count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn mean_position_averages_multiple_sightings() {
        let scn = scene(vec![Position { x: 5.0, y: 0.0 }], vec![]);
        let inputs = vec![input(
            "c1",
            vec![
                QrDetection {
                    text: "ABC".to_string(),
                    position: Position { x: 4.0, y: 0.0 },
                    distance: 1.0,
                },
                QrDetection {
                    text: "ABC".to_string(),
                    position: Position { x: 6.0, y: 0.0 },
                    distance: 1.0,
                },
            ],
        )];
        let out = fuse(&scn, &inputs);
        // mean(4,6) = 5 -> exactly on the anchor, still assigned.
        assert_eq!(out.verdict.get("0").unwrap(), "ABC");
    }
}
