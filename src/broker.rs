//! The `Broker` value (spec §9 "Global mutable state"): owns the
//! registry, scheduler, scene/settings, metrics, run controller and
//! transport handle that the reference source instead scatters across
//! module-level globals (`activeClients`, `last_verdict_time`,
//! `verdict_id`, `decision_history`, the bus handle). Everything is
//! passed explicitly into the single callback path instead.

use std::sync::Mutex;

use tracing::{info, warn};

use crate::dispatch::{self, InboundEvent};
use crate::error::BrokerResult;
use crate::fusion::{FusionEngine, FusionInput};
use crate::observation::Observation;
use crate::registry::ClientRegistry;
use crate::reputation;
use crate::run_controller::{accuracy_against_truth, RunController};
use crate::scene::{ConfigDocument, SceneConfig};
use crate::scheduler::VerdictScheduler;
use crate::settings::BrokerSettings;
use crate::transport::{Publisher, TOPIC_CONFIG, TOPIC_FINISHED, TOPIC_VERDICT};
use crate::metrics::{Metrics, MetricsSnapshot};

/// Outcome of processing one inbound message, for the caller driving
/// the event loop.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleOutcome {
    pub ran_verdict: bool,
    pub should_exit: bool,
}

/// The last-will topic for a scene, computable before a `Broker` exists
/// (the transport must be connected, will included, before the broker
/// that owns it can be constructed — spec §4.1).
pub fn last_will_topic_for_scene(scene: &SceneConfig) -> &'static str {
    match scene {
        SceneConfig::Categorical(_) => "msg_B2V",
        SceneConfig::Parking(_) => TOPIC_FINISHED,
    }
}

pub struct Broker<P: Publisher> {
    settings: BrokerSettings,
    config: ConfigDocument,
    registry: Mutex<ClientRegistry>,
    scheduler: Mutex<VerdictScheduler>,
    fusion: FusionEngine,
    run_controller: Option<Mutex<RunController>>,
    metrics: Metrics,
    publisher: P,
    started_at: f64,
}

impl<P: Publisher> Broker<P> {
    pub fn new(settings: BrokerSettings, config: ConfigDocument, publisher: P, now: f64) -> Self {
        let sorted_snapshot = matches!(config.scene, SceneConfig::Parking(_));
        let accuracy_history_capacity = match &config.scene {
            SceneConfig::Parking(p) => p.max_decision_history,
            SceneConfig::Categorical(_) => 0,
        };
        let run_controller = match &config.scene {
            SceneConfig::Parking(p) => Some(Mutex::new(RunController::new(p.max_decision_history, now))),
            SceneConfig::Categorical(_) => None,
        };
        let fusion = FusionEngine::for_scene(&config.scene);
        let scheduler = VerdictScheduler::new(settings.verdict_min_refresh_time);

        Self {
            settings,
            config,
            registry: Mutex::new(ClientRegistry::new(sorted_snapshot, accuracy_history_capacity)),
            scheduler: Mutex::new(scheduler),
            fusion,
            run_controller,
            metrics: Metrics::new(),
            publisher,
            started_at: now,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The bus's last-will topic for this variant: the categorical
    /// reference source wills `msg_B2V`, the parking one wills
    /// `finished` (reused as the completion topic) — spec §6.
    pub fn last_will_topic(&self) -> &'static str {
        last_will_topic_for_scene(&self.config.scene)
    }

    /// Dispatches one decoded inbound message by topic (spec §4.1/§9),
    /// containing any per-client error so a single misbehaving client
    /// can't halt the pipeline (spec §7). Returns whether a verdict
    /// cycle ran and whether the caller must now exit the process
    /// (parking run controller, spec §4.8).
    pub fn handle_message(&self, topic: &str, raw: &[u8], now: f64) -> CycleOutcome {
        let event = match dispatch::parse(topic, raw, &self.config.scene) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, topic, "dropping undecodable message");
                self.metrics.record_decode_error();
                return CycleOutcome::default();
            }
        };

        match event {
            InboundEvent::ClientLifecycle { source, joining: true } => {
                self.register_client(&source);
                CycleOutcome::default()
            }
            InboundEvent::ClientLifecycle { source, joining: false } => {
                self.unregister_client(&source);
                CycleOutcome::default()
            }
            InboundEvent::ConfigRequest => {
                self.publish_config();
                CycleOutcome::default()
            }
            InboundEvent::Observation { source, payload } => self.ingest_observation(&source, payload, now),
        }
    }

    /// spec §4.2 `register`: rejects a duplicate name, otherwise
    /// inserts at reputation 0.5 and republishes the scene
    /// configuration so the newcomer receives it.
    fn register_client(&self, name: &str) {
        let mut registry = self.registry.lock().unwrap();
        match registry.register(name) {
            Ok(()) => {
                info!(client = name, "registered client");
                self.metrics.record_registered();
                drop(registry);
                self.publish_config();
            }
            Err(e) => {
                warn!(error = %e, client = name, "duplicate registration ignored");
                self.metrics.record_duplicate_registration();
            }
        }
    }

    /// spec §4.2 `unregister`: idempotent at the call site per the
    /// open question in spec §9 — the registry itself still reports
    /// `UnknownClient` so the caller can log it, but a second `leave`
    /// for the same name is a harmless no-op from the bus's view.
    fn unregister_client(&self, name: &str) {
        let mut registry = self.registry.lock().unwrap();
        match registry.unregister(name) {
            Ok(()) => info!(client = name, "unregistered client"),
            Err(e) => {
                warn!(error = %e, client = name, "unregister of unknown client ignored");
                self.metrics.record_unknown_unregister();
            }
        }
    }

    /// spec §4.3 `record`: stamps and overwrites the client's
    /// observation (auto-registering on first contact, spec scenario
    /// 5), then unconditionally offers the scheduler a verdict cycle
    /// (spec §4.7: "invoked ... on every inbound observation").
    fn ingest_observation(&self, name: &str, payload: crate::observation::ObservationPayload, now: f64) -> CycleOutcome {
        let newly_registered = {
            let mut registry = self.registry.lock().unwrap();
            let newly_registered = if !registry.contains(name) {
                info!(client = name, "auto-registering on first observation");
                // Cannot fail (`contains` just proved absence), but
                // errors stay contained per policy regardless.
                match registry.register(name) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(error = %e, client = name, "auto-register failed");
                        return CycleOutcome::default();
                    }
                }
            } else {
                false
            };
            if let Ok(client) = registry.lookup_mut(name) {
                client.set_observation(Observation::new(payload, now));
            }
            newly_registered
        };

        if newly_registered {
            self.metrics.record_registered();
            self.publish_config();
        }
        self.metrics.record_ingested();

        self.maybe_run_cycle(now)
    }

    /// spec §6 `request_config` / side effect of `register`: republish
    /// the configuration document verbatim.
    fn publish_config(&self) {
        if let Err(e) = self.publisher.publish_raw(TOPIC_CONFIG, self.config.raw.clone().into_bytes()) {
            warn!(error = %e, "failed to publish config");
        }
    }

    /// spec §4.7 `maybe_verdict`: gated by the scheduler; safe to call
    /// unconditionally from any trigger path (inbound observation, or
    /// the parking run-controller's periodic tick).
    pub fn maybe_run_cycle(&self, now: f64) -> CycleOutcome {
        let should_run = self.scheduler.lock().unwrap().try_begin_cycle(now);
        if !should_run {
            return CycleOutcome::default();
        }
        self.run_cycle(now);

        let should_exit = self
            .run_controller
            .as_ref()
            .map(|rc| rc.lock().unwrap().should_finish())
            .unwrap_or(false);
        if should_exit {
            self.publish_finished();
        }

        CycleOutcome { ran_verdict: true, should_exit }
    }

    fn run_cycle(&self, now: f64) {
        let registry = self.registry.lock().unwrap();
        let stale = self.settings.oldest_allowable_data;

        let inputs: Vec<FusionInput> = registry
            .snapshot()
            .into_iter()
            .filter_map(|client| {
                let obs = client.observation()?;
                if !obs.is_fresh(now, stale) {
                    return None;
                }
                Some(FusionInput {
                    name: client.name().to_string(),
                    reputation: client.reputation(),
                    payload: obs.payload.clone(),
                })
            })
            .collect();
        drop(registry);

        let verdict = self.fusion.fuse(&self.config.scene, &inputs);

        if let Err(e) = self.publisher.publish_json(TOPIC_VERDICT, &serde_json::json!({ "message": verdict })) {
            warn!(error = %e, "failed to publish verdict");
        } else {
            self.metrics.record_verdict_published();
        }

        let client_count = self.registry.lock().unwrap().len();
        if client_count < 2 {
            info!("fewer than two clients registered, skipping reputation update");
            self.metrics.record_reputation_updates_skipped();
        } else {
            let mut registry = self.registry.lock().unwrap();
            let outcome = reputation::update(&mut registry, &self.config.scene, &verdict, &inputs, &self.settings);
            info!(
                clients_updated = outcome.clients_updated,
                disagreements = outcome.disagreements,
                "reputation updated"
            );
        }

        if let Some(rc) = &self.run_controller {
            let accuracy = match &self.config.scene {
                SceneConfig::Parking(p) => accuracy_against_truth(&verdict, &p.true_parking_occupants),
                SceneConfig::Categorical(_) => None,
            };
            let mut rc = rc.lock().unwrap();
            rc.record_verdict(accuracy);
            info!("{}", rc.progress_report(now));
        }
    }

    fn publish_finished(&self) {
        if let Err(e) = self.publisher.publish_json(TOPIC_FINISHED, &serde_json::json!({ "message": "I'm done!" })) {
            warn!(error = %e, "failed to publish finished");
        }
    }

    pub fn settings(&self) -> &BrokerSettings {
        &self.settings
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}
