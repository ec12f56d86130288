//! Reputation-weighted consensus broker for a distributed vehicle
//! perception network: a message-bus-driven aggregator that ingests
//! per-client detections, fuses them into a single verdict per cycle,
//! and adjusts each client's reputation by how well it agreed with the
//! fused outcome (spec §2 "Overview").
//!
//! The library crate holds every piece that doesn't depend on a real
//! bus connection, so it can be driven in tests through the
//! [`test_support::RecordingPublisher`] fake exactly as `main.rs` drives
//! it through [`transport::MqttTransport`].

pub mod broker;
pub mod dispatch;
pub mod error;
pub mod fusion;
pub mod metrics;
pub mod observation;
pub mod registry;
pub mod reputation;
pub mod run_controller;
pub mod scene;
pub mod scheduler;
pub mod settings;
pub mod test_support;
pub mod transport;

pub use broker::{Broker, CycleOutcome};
pub use error::{BrokerError, BrokerResult};
pub use scene::ConfigDocument;
pub use settings::BrokerSettings;
