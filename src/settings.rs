//! Static broker settings (spec §6 "Broker settings").
//!
//! Loaded once at startup from a JSON document and treated as immutable
//! for the life of the process — mirrors the teacher's env-var reads in
//! `main()`, generalized to a full settings document since this broker
//! has many more tunables than a port number.

use serde::Deserialize;
use std::path::Path;

use crate::error::{BrokerError, BrokerResult};

fn default_broker_ip() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    1883
}
fn default_refresh() -> f64 {
    0.5
}
fn default_staleness() -> f64 {
    2.5
}
fn default_verbose() -> bool {
    false
}
fn default_increment() -> f64 {
    0.005
}
fn default_decrement() -> f64 {
    0.010
}
fn default_min_reputation() -> f64 {
    0.35
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerSettings {
    #[serde(default = "default_broker_ip")]
    pub broker_ip: String,
    #[serde(default = "default_port")]
    pub port_num: u16,
    #[serde(default = "default_refresh")]
    pub verdict_min_refresh_time: f64,
    #[serde(default = "default_staleness")]
    pub oldest_allowable_data: f64,
    #[serde(default = "default_verbose")]
    pub show_verbose_output: bool,
    #[serde(default = "default_increment")]
    pub reputation_increment: f64,
    #[serde(default = "default_decrement")]
    pub reputation_decrement: f64,
    #[serde(default = "default_min_reputation")]
    pub min_reputation: f64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            broker_ip: default_broker_ip(),
            port_num: default_port(),
            verdict_min_refresh_time: default_refresh(),
            oldest_allowable_data: default_staleness(),
            show_verbose_output: default_verbose(),
            reputation_increment: default_increment(),
            reputation_decrement: default_decrement(),
            min_reputation: default_min_reputation(),
        }
    }
}

impl BrokerSettings {
    pub fn load(path: &Path) -> BrokerResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BrokerError::Config(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| BrokerError::Config(format!("parsing {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let s = BrokerSettings::default();
        assert_eq!(s.verdict_min_refresh_time, 0.5);
        assert_eq!(s.oldest_allowable_data, 2.5);
        assert_eq!(s.reputation_increment, 0.005);
        assert_eq!(s.reputation_decrement, 0.010);
        assert_eq!(s.min_reputation, 0.35);
    }

    #[test]
    fn partial_document_fills_defaults() {
        let s: BrokerSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.port_num, 1883);
        assert_eq!(s.broker_ip, "localhost");
    }
}
