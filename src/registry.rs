//! Client registry (spec §4.2) and the `Client` record (spec §3).

use std::collections::{HashMap, VecDeque};

use crate::error::BrokerError;
use crate::observation::Observation;

const INITIAL_REPUTATION: f64 = 0.5;

/// A live client: reputation, latest observation, and (parking variant
/// only) a bounded ring of recent per-cycle hit ratios used solely for
/// the verbose accuracy report (spec §4.6 "Parking").
#[derive(Debug, Clone)]
pub struct Client {
    name: String,
    reputation: f64,
    observation: Option<Observation>,
    accuracy_history: VecDeque<f64>,
    accuracy_history_capacity: usize,
}

impl Client {
    fn new(name: String, accuracy_history_capacity: usize) -> Self {
        Self {
            name,
            reputation: INITIAL_REPUTATION,
            observation: None,
            accuracy_history: VecDeque::new(),
            accuracy_history_capacity,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reputation(&self) -> f64 {
        self.reputation
    }

    pub fn observation(&self) -> Option<&Observation> {
        self.observation.as_ref()
    }

    pub fn set_observation(&mut self, obs: Observation) {
        self.observation = Some(obs);
    }

    pub fn set_reputation(&mut self, value: f64, min_reputation: f64) {
        self.reputation = value.clamp(min_reputation, 1.0);
    }

    pub fn record_accuracy(&mut self, ratio: f64) {
        if self.accuracy_history_capacity == 0 {
            return;
        }
        self.accuracy_history.push_back(ratio);
        while self.accuracy_history.len() > self.accuracy_history_capacity {
            self.accuracy_history.pop_front();
        }
    }

    pub fn accuracy_history(&self) -> &VecDeque<f64> {
        &self.accuracy_history
    }

    pub fn mean_accuracy(&self) -> Option<f64> {
        if self.accuracy_history.is_empty() {
            None
        } else {
            Some(self.accuracy_history.iter().sum::<f64>() / self.accuracy_history.len() as f64)
        }
    }
}

/// In-memory directory of live clients keyed by name (spec §4.2).
///
/// Iteration order of `snapshot()` is insertion order by default, or
/// lexical name order when `sorted_snapshot` is set — the parking
/// variant requires the latter (`parking_broker.py` sorts
/// `activeClients` by name after every insert).
pub struct ClientRegistry {
    order: Vec<String>,
    clients: HashMap<String, Client>,
    sorted_snapshot: bool,
    accuracy_history_capacity: usize,
}

impl ClientRegistry {
    pub fn new(sorted_snapshot: bool, accuracy_history_capacity: usize) -> Self {
        Self {
            order: Vec::new(),
            clients: HashMap::new(),
            sorted_snapshot,
            accuracy_history_capacity,
        }
    }

    /// Register a new client. Fails with `DuplicateClient` if the name
    /// is already taken; the existing client (and its reputation and
    /// observation) is left untouched.
    pub fn register(&mut self, name: &str) -> Result<(), BrokerError> {
        if self.clients.contains_key(name) {
            return Err(BrokerError::DuplicateClient(name.to_string()));
        }
        self.clients.insert(
            name.to_string(),
            Client::new(name.to_string(), self.accuracy_history_capacity),
        );
        self.order.push(name.to_string());
        Ok(())
    }

    /// Remove a client. Fails with `UnknownClient` if absent. Per spec
    /// §3, removal of an absent client is otherwise a no-op (idempotent
    /// at the call site — the caller logs and continues).
    pub fn unregister(&mut self, name: &str) -> Result<(), BrokerError> {
        if self.clients.remove(name).is_none() {
            return Err(BrokerError::UnknownClient(name.to_string()));
        }
        self.order.retain(|n| n != name);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&Client, BrokerError> {
        self.clients
            .get(name)
            .ok_or_else(|| BrokerError::UnknownClient(name.to_string()))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Result<&mut Client, BrokerError> {
        self.clients
            .get_mut(name)
            .ok_or_else(|| BrokerError::UnknownClient(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// A deterministically ordered snapshot of currently-registered
    /// clients (spec §4.2 `snapshot()`).
    pub fn snapshot(&self) -> Vec<&Client> {
        if self.sorted_snapshot {
            let mut names: Vec<&String> = self.order.iter().collect();
            names.sort();
            names
                .into_iter()
                .filter_map(|n| self.clients.get(n))
                .collect()
        } else {
            self.order
                .iter()
                .filter_map(|n| self.clients.get(n))
                .collect()
        }
    }

    /// Mutable snapshot of client names in the same deterministic order
    /// as `snapshot()`, for callers (the reputation updater) that need
    /// to mutate each client in turn.
    pub fn ordered_names(&self) -> Vec<String> {
        if self.sorted_snapshot {
            let mut names = self.order.clone();
            names.sort();
            names
        } else {
            self.order.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_duplicate_fails() {
        let mut reg = ClientRegistry::new(false, 0);
        reg.register("c1").unwrap();
        let err = reg.register("c1").unwrap_err();
        assert!(matches!(err, BrokerError::DuplicateClient(name) if name == "c1"));
        assert_eq!(reg.lookup("c1").unwrap().reputation(), 0.5);
    }

    #[test]
    fn unregister_unknown_fails() {
        let mut reg = ClientRegistry::new(false, 0);
        let err = reg.unregister("ghost").unwrap_err();
        assert!(matches!(err, BrokerError::UnknownClient(name) if name == "ghost"));
    }

    #[test]
    fn unregister_then_reregister_succeeds() {
        let mut reg = ClientRegistry::new(false, 0);
        reg.register("c1").unwrap();
        reg.unregister("c1").unwrap();
        reg.register("c1").unwrap();
        assert_eq!(reg.lookup("c1").unwrap().reputation(), 0.5);
    }

    #[test]
    fn snapshot_insertion_order_by_default() {
        let mut reg = ClientRegistry::new(false, 0);
        reg.register("zebra").unwrap();
        reg.register("alpha").unwrap();
        let names: Vec<&str> = reg.snapshot().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["zebra", "alpha"]);
    }

    #[test]
    fn snapshot_sorted_when_requested() {
        let mut reg = ClientRegistry::new(true, 0);
        reg.register("zebra").unwrap();
        reg.register("alpha").unwrap();
        let names: Vec<&str> = reg.snapshot().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["alpha", "zebra"]);
    }

    #[test]
    fn reputation_clamped_on_set() {
        let mut reg = ClientRegistry::new(false, 0);
        reg.register("c1").unwrap();
        let c = reg.lookup_mut("c1").unwrap();
        c.set_reputation(5.0, 0.35);
        assert_eq!(c.reputation(), 1.0);
        c.set_reputation(-5.0, 0.35);
        assert_eq!(c.reputation(), 0.35);
    }

    #[test]
    fn accuracy_history_bounded() {
        let mut reg = ClientRegistry::new(false, 2);
        reg.register("c1").unwrap();
        let c = reg.lookup_mut("c1").unwrap();
        c.record_accuracy(1.0);
        c.record_accuracy(0.5);
        c.record_accuracy(0.0);
        assert_eq!(c.accuracy_history().len(), 2);
        assert_eq!(c.accuracy_history().front().copied(), Some(0.5));
    }
}
