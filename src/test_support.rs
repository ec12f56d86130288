//! A fake transport for unit and integration tests (SPEC_FULL.md's
//! ambient test-tooling section): records every publish without
//! touching a real bus. Always compiled (not `#[cfg(test)]`-gated) so
//! `tests/` integration tests, which link the crate as an ordinary
//! dependency, can use it too.

use std::sync::Mutex;

use crate::error::BrokerResult;
use crate::transport::Publisher;

#[derive(Default)]
pub struct RecordingPublisher {
    pub json: Mutex<Vec<(String, serde_json::Value)>>,
    pub raw: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json_messages(&self, topic: &str) -> Vec<serde_json::Value> {
        self.json
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, v)| v.clone())
            .collect()
    }

    pub fn raw_messages(&self, topic: &str) -> Vec<Vec<u8>> {
        self.raw
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, v)| v.clone())
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish_json(&self, topic: &str, value: &serde_json::Value) -> BrokerResult<()> {
        let mut value = value.clone();
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "source".to_string(),
                serde_json::Value::String("main_broker".to_string()),
            );
        }
        self.json.lock().unwrap().push((topic.to_string(), value));
        Ok(())
    }

    fn publish_raw(&self, topic: &str, raw: Vec<u8>) -> BrokerResult<()> {
        self.raw.lock().unwrap().push((topic.to_string(), raw));
        Ok(())
    }
}
