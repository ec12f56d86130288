//! Crate-wide error type.
//!
//! Matches the containment policy in spec §7: only a transport connect
//! failure is fatal. Every other variant is logged at the call site and
//! swallowed so a single misbehaving client can never halt verdict
//! production for the rest of the fleet.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("client '{0}' is already registered")]
    DuplicateClient(String),

    #[error("client '{0}' is not registered")]
    UnknownClient(String),

    #[error("failed to decode inbound payload on topic '{topic}': {source}")]
    Decode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("received a message on unsubscribed topic '{0}'")]
    UnknownTopic(String),

    #[error("transport error: {0}")]
    Bus(#[from] rumqttc::ClientError),

    #[error("transport connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),

    #[error("failed to load configuration: {0}")]
    Config(String),
}

pub type BrokerResult<T> = Result<T, BrokerError>;
