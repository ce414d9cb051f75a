use rumqttc::{ClientError, ConnectReturnCode, ConnectionError};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The request could not be queued for the event loop (queue full or loop gone)
    #[error("Client request failed: {0}")]
    Client(#[from] ClientError),

    #[error("Network connection to broker failed: {0}")]
    Network(#[from] ConnectionError),

    #[error("Broker rejected connection: {code:?}")]
    BrokerRejected { code: ConnectReturnCode },

    #[error("Broker did not acknowledge connection within {timeout_millis}ms")]
    ConnectTimeout { timeout_millis: u64 },

    #[error("Event loop already consumed by an earlier connect")]
    AlreadyConnected,
}
