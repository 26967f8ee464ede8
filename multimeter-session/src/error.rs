use multimeter_core::{qos::QosError, reason::ReasonCode, topic::TopicError};
use thiserror::Error;

/// Errors returned by [`ConnectionSessionManager`](crate::ConnectionSessionManager).
#[derive(Error, Debug)]
pub enum SessionError {
    /// The operation needs a live connection and there is none.
    #[error("The MQTT client is not connected")]
    NotConnected,

    /// A request value was rejected before anything was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying MQTT library failed the call.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl From<TopicError> for SessionError {
    fn from(error: TopicError) -> Self {
        SessionError::InvalidArgument(error.to_string())
    }
}

impl From<QosError> for SessionError {
    fn from(error: QosError) -> Self {
        SessionError::InvalidArgument(error.to_string())
    }
}

/// Failures reported by a transport implementation, passed through verbatim.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection refused: {0}")]
    ConnectionRefused(ReasonCode),

    #[error("Timeout")]
    Timeout,

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, SessionError>;
