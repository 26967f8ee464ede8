//! The capabilities the session manager needs from an MQTT library.

use async_trait::async_trait;
use bytes::Bytes;
use multimeter_core::{QoS, ReasonCode};

use crate::error::TransportError;
use crate::options::{ConnectOptions, PublishOptions, SubscribeOptions, UnsubscribeOptions};
use crate::sink::EventSink;

/// Builds a fresh client for every connect.
pub trait TransportFactory: Send + Sync {
    /// Creates an unconnected client that reports its events to `events`.
    fn create(&self, events: EventSink) -> Box<dyn TransportClient>;
}

/// One client of the underlying MQTT library.
///
/// Errors are returned as the library reports them; the manager does not
/// retry or reinterpret them.
#[async_trait]
pub trait TransportClient: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<ConnectOutcome, TransportError>;

    /// Gracefully closes the connection. Reports a client initiated
    /// disconnect to the event sink before returning.
    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn publish(&self, options: PublishOptions) -> Result<PublishOutcome, TransportError>;

    async fn subscribe(&self, options: SubscribeOptions)
        -> Result<SubscribeOutcome, TransportError>;

    async fn unsubscribe(
        &self,
        options: UnsubscribeOptions,
    ) -> Result<UnsubscribeOutcome, TransportError>;

    fn is_connected(&self) -> bool;
}

/// The broker's answer to CONNECT.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectOutcome {
    pub reason_code: ReasonCode,
    pub session_present: bool,
    pub assigned_client_identifier: Option<String>,
    pub reason_string: Option<String>,
    pub server_keep_alive: Option<u16>,
    pub response_information: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// `None` for QoS 0, which has no packet identifier.
    pub packet_id: Option<u16>,
    pub reason_code: ReasonCode,
}

/// Per topic result of a subscribe or unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicOutcome {
    pub topic: String,
    pub reason_code: ReasonCode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOutcome {
    pub packet_id: u16,
    pub items: Vec<TopicOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeOutcome {
    pub packet_id: u16,
    pub items: Vec<TopicOutcome>,
}

/// An application message as handed over by the library, before the
/// manager stamps it with a sequence number and arrival time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Delivery {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub payload_format_indicator: Option<u8>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    pub message_expiry_interval: Option<u32>,
    pub subscription_identifiers: Vec<u32>,
    pub user_properties: Vec<(String, String)>,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            qos,
            ..Default::default()
        }
    }
}
