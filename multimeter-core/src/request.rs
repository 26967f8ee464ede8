//! Publish, subscribe and unsubscribe requests as built by a front end.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{properties::UserProperty, qos::QoS};

/// How the text payload of a [`PublishRequest`] is declared on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Unspecified,
    #[serde(alias = "utf-8")]
    Utf8,
}

impl PayloadFormat {
    /// Payload format indicator property, `None` when it is not sent.
    pub fn indicator(&self) -> Option<u8> {
        match self {
            PayloadFormat::Unspecified => None,
            PayloadFormat::Utf8 => Some(1),
        }
    }

    /// Encodes the text payload.
    pub fn encode(&self, text: &str) -> Bytes {
        match self {
            PayloadFormat::Unspecified | PayloadFormat::Utf8 => Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    pub fn from_indicator(indicator: Option<u8>) -> Self {
        match indicator {
            Some(1) => PayloadFormat::Utf8,
            _ => PayloadFormat::Unspecified,
        }
    }
}

/// One message to publish.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: String,
    pub payload_format: PayloadFormat,
    pub qos: QoS,
    pub retain: bool,
    /// Seconds, 0 means the message never expires.
    pub message_expiry_interval: u32,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    /// 0 means no alias.
    pub topic_alias: u16,
    /// 0 means no identifier.
    pub subscription_identifier: u32,
    pub user_properties: Vec<UserProperty>,
}

impl PublishRequest {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn payload_bytes(&self) -> Bytes {
        self.payload_format.encode(&self.payload)
    }
}

/// When the broker should send retained messages for a new subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetainHandling {
    #[default]
    SendAtSubscribe,
    SendAtSubscribeIfNew,
    DoNotSend,
}

impl RetainHandling {
    pub fn wire_value(&self) -> u8 {
        match self {
            RetainHandling::SendAtSubscribe => 0,
            RetainHandling::SendAtSubscribeIfNew => 1,
            RetainHandling::DoNotSend => 2,
        }
    }
}

/// A single topic filter to subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeRequest {
    pub topic: String,
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
    pub user_properties: Vec<UserProperty>,
}

impl SubscribeRequest {
    pub fn new(topic: impl Into<String>, qos: QoS) -> Self {
        Self {
            topic: topic.into(),
            qos,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsubscribeRequest {
    pub topic: String,
    pub user_properties: Vec<UserProperty>,
}

impl UnsubscribeRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            user_properties: Vec::new(),
        }
    }
}

impl From<&SubscribeRequest> for UnsubscribeRequest {
    fn from(subscription: &SubscribeRequest) -> Self {
        Self {
            topic: subscription.topic.clone(),
            user_properties: subscription.user_properties.clone(),
        }
    }
}
