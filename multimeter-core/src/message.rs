//! Application messages received from the broker.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::{
    properties::UserProperty,
    qos::QoS,
    request::{PayloadFormat, PublishRequest},
};

/// A received application message.
///
/// Cheap to clone: the topic is an `Arc<str>` and the payload is `Bytes`,
/// so handing the same message to every observer costs no copies.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Arrival order within one session manager, starting at 1.
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
    pub topic: Arc<str>,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub payload_format: PayloadFormat,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    pub message_expiry_interval: Option<u32>,
    pub subscription_identifiers: Vec<u32>,
    pub user_properties: Vec<UserProperty>,
}

impl InboundMessage {
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload as text, with invalid UTF-8 replaced.
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Builds a request that publishes this message again.
    ///
    /// Subscription identifiers and the expiry interval belong to the
    /// original delivery and are not carried over.
    pub fn to_publish_request(&self) -> PublishRequest {
        PublishRequest {
            topic: self.topic.to_string(),
            payload: self.payload_text(),
            payload_format: self.payload_format,
            qos: self.qos,
            retain: self.retain,
            message_expiry_interval: 0,
            content_type: self.content_type.clone(),
            response_topic: self.response_topic.clone(),
            correlation_data: self.correlation_data.clone(),
            topic_alias: 0,
            subscription_identifier: 0,
            user_properties: self.user_properties.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn received(topic: &str, payload: &'static [u8]) -> InboundMessage {
        InboundMessage {
            sequence: 7,
            received_at: Utc::now(),
            topic: Arc::from(topic),
            payload: Bytes::from_static(payload),
            qos: QoS::AtLeastOnce,
            retain: true,
            payload_format: PayloadFormat::Utf8,
            content_type: Some("text/plain".to_string()),
            response_topic: Some("reply/here".to_string()),
            correlation_data: None,
            message_expiry_interval: Some(30),
            subscription_identifiers: vec![4],
            user_properties: vec![UserProperty::new("k", "v")],
        }
    }

    #[test]
    fn repeat_keeps_content_and_drops_delivery_details() {
        let message = received("sensors/temp", b"22.5");
        let request = message.to_publish_request();

        assert_eq!(request.topic, "sensors/temp");
        assert_eq!(request.payload, "22.5");
        assert_eq!(request.qos, QoS::AtLeastOnce);
        assert!(request.retain);
        assert_eq!(request.content_type.as_deref(), Some("text/plain"));
        assert_eq!(request.response_topic.as_deref(), Some("reply/here"));
        assert_eq!(request.user_properties, vec![UserProperty::new("k", "v")]);
        assert_eq!(request.subscription_identifier, 0);
        assert_eq!(request.message_expiry_interval, 0);
        assert_eq!(request.topic_alias, 0);
    }

    #[test]
    fn payload_text_is_lossy() {
        let message = received("raw", b"ok\xff");
        assert_eq!(message.payload_text(), "ok\u{fffd}");
        assert_eq!(message.len(), 3);
    }
}
