//! Multimeter MQTT session library
//!
//! A [`ConnectionSessionManager`] owns at most one broker connection. It
//! turns connection profiles and publish/subscribe requests into calls on an
//! MQTT library and fans the library's events out to observers.
//!
//! # Example
//!
//! ```no_run
//! use multimeter_core::{ConnectionProfile, InboundMessage, PublishRequest, QoS, SubscribeRequest};
//! use multimeter_session::ConnectionSessionManager;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionSessionManager::with_rumqtt();
//!
//!     manager.add_message_observer(|message: InboundMessage| async move {
//!         println!("{}: {}", message.topic, message.payload_text());
//!     });
//!
//!     manager.connect(&ConnectionProfile::new("localhost", 1883)).await?;
//!     manager
//!         .subscribe(&SubscribeRequest::new("test/#", QoS::AtLeastOnce))
//!         .await?;
//!     manager
//!         .publish(&PublishRequest::new("test/topic", "Hello, MQTT!"))
//!         .await?;
//!
//!     manager.disconnect().await?;
//!     Ok(())
//! }
//! ```

mod error;
mod events;
mod manager;
mod observers;
mod options;
mod rumqtt;
mod sink;
mod tls;
mod tracker;
mod transport;

pub use error::{Result, SessionError, TransportError};
pub use events::{
    ConnectionState, DisconnectEvent, DisconnectReason, InspectedPacket, LogLevel, LogMessage,
    PacketDirection, PacketKind,
};
pub use manager::ConnectionSessionManager;
pub use observers::{MessageObserver, ObserverId};
pub use options::{
    ConnectOptions, PublishOptions, SubscribeOptions, TlsOptions, TopicFilter, UnsubscribeOptions,
};
pub use rumqtt::{RumqttClient, RumqttTransport};
pub use sink::EventSink;
pub use transport::{
    ConnectOutcome, Delivery, PublishOutcome, SubscribeOutcome, TopicOutcome, TransportClient,
    TransportFactory, UnsubscribeOutcome,
};

impl ConnectionSessionManager<RumqttTransport> {
    /// A manager that connects through rumqttc.
    pub fn with_rumqtt() -> Self {
        Self::new(RumqttTransport::default())
    }
}
