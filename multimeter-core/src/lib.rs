//! Core types for the multimeter MQTT session library.
//!
//! Everything in this crate is plain data: connection profiles, request
//! descriptions built by a front end, and the messages handed back to it.
//! No I/O happens here.

pub mod message;
pub mod profile;
pub mod properties;
pub mod qos;
pub mod reason;
pub mod request;
pub mod topic;

pub use message::InboundMessage;
pub use profile::{ConnectionProfile, Credentials, ExtendedAuthentication, TlsVersion, TransportKind};
pub use properties::UserProperty;
pub use qos::QoS;
pub use reason::ReasonCode;
pub use request::{PayloadFormat, PublishRequest, RetainHandling, SubscribeRequest, UnsubscribeRequest};
