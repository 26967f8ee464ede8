use core::fmt;

use chrono::{DateTime, Utc};
use multimeter_core::reason::ReasonCode;

/// Lifecycle of the single connection owned by the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect` was called, or the connection was replaced.
    ClientInitiated,

    /// The broker sent DISCONNECT.
    ServerInitiated,

    /// The network connection failed.
    ConnectionLost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectEvent {
    pub reason: DisconnectReason,
    /// Reason code from the broker's DISCONNECT, if it sent one.
    pub reason_code: Option<ReasonCode>,
    /// Reason string from the broker, or the network error text.
    pub reason_string: Option<String>,
    pub client_was_connected: bool,
}

impl DisconnectEvent {
    pub fn client_initiated() -> Self {
        Self {
            reason: DisconnectReason::ClientInitiated,
            reason_code: Some(ReasonCode::NormalDisconnection),
            reason_string: None,
            client_was_connected: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    ConnAck,
    Publish,
    PubAck,
    PubRec,
    PubRel,
    PubComp,
    Subscribe,
    SubAck,
    Unsubscribe,
    UnsubAck,
    PingReq,
    PingResp,
    Disconnect,
}

/// One control packet seen by the transport, for diagnostic views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectedPacket {
    pub direction: PacketDirection,
    pub kind: PacketKind,
    pub packet_id: Option<u16>,
    /// Human readable dump of the packet.
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Verbose,
    Info,
    Warning,
    Error,
}

/// A diagnostic line emitted by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub source: &'static str,
    pub message: String,
}

impl fmt::Display for LogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{:?}] [{}] {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.level,
            self.source,
            self.message
        )
    }
}
