//! Broker connection profiles.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::properties::UserProperty;

/// How the connection reaches the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Tcp,
    #[serde(alias = "ws")]
    WebSocket,
}

/// TLS protocol version to negotiate, or none for a plain connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TlsVersion {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "1.2")]
    Tls12,
    #[serde(rename = "1.3")]
    Tls13,
}

impl TlsVersion {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, TlsVersion::None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// MQTT 5 enhanced authentication.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtendedAuthentication {
    pub method: String,
    /// Base64 encoded authentication data.
    #[serde(default)]
    pub data: String,
}

/// Everything needed to open one broker connection.
///
/// A profile is a snapshot: the session manager reads it during `connect`
/// and keeps nothing of it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionProfile {
    pub host: String,
    pub port: u16,
    pub transport: TransportKind,
    /// Request path used for WebSocket connections.
    pub websocket_path: String,
    pub tls: TlsVersion,
    /// PEM file with additional trust roots. Uses the bundled web roots if unset.
    pub ca_path: Option<PathBuf>,
    /// Seconds to wait for the broker to answer CONNECT.
    pub communication_timeout: u64,
    /// Replaced with a random identifier when empty.
    pub client_id: String,
    pub clean_session: bool,
    pub credentials: Option<Credentials>,
    pub request_problem_information: bool,
    pub request_response_information: bool,
    /// Seconds, 0 disables keep-alive.
    pub keep_alive_interval: u16,
    /// Seconds, only sent when greater than zero.
    pub session_expiry_interval: u32,
    pub authentication: Option<ExtendedAuthentication>,
    pub user_properties: Vec<UserProperty>,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            transport: TransportKind::Tcp,
            websocket_path: "/mqtt".to_string(),
            tls: TlsVersion::None,
            ca_path: None,
            communication_timeout: 10,
            client_id: String::new(),
            clean_session: true,
            credentials: None,
            request_problem_information: true,
            request_response_information: false,
            keep_alive_interval: 60,
            session_expiry_interval: 0,
            authentication: None,
            user_properties: Vec::new(),
        }
    }
}

impl ConnectionProfile {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// `host:port`, or the WebSocket URL for WebSocket transports.
    pub fn address(&self) -> String {
        match self.transport {
            TransportKind::Tcp => format!("{}:{}", self.host, self.port),
            TransportKind::WebSocket => {
                let scheme = if self.tls.is_enabled() { "wss" } else { "ws" };
                let path = if self.websocket_path.starts_with('/') {
                    self.websocket_path.clone()
                } else {
                    format!("/{}", self.websocket_path)
                };
                format!("{}://{}:{}{}", scheme, self.host, self.port, path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_local_broker() {
        let profile = ConnectionProfile::default();
        assert_eq!(profile.address(), "localhost:1883");
        assert!(profile.clean_session);
        assert_eq!(profile.communication_timeout, 10);
        assert_eq!(profile.tls, TlsVersion::None);
    }

    #[test]
    fn websocket_address() {
        let mut profile = ConnectionProfile::new("broker.example", 8080);
        profile.transport = TransportKind::WebSocket;
        profile.websocket_path = "ws".to_string();
        assert_eq!(profile.address(), "ws://broker.example:8080/ws");

        profile.tls = TlsVersion::Tls13;
        assert_eq!(profile.address(), "wss://broker.example:8080/ws");
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let profile: ConnectionProfile = toml::from_str(
            r#"
            host = "10.0.0.5"
            transport = "websocket"
            tls = "1.2"

            [credentials]
            username = "meter"

            [[user_properties]]
            name = "site"
            value = "lab"
            "#,
        )
        .unwrap();

        assert_eq!(profile.host, "10.0.0.5");
        assert_eq!(profile.port, 1883);
        assert_eq!(profile.transport, TransportKind::WebSocket);
        assert_eq!(profile.tls, TlsVersion::Tls12);
        assert_eq!(profile.credentials.unwrap().password, "");
        assert_eq!(profile.user_properties, vec![UserProperty::new("site", "lab")]);
    }
}
