//! Translation of profiles and requests into the option sets a transport
//! consumes.
//!
//! Every "only sent when set" rule lives here, so transports can pass the
//! values through without interpreting them.

use std::path::PathBuf;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use multimeter_core::{
    properties::effective_user_properties,
    topic::{check_topic_filter, check_topic_name},
    ConnectionProfile, PublishRequest, QoS, RetainHandling, SubscribeRequest, TlsVersion,
    TransportKind, UnsubscribeRequest,
};

use crate::error::{Result, SessionError};

/// TLS settings for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TlsOptions {
    pub version: TlsVersion,
    /// PEM file with trust roots. The bundled web roots are used if unset.
    pub ca_path: Option<PathBuf>,
}

impl TlsOptions {
    pub fn is_enabled(&self) -> bool {
        self.version.is_enabled()
    }
}

/// Options for one connect attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub transport: TransportKind,
    pub websocket_path: String,
    pub tls: TlsOptions,
    pub communication_timeout: Duration,
    pub client_id: String,
    pub clean_start: bool,
    pub keep_alive: Duration,
    pub username: Option<String>,
    pub password: Option<String>,
    pub session_expiry_interval: Option<u32>,
    pub request_problem_information: bool,
    pub request_response_information: bool,
    pub authentication_method: Option<String>,
    pub authentication_data: Option<Bytes>,
    pub user_properties: Vec<(String, String)>,
}

impl ConnectOptions {
    pub fn from_profile(profile: &ConnectionProfile) -> Result<Self> {
        if profile.host.trim().is_empty() {
            return Err(SessionError::InvalidArgument("host is empty".to_string()));
        }

        let client_id = if profile.client_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            profile.client_id.clone()
        };

        let (username, password) = match &profile.credentials {
            Some(credentials)
                if !credentials.username.is_empty() || !credentials.password.is_empty() =>
            {
                (
                    Some(credentials.username.clone()),
                    Some(credentials.password.clone()),
                )
            }
            _ => (None, None),
        };

        let (authentication_method, authentication_data) = match &profile.authentication {
            Some(auth) if !auth.method.is_empty() => {
                let data = STANDARD.decode(auth.data.trim()).map_err(|e| {
                    SessionError::InvalidArgument(format!("authentication data: {}", e))
                })?;
                (Some(auth.method.clone()), Some(Bytes::from(data)))
            }
            _ => (None, None),
        };

        Ok(Self {
            host: profile.host.clone(),
            port: profile.port,
            transport: profile.transport,
            websocket_path: profile.websocket_path.clone(),
            tls: TlsOptions {
                version: profile.tls,
                ca_path: profile.ca_path.clone(),
            },
            communication_timeout: Duration::from_secs(profile.communication_timeout),
            client_id,
            clean_start: profile.clean_session,
            keep_alive: Duration::from_secs(u64::from(profile.keep_alive_interval)),
            username,
            password,
            session_expiry_interval: (profile.session_expiry_interval > 0)
                .then_some(profile.session_expiry_interval),
            request_problem_information: profile.request_problem_information,
            request_response_information: profile.request_response_information,
            authentication_method,
            authentication_data,
            user_properties: effective_user_properties(&profile.user_properties),
        })
    }

    /// Broker address in the form the transport dials.
    pub fn address(&self) -> String {
        match self.transport {
            TransportKind::Tcp => format!("{}:{}", self.host, self.port),
            TransportKind::WebSocket => {
                let scheme = if self.tls.is_enabled() { "wss" } else { "ws" };
                let path = self.websocket_path.trim_start_matches('/');
                format!("{}://{}:{}/{}", scheme, self.host, self.port, path)
            }
        }
    }
}

/// Wire-level description of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub topic: String,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
    pub payload_format_indicator: Option<u8>,
    pub message_expiry_interval: Option<u32>,
    pub content_type: Option<String>,
    pub response_topic: Option<String>,
    pub correlation_data: Option<Bytes>,
    pub topic_alias: Option<u16>,
    pub subscription_identifier: Option<u32>,
    pub user_properties: Vec<(String, String)>,
}

impl PublishOptions {
    pub fn from_request(request: &PublishRequest) -> Result<Self> {
        check_topic_name(&request.topic)?;

        if let Some(response_topic) = non_empty(&request.response_topic) {
            check_topic_name(&response_topic)?;
        }

        Ok(Self {
            topic: request.topic.clone(),
            payload: request.payload_bytes(),
            qos: request.qos,
            retain: request.retain,
            payload_format_indicator: request.payload_format.indicator(),
            message_expiry_interval: (request.message_expiry_interval > 0)
                .then_some(request.message_expiry_interval),
            content_type: non_empty(&request.content_type),
            response_topic: non_empty(&request.response_topic),
            correlation_data: request.correlation_data.clone(),
            // 0 is not a valid alias
            topic_alias: (request.topic_alias > 0).then_some(request.topic_alias),
            subscription_identifier: (request.subscription_identifier > 0)
                .then_some(request.subscription_identifier),
            user_properties: effective_user_properties(&request.user_properties),
        })
    }
}

/// A single topic filter with its subscription options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFilter {
    pub topic: String,
    pub qos: QoS,
    pub no_local: bool,
    pub retain_as_published: bool,
    pub retain_handling: RetainHandling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub filter: TopicFilter,
    pub user_properties: Vec<(String, String)>,
}

impl SubscribeOptions {
    pub fn from_request(request: &SubscribeRequest) -> Result<Self> {
        check_topic_filter(&request.topic)?;

        Ok(Self {
            filter: TopicFilter {
                topic: request.topic.clone(),
                qos: request.qos,
                no_local: request.no_local,
                retain_as_published: request.retain_as_published,
                retain_handling: request.retain_handling,
            },
            user_properties: effective_user_properties(&request.user_properties),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsubscribeOptions {
    pub topic: String,
    pub user_properties: Vec<(String, String)>,
}

impl UnsubscribeOptions {
    pub fn from_request(request: &UnsubscribeRequest) -> Result<Self> {
        check_topic_filter(&request.topic)?;

        Ok(Self {
            topic: request.topic.clone(),
            user_properties: effective_user_properties(&request.user_properties),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
