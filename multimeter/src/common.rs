//! Connection arguments and helpers shared by the subcommands.

use std::path::PathBuf;

use clap::Args;
use multimeter_core::{ConnectionProfile, RetainHandling, TlsVersion, TransportKind, UserProperty};
use multimeter_session::{LogLevel, LogMessage};
use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Common connection arguments shared between pub and sub.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// TOML file with a [connection] profile and [logging] settings
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// MQTT broker hostname
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// MQTT broker port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Client ID (random if not specified)
    #[arg(short = 'i', long)]
    pub client_id: Option<String>,

    /// Username for authentication
    #[arg(short = 'u', long)]
    pub username: Option<String>,

    /// Password for authentication
    #[arg(short = 'P', long)]
    pub password: Option<String>,

    /// Keep-alive interval in seconds
    #[arg(short = 'k', long)]
    pub keep_alive: Option<u16>,

    /// Seconds to wait for the broker to accept the connection
    #[arg(long)]
    pub timeout: Option<u64>,

    /// TLS version to use (1.2 or 1.3)
    #[arg(long, value_parser = parse_tls_version)]
    pub tls: Option<TlsVersion>,

    /// PEM file with the CA certificates to trust
    #[arg(long)]
    pub cafile: Option<PathBuf>,

    /// Connect over WebSocket, optionally with the given request path
    #[arg(long, num_args = 0..=1, default_missing_value = "/mqtt")]
    pub ws: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl ConnectionArgs {
    /// Loads the config file if one was given.
    pub fn load_config(&self) -> Result<Config, Box<dyn std::error::Error>> {
        match self.config {
            Some(ref path) => Config::from_file(path),
            None => Ok(Config::default()),
        }
    }

    /// Applies the command-line overrides to a profile.
    pub fn to_profile(&self, mut profile: ConnectionProfile) -> ConnectionProfile {
        if let Some(ref host) = self.host {
            profile.host = host.clone();
        }
        if let Some(port) = self.port {
            profile.port = port;
        }
        if let Some(ref id) = self.client_id {
            profile.client_id = id.clone();
        }
        if self.username.is_some() || self.password.is_some() {
            let mut credentials = profile.credentials.take().unwrap_or_default();
            if let Some(ref user) = self.username {
                credentials.username = user.clone();
            }
            if let Some(ref pass) = self.password {
                credentials.password = pass.clone();
            }
            profile.credentials = Some(credentials);
        }
        if let Some(keep_alive) = self.keep_alive {
            profile.keep_alive_interval = keep_alive;
        }
        if let Some(timeout) = self.timeout {
            profile.communication_timeout = timeout;
        }
        if let Some(tls) = self.tls {
            profile.tls = tls;
        }
        if let Some(ref cafile) = self.cafile {
            profile.ca_path = Some(cafile.clone());
        }
        if let Some(ref path) = self.ws {
            profile.transport = TransportKind::WebSocket;
            profile.websocket_path = path.clone();
        }
        profile
    }
}

fn parse_tls_version(value: &str) -> Result<TlsVersion, String> {
    match value {
        "1.2" | "tlsv1.2" => Ok(TlsVersion::Tls12),
        "1.3" | "tlsv1.3" => Ok(TlsVersion::Tls13),
        "none" => Ok(TlsVersion::None),
        other => Err(format!("unsupported TLS version '{}', expected 1.2 or 1.3", other)),
    }
}

/// Parses `name=value` into a user property.
pub fn parse_user_property(value: &str) -> Result<UserProperty, String> {
    match value.split_once('=') {
        Some((name, value)) => Ok(UserProperty::new(name, value)),
        None => Err(format!("expected NAME=VALUE, got '{}'", value)),
    }
}

pub fn parse_retain_handling(value: &str) -> Result<RetainHandling, String> {
    match value {
        "0" | "send" => Ok(RetainHandling::SendAtSubscribe),
        "1" | "new" => Ok(RetainHandling::SendAtSubscribeIfNew),
        "2" | "never" => Ok(RetainHandling::DoNotSend),
        other => Err(format!("invalid retain handling '{}', expected 0, 1 or 2", other)),
    }
}

/// Initialize tracing/logging from the verbosity flag and the configured level.
pub fn init_logging(verbose: bool, level: &str) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Forwards the session's log channel into tracing.
pub fn forward_log(log: &LogMessage) {
    match log.level {
        LogLevel::Verbose => debug!(source = log.source, "{}", log.message),
        LogLevel::Info => info!(source = log.source, "{}", log.message),
        LogLevel::Warning => warn!(source = log.source, "{}", log.message),
        LogLevel::Error => error!(source = log.source, "{}", log.message),
    }
}

#[cfg(test)]
mod tests {
    use multimeter_core::Credentials;

    use super::*;

    #[test]
    fn arguments_override_the_file_profile() {
        let mut file_profile = ConnectionProfile::new("broker.lab", 8883);
        file_profile.client_id = "from-file".to_string();
        file_profile.credentials = Some(Credentials {
            username: "meter".to_string(),
            password: "old".to_string(),
        });

        let args = ConnectionArgs {
            port: Some(1884),
            password: Some("new".to_string()),
            ws: Some("/ws".to_string()),
            ..Default::default()
        };
        let profile = args.to_profile(file_profile);

        assert_eq!(profile.host, "broker.lab");
        assert_eq!(profile.port, 1884);
        assert_eq!(profile.client_id, "from-file");
        let credentials = profile.credentials.unwrap();
        assert_eq!(credentials.username, "meter");
        assert_eq!(credentials.password, "new");
        assert_eq!(profile.transport, TransportKind::WebSocket);
        assert_eq!(profile.websocket_path, "/ws");
    }

    #[test]
    fn no_arguments_keep_the_profile() {
        let profile = ConnectionArgs::default().to_profile(ConnectionProfile::default());
        assert_eq!(profile, ConnectionProfile::default());
    }

    #[test]
    fn user_property_splits_on_first_equals() {
        assert_eq!(
            parse_user_property("filter=a=b").unwrap(),
            UserProperty::new("filter", "a=b")
        );
        assert!(parse_user_property("novalue").is_err());
    }

    #[test]
    fn tls_and_retain_handling_values() {
        assert_eq!(parse_tls_version("1.3").unwrap(), TlsVersion::Tls13);
        assert!(parse_tls_version("1.0").is_err());
        assert_eq!(
            parse_retain_handling("2").unwrap(),
            RetainHandling::DoNotSend
        );
        assert!(parse_retain_handling("3").is_err());
    }
}
