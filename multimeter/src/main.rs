//! Multimeter - MQTT command-line client

use std::io::{self, Read};

use bytes::Bytes;
use clap::{Parser, Subcommand};
use multimeter_core::{
    InboundMessage, PayloadFormat, PublishRequest, QoS, RetainHandling, SubscribeRequest,
    UserProperty,
};
use multimeter_session::{
    ConnectionSessionManager, DisconnectEvent, InspectedPacket, PacketDirection, RumqttTransport,
};
use tokio::{signal, sync::mpsc};
use tracing::{debug, info};

mod common;
mod config;
use common::{forward_log, init_logging, parse_retain_handling, parse_user_property, ConnectionArgs};

#[derive(Parser, Debug)]
#[command(name = "multimeter")]
#[command(about = "MQTT command-line client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish a message to a topic
    Pub {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Topic to publish to
        #[arg(short = 't', long)]
        topic: String,

        /// Message payload (reads from stdin if not provided)
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// QoS level (0, 1, or 2)
        #[arg(short = 'q', long, default_value = "0")]
        qos: u8,

        /// Retain the message on the broker
        #[arg(short = 'r', long)]
        retain: bool,

        /// Mark the payload as UTF-8 text
        #[arg(long)]
        utf8: bool,

        /// Content type property
        #[arg(long)]
        content_type: Option<String>,

        /// Response topic property
        #[arg(long)]
        response_topic: Option<String>,

        /// Correlation data property
        #[arg(long)]
        correlation_data: Option<String>,

        /// Message expiry interval in seconds
        #[arg(short = 'e', long, default_value = "0")]
        expiry: u32,

        /// Topic alias to send with the message
        #[arg(long, default_value = "0")]
        topic_alias: u16,

        /// User property as NAME=VALUE (can be specified multiple times)
        #[arg(short = 'U', long = "user-property", value_parser = parse_user_property)]
        user_properties: Vec<UserProperty>,
    },
    /// Subscribe to topics and print messages
    Sub {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Topic filter(s) to subscribe to (can be specified multiple times)
        #[arg(short = 't', long, required = true)]
        topic: Vec<String>,

        /// QoS level for subscriptions (0, 1, or 2)
        #[arg(short = 'q', long, default_value = "0")]
        qos: u8,

        /// Do not receive messages published by this client
        #[arg(long)]
        no_local: bool,

        /// Keep the retain flag the publisher set
        #[arg(long)]
        retain_as_published: bool,

        /// Retained message handling (0 send, 1 send if new, 2 never)
        #[arg(long, default_value = "0", value_parser = parse_retain_handling)]
        retain_handling: RetainHandling,

        /// Print topic name before each message
        #[arg(short = 'T', long)]
        print_topic: bool,

        /// Exit after receiving this many messages
        #[arg(short = 'C', long)]
        count: Option<u64>,

        /// Print every packet sent and received
        #[arg(long)]
        inspect: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Pub {
            connection,
            topic,
            message,
            qos,
            retain,
            utf8,
            content_type,
            response_topic,
            correlation_data,
            expiry,
            topic_alias,
            user_properties,
        } => {
            let payload = match message {
                Some(msg) => msg,
                None => {
                    // Read from stdin
                    let mut buffer = String::new();
                    io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };

            let request = PublishRequest {
                topic,
                payload,
                payload_format: if utf8 {
                    PayloadFormat::Utf8
                } else {
                    PayloadFormat::Unspecified
                },
                qos: QoS::try_from(qos)?,
                retain,
                message_expiry_interval: expiry,
                content_type,
                response_topic,
                correlation_data: correlation_data.map(Bytes::from),
                topic_alias,
                subscription_identifier: 0,
                user_properties,
            };
            run_publish(connection, request).await?;
        }
        Commands::Sub {
            connection,
            topic,
            qos,
            no_local,
            retain_as_published,
            retain_handling,
            print_topic,
            count,
            inspect,
        } => {
            let qos = QoS::try_from(qos)?;
            let requests = topic
                .into_iter()
                .map(|filter| SubscribeRequest {
                    no_local,
                    retain_as_published,
                    retain_handling,
                    ..SubscribeRequest::new(filter, qos)
                })
                .collect();
            run_subscribe(connection, requests, print_topic, count, inspect).await?;
        }
    }

    Ok(())
}

/// Loads the config, starts logging and connects a new session.
async fn connect(
    connection: &ConnectionArgs,
) -> Result<ConnectionSessionManager<RumqttTransport>, Box<dyn std::error::Error>> {
    let config = connection.load_config()?;
    init_logging(connection.verbose, &config.logging.level);

    let profile = connection.to_profile(config.connection);
    let manager = ConnectionSessionManager::with_rumqtt();
    manager.add_log_observer(forward_log);
    manager.add_state_observer(|state| debug!("Connection state: {}", state));

    let outcome = manager.connect(&profile).await?;
    info!(
        "Connected to {} ({}, session present: {})",
        profile.address(),
        outcome.reason_code,
        outcome.session_present
    );
    if let Some(id) = outcome.assigned_client_identifier {
        info!("Broker assigned client ID {}", id);
    }

    Ok(manager)
}

async fn run_publish(
    connection: ConnectionArgs,
    request: PublishRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = connect(&connection).await?;

    let outcome = manager.publish(&request).await?;
    if outcome.reason_code.is_failure() {
        eprintln!("Publish to {} rejected: {}", request.topic, outcome.reason_code);
    } else {
        debug!(
            "Published to {} (packet_id: {:?}, {})",
            request.topic, outcome.packet_id, outcome.reason_code
        );
    }

    // Disconnect gracefully
    manager.disconnect().await?;

    Ok(())
}

enum Event {
    Message(InboundMessage),
    Disconnected(DisconnectEvent),
}

async fn run_subscribe(
    connection: ConnectionArgs,
    requests: Vec<SubscribeRequest>,
    print_topic: bool,
    count: Option<u64>,
    inspect: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let manager = connect(&connection).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let messages = tx.clone();
    manager.add_message_observer(move |message: InboundMessage| {
        let messages = messages.clone();
        async move {
            let _ = messages.send(Event::Message(message));
        }
    });
    manager.add_disconnect_observer(move |event| {
        let _ = tx.send(Event::Disconnected(event.clone()));
    });
    if inspect {
        manager.add_packet_inspector(print_packet);
    }

    for request in &requests {
        let outcome = manager.subscribe(request).await?;
        for item in &outcome.items {
            if item.reason_code.is_failure() {
                eprintln!("Subscription to {} rejected: {}", item.topic, item.reason_code);
            } else {
                debug!("Subscribed to {} ({})", item.topic, item.reason_code);
            }
        }
    }

    // Handle Ctrl+C for graceful shutdown
    tokio::select! {
        _ = signal::ctrl_c() => {
            eprintln!("\nDisconnecting...");
        }
        _ = async {
            let mut received = 0u64;
            while let Some(event) = rx.recv().await {
                match event {
                    Event::Message(message) => {
                        if print_topic {
                            println!("{}: {}", message.topic, message.payload_text());
                        } else {
                            println!("{}", message.payload_text());
                        }
                        received += 1;
                        if count.is_some_and(|limit| received >= limit) {
                            break;
                        }
                    }
                    Event::Disconnected(event) => {
                        eprintln!("Disconnected: {:?}", event.reason);
                        if let Some(code) = event.reason_code {
                            eprintln!("Reason: {}", code);
                        }
                        break;
                    }
                }
            }
        } => {}
    }

    // Disconnect gracefully
    let _ = manager.disconnect().await;

    Ok(())
}

fn print_packet(packet: &InspectedPacket) {
    let arrow = match packet.direction {
        PacketDirection::Inbound => "<-",
        PacketDirection::Outbound => "->",
    };
    match packet.packet_id {
        Some(id) => eprintln!("{} {:?} (packet_id: {})", arrow, packet.kind, id),
        None => eprintln!("{} {:?}", arrow, packet.kind),
    }
}
