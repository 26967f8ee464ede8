//! Transport backed by the `rumqttc` MQTT v5 client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use multimeter_core::{QoS, ReasonCode, RetainHandling, TransportKind};
use rumqttc::v5::mqttbytes::v5::{
    ConnAck, ConnectProperties, ConnectReturnCode, Filter, Packet, PubAckReason, PubCompReason,
    PubRecReason, Publish, PublishProperties, RetainForwardRule, SubscribeProperties,
    SubscribeReasonCode, UnsubAckReason, UnsubscribeProperties,
};
use rumqttc::v5::mqttbytes::QoS as WireQoS;
use rumqttc::v5::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions};
use rumqttc::{Outgoing, TlsConfiguration, Transport};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::TransportError;
use crate::events::{
    DisconnectEvent, DisconnectReason, InspectedPacket, LogLevel, PacketDirection, PacketKind,
};
use crate::options::{ConnectOptions, PublishOptions, SubscribeOptions, UnsubscribeOptions};
use crate::sink::EventSink;
use crate::tls::build_client_config;
use crate::tracker::Correlator;
use crate::transport::{
    ConnectOutcome, Delivery, PublishOutcome, SubscribeOutcome, TopicOutcome, TransportClient,
    TransportFactory, UnsubscribeOutcome,
};

const LOG_SOURCE: &str = "rumqttc";

/// How long a graceful disconnect may take before the event loop is aborted.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates [`RumqttClient`]s.
#[derive(Debug, Clone)]
pub struct RumqttTransport {
    /// Capacity of the request channel between client and event loop.
    pub request_capacity: usize,
    /// Received messages that may wait for the message observers. Once full,
    /// the event loop stops reading from the broker until observers catch up.
    pub delivery_capacity: usize,
}

impl Default for RumqttTransport {
    fn default() -> Self {
        Self {
            request_capacity: 64,
            delivery_capacity: 8,
        }
    }
}

impl TransportFactory for RumqttTransport {
    fn create(&self, events: EventSink) -> Box<dyn TransportClient> {
        Box::new(RumqttClient::new(
            events,
            self.request_capacity,
            self.delivery_capacity,
        ))
    }
}

/// Requests waiting for the broker, per packet kind.
#[derive(Default)]
struct Pending {
    publishes: Correlator<PublishOutcome>,
    /// PUBREC reasons of QoS 2 publishes still waiting for PUBCOMP.
    received: HashMap<u16, ReasonCode>,
    subscribes: Correlator<(u16, Vec<ReasonCode>)>,
    unsubscribes: Correlator<(u16, Vec<ReasonCode>)>,
}

impl Pending {
    fn fail_all(&mut self, error: TransportError) {
        self.publishes.fail_all(error.clone());
        self.subscribes.fail_all(error.clone());
        self.unsubscribes.fail_all(error);
        self.received.clear();
    }
}

/// State shared by a client and its event loop task.
struct Session {
    events: EventSink,
    pending: StdMutex<Pending>,
    connected: AtomicBool,
    closing: AtomicBool,
    finished: AtomicBool,
}

/// What the event loop does after a packet from the broker.
#[derive(Debug)]
enum Received {
    Handled,
    Deliver(Publish),
    Closed(DisconnectEvent),
}

impl Session {
    fn new(events: EventSink) -> Self {
        Self {
            events,
            pending: StdMutex::new(Pending::default()),
            connected: AtomicBool::new(false),
            closing: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn inspect(
        &self,
        direction: PacketDirection,
        kind: PacketKind,
        packet_id: Option<u16>,
        detail: String,
    ) {
        let verb = match direction {
            PacketDirection::Inbound => "Received",
            PacketDirection::Outbound => "Sent",
        };
        self.events
            .log(LogLevel::Verbose, LOG_SOURCE, format!("{} {:?}", verb, kind));
        self.events.inspect(InspectedPacket {
            direction,
            kind,
            packet_id,
            detail,
        });
    }

    fn inspect_incoming(&self, packet: &Packet) {
        self.inspect(
            PacketDirection::Inbound,
            packet_kind(packet),
            incoming_packet_id(packet),
            format!("{:?}", packet),
        );
    }

    /// Handles one packet from the broker.
    fn incoming(&self, packet: Packet) -> Received {
        self.inspect_incoming(&packet);

        match packet {
            Packet::Publish(publish) => {
                debug!(
                    "Received PUBLISH on topic: {}",
                    String::from_utf8_lossy(&publish.topic)
                );
                return Received::Deliver(publish);
            }
            Packet::PubAck(ack) => {
                debug!("Received PUBACK for packet_id: {}", ack.pkid);
                self.pending().publishes.resolve(
                    ack.pkid,
                    PublishOutcome {
                        packet_id: Some(ack.pkid),
                        reason_code: puback_reason(&ack.reason),
                    },
                );
            }
            Packet::PubRec(rec) => {
                debug!("Received PUBREC for packet_id: {}", rec.pkid);
                let reason_code = pubrec_reason(&rec.reason);
                let mut pending = self.pending();
                if reason_code.is_failure() {
                    pending.publishes.resolve(
                        rec.pkid,
                        PublishOutcome {
                            packet_id: Some(rec.pkid),
                            reason_code,
                        },
                    );
                } else if pending.publishes.contains(rec.pkid) {
                    pending.received.insert(rec.pkid, reason_code);
                }
            }
            Packet::PubComp(comp) => {
                debug!("Received PUBCOMP for packet_id: {}", comp.pkid);
                let completed = pubcomp_reason(&comp.reason);
                let mut pending = self.pending();
                let received = pending.received.remove(&comp.pkid);
                let reason_code = match received {
                    Some(received) if !completed.is_failure() => received,
                    _ => completed,
                };
                pending.publishes.resolve(
                    comp.pkid,
                    PublishOutcome {
                        packet_id: Some(comp.pkid),
                        reason_code,
                    },
                );
            }
            Packet::SubAck(ack) => {
                debug!("Received SUBACK for packet_id: {}", ack.pkid);
                let codes = ack.return_codes.iter().map(suback_reason).collect();
                self.pending().subscribes.resolve(ack.pkid, (ack.pkid, codes));
            }
            Packet::UnsubAck(ack) => {
                debug!("Received UNSUBACK for packet_id: {}", ack.pkid);
                let codes = ack.reasons.iter().map(unsuback_reason).collect();
                self.pending()
                    .unsubscribes
                    .resolve(ack.pkid, (ack.pkid, codes));
            }
            Packet::Disconnect(disconnect) => {
                info!("Received DISCONNECT from server");
                return Received::Closed(DisconnectEvent {
                    reason: DisconnectReason::ServerInitiated,
                    reason_code: Some(ReasonCode::from_disconnect_code(
                        disconnect.reason_code as u8,
                    )),
                    reason_string: disconnect.properties.and_then(|p| p.reason_string),
                    client_was_connected: true,
                });
            }
            _ => {}
        }

        Received::Handled
    }

    /// Inspects a sent packet. rumqttc also reports waits for acks here,
    /// those are not packets and are skipped.
    fn inspect_outgoing(&self, outgoing: &Outgoing) {
        if let Some((kind, packet_id)) = outgoing_packet(outgoing) {
            self.inspect(
                PacketDirection::Outbound,
                kind,
                packet_id,
                format!("{:?}", outgoing),
            );
        }
    }

    /// Handles one packet the library sent. Returns true once DISCONNECT
    /// went out.
    fn outgoing(&self, outgoing: Outgoing) -> bool {
        self.inspect_outgoing(&outgoing);

        match outgoing {
            // QoS 0 publishes go out with identifier 0 and are never acknowledged.
            Outgoing::Publish(0) => {
                self.pending().publishes.complete_next(PublishOutcome {
                    packet_id: None,
                    reason_code: ReasonCode::Success,
                });
            }
            Outgoing::Publish(pkid) => {
                self.pending().publishes.assign(pkid);
            }
            Outgoing::Subscribe(pkid) => {
                self.pending().subscribes.assign(pkid);
            }
            Outgoing::Unsubscribe(pkid) => {
                self.pending().unsubscribes.assign(pkid);
            }
            Outgoing::Disconnect => return true,
            _ => {}
        }

        false
    }

    /// Marks the session closed and reports it, exactly once.
    fn finish(&self, event: DisconnectEvent) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        self.pending().fail_all(TransportError::Closed);
        self.events.log(
            LogLevel::Info,
            LOG_SOURCE,
            format!("Disconnected ({:?})", event.reason),
        );
        self.events.disconnected(event);
    }
}

struct Running {
    client: AsyncClient,
    task: JoinHandle<()>,
    delivery: JoinHandle<()>,
    acks: JoinHandle<()>,
}

impl Running {
    fn abort(&self) {
        self.task.abort();
        self.delivery.abort();
        self.acks.abort();
    }
}

/// A single rumqttc connection.
///
/// Dropping the client aborts its tasks, which closes the connection
/// without a DISCONNECT packet.
pub struct RumqttClient {
    request_capacity: usize,
    delivery_capacity: usize,
    session: Arc<Session>,
    running: StdMutex<Option<Running>>,
    submit: Mutex<()>,
}

impl RumqttClient {
    pub fn new(events: EventSink, request_capacity: usize, delivery_capacity: usize) -> Self {
        Self {
            request_capacity,
            delivery_capacity: delivery_capacity.max(1),
            session: Arc::new(Session::new(events)),
            running: StdMutex::new(None),
            submit: Mutex::new(()),
        }
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn client(&self) -> Result<AsyncClient, TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Closed);
        }
        self.running()
            .as_ref()
            .map(|running| running.client.clone())
            .ok_or(TransportError::Closed)
    }
}

impl Drop for RumqttClient {
    fn drop(&mut self) {
        let running = self
            .running
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(running) = running {
            debug!("Client dropped while connected, aborting its tasks");
            running.abort();
        }
    }
}

#[async_trait]
impl TransportClient for RumqttClient {
    async fn connect(&self, options: &ConnectOptions) -> Result<ConnectOutcome, TransportError> {
        if self.running().is_some() {
            return Err(TransportError::Client("client is already connected".to_string()));
        }

        let mqtt_options = build_mqtt_options(options)?;
        let (client, mut eventloop) = AsyncClient::new(mqtt_options, self.request_capacity);

        let session = &self.session;
        session.inspect(
            PacketDirection::Outbound,
            PacketKind::Connect,
            None,
            format!(
                "Connect {{ client_id: {:?}, clean_start: {}, keep_alive: {:?} }}",
                options.client_id, options.clean_start, options.keep_alive
            ),
        );
        session.events.log(
            LogLevel::Info,
            LOG_SOURCE,
            format!("Connecting to {}", options.address()),
        );

        let connack = match timeout(
            options.communication_timeout,
            wait_for_connack(&mut eventloop, session),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                session
                    .events
                    .log(LogLevel::Error, LOG_SOURCE, "Timed out waiting for CONNACK");
                return Err(TransportError::Timeout);
            }
        };

        let reason_code = connect_reason(connack.code);
        if reason_code.is_failure() {
            return Err(TransportError::ConnectionRefused(reason_code));
        }

        let properties = connack.properties.as_ref();
        let outcome = ConnectOutcome {
            reason_code,
            session_present: connack.session_present,
            assigned_client_identifier: properties
                .and_then(|p| p.assigned_client_identifier.clone()),
            reason_string: properties.and_then(|p| p.reason_string.clone()),
            server_keep_alive: properties.and_then(|p| p.server_keep_alive),
            response_information: properties.and_then(|p| p.response_information.clone()),
        };

        session.connected.store(true, Ordering::SeqCst);

        let (delivery_tx, delivery_rx) = mpsc::channel(self.delivery_capacity);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();
        let acks = tokio::spawn(send_acks(ack_rx, client.clone()));
        let delivery = tokio::spawn(deliver_messages(
            delivery_rx,
            ack_tx,
            session.events.clone(),
        ));
        let task = tokio::spawn(run_event_loop(eventloop, Arc::clone(session), delivery_tx));

        *self.running() = Some(Running {
            client,
            task,
            delivery,
            acks,
        });
        Ok(outcome)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let Some(running) = self.running().take() else {
            return Err(TransportError::Closed);
        };
        // Delivery and ack tasks end on their own once the event loop has
        // dropped its side of the delivery channel.
        let Running {
            client, mut task, ..
        } = running;

        self.session.closing.store(true, Ordering::SeqCst);
        let requested = client
            .disconnect()
            .await
            .map_err(|e| TransportError::Client(e.to_string()));
        if let Err(e) = &requested {
            warn!("Failed to request disconnect: {}", e);
            task.abort();
        }

        if timeout(DISCONNECT_TIMEOUT, &mut task).await.is_err() {
            warn!("Event loop did not stop after DISCONNECT, aborting it");
            task.abort();
        }

        // Covers the aborted paths, a no-op if the loop already reported.
        self.session.finish(DisconnectEvent::client_initiated());
        requested
    }

    async fn publish(&self, options: PublishOptions) -> Result<PublishOutcome, TransportError> {
        let client = self.client()?;
        let properties = PublishProperties {
            payload_format_indicator: options.payload_format_indicator,
            message_expiry_interval: options.message_expiry_interval,
            topic_alias: options.topic_alias,
            response_topic: options.response_topic,
            correlation_data: options.correlation_data,
            user_properties: options.user_properties,
            subscription_identifiers: options
                .subscription_identifier
                .into_iter()
                .map(|id| id as usize)
                .collect(),
            content_type: options.content_type,
        };

        let reply = {
            let _submit = self.submit.lock().await;
            let reply = self.session.pending().publishes.enqueue();
            if let Err(e) = client
                .publish_with_properties(
                    options.topic,
                    wire_qos(options.qos),
                    options.retain,
                    options.payload,
                    properties,
                )
                .await
            {
                self.session.pending().publishes.withdraw_last();
                return Err(TransportError::Client(e.to_string()));
            }
            reply
        };

        reply.await.map_err(|_| TransportError::Closed)?
    }

    async fn subscribe(
        &self,
        options: SubscribeOptions,
    ) -> Result<SubscribeOutcome, TransportError> {
        let client = self.client()?;
        let topic = options.filter.topic.clone();
        let filter = Filter {
            path: options.filter.topic,
            qos: wire_qos(options.filter.qos),
            nolocal: options.filter.no_local,
            preserve_retain: options.filter.retain_as_published,
            retain_forward_rule: retain_forward_rule(options.filter.retain_handling),
        };
        let properties = SubscribeProperties {
            id: None,
            user_properties: options.user_properties,
        };

        let reply = {
            let _submit = self.submit.lock().await;
            let reply = self.session.pending().subscribes.enqueue();
            if let Err(e) = client
                .subscribe_many_with_properties(vec![filter], properties)
                .await
            {
                self.session.pending().subscribes.withdraw_last();
                return Err(TransportError::Client(e.to_string()));
            }
            reply
        };

        let (packet_id, codes) = reply.await.map_err(|_| TransportError::Closed)??;
        Ok(SubscribeOutcome {
            packet_id,
            items: topic_outcomes(&topic, codes),
        })
    }

    async fn unsubscribe(
        &self,
        options: UnsubscribeOptions,
    ) -> Result<UnsubscribeOutcome, TransportError> {
        let client = self.client()?;
        let properties = UnsubscribeProperties {
            user_properties: options.user_properties,
        };

        let reply = {
            let _submit = self.submit.lock().await;
            let reply = self.session.pending().unsubscribes.enqueue();
            if let Err(e) = client
                .unsubscribe_with_properties(options.topic.clone(), properties)
                .await
            {
                self.session.pending().unsubscribes.withdraw_last();
                return Err(TransportError::Client(e.to_string()));
            }
            reply
        };

        let (packet_id, codes) = reply.await.map_err(|_| TransportError::Closed)??;
        Ok(UnsubscribeOutcome {
            packet_id,
            items: topic_outcomes(&options.topic, codes),
        })
    }

    fn is_connected(&self) -> bool {
        self.session.connected.load(Ordering::SeqCst)
    }
}

/// Translate connect options into rumqttc's.
fn build_mqtt_options(options: &ConnectOptions) -> Result<MqttOptions, TransportError> {
    // rumqttc panics on these
    if options.client_id.is_empty() || options.client_id.starts_with(' ') {
        return Err(TransportError::Client(format!(
            "Invalid client id: {:?}",
            options.client_id
        )));
    }

    let broker = match options.transport {
        TransportKind::Tcp => options.host.clone(),
        TransportKind::WebSocket => options.address(),
    };

    let mut mqtt_options = MqttOptions::new(options.client_id.clone(), broker, options.port);
    mqtt_options
        .set_keep_alive(options.keep_alive)
        .set_clean_start(options.clean_start)
        .set_manual_acks(true)
        // The CONNACK wait in `connect` enforces the communication timeout.
        .set_connection_timeout(options.communication_timeout.as_secs() + 1);

    if let (Some(username), Some(password)) = (&options.username, &options.password) {
        mqtt_options.set_credentials(username.clone(), password.clone());
    }

    mqtt_options.set_connect_properties(ConnectProperties {
        session_expiry_interval: options.session_expiry_interval,
        receive_maximum: None,
        max_packet_size: None,
        topic_alias_max: None,
        request_response_info: Some(u8::from(options.request_response_information)),
        request_problem_info: Some(u8::from(options.request_problem_information)),
        user_properties: options.user_properties.clone(),
        authentication_method: options.authentication_method.clone(),
        authentication_data: options.authentication_data.clone(),
    });

    let transport = match (options.transport, options.tls.is_enabled()) {
        (TransportKind::Tcp, false) => Transport::Tcp,
        (TransportKind::Tcp, true) => Transport::Tls(TlsConfiguration::Rustls(
            build_client_config(&options.tls)?,
        )),
        (TransportKind::WebSocket, false) => Transport::Ws,
        (TransportKind::WebSocket, true) => Transport::Wss(TlsConfiguration::Rustls(
            build_client_config(&options.tls)?,
        )),
    };
    mqtt_options.set_transport(transport);

    Ok(mqtt_options)
}

/// Polls the event loop until the broker answers CONNECT.
async fn wait_for_connack(
    eventloop: &mut EventLoop,
    session: &Session,
) -> Result<ConnAck, TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                session.inspect(
                    PacketDirection::Inbound,
                    PacketKind::ConnAck,
                    None,
                    format!("{:?}", connack),
                );
                return Ok(connack);
            }
            Ok(Event::Incoming(packet)) => session.inspect_incoming(&packet),
            Ok(Event::Outgoing(outgoing)) => session.inspect_outgoing(&outgoing),
            Err(ConnectionError::ConnectionRefused(code)) => {
                let reason_code = connect_reason(code);
                session.events.log(
                    LogLevel::Error,
                    LOG_SOURCE,
                    format!("Connection refused: {}", reason_code),
                );
                return Err(TransportError::ConnectionRefused(reason_code));
            }
            Err(e) => {
                session
                    .events
                    .log(LogLevel::Error, LOG_SOURCE, format!("Connection failed: {}", e));
                return Err(TransportError::ConnectionFailed(e.to_string()));
            }
        }
    }
}

/// Drives the connection until it ends, then reports how it ended.
///
/// Waits for room in the delivery channel before polling again, so slow
/// message observers hold back reads from the broker.
async fn run_event_loop(
    mut eventloop: EventLoop,
    session: Arc<Session>,
    deliveries: mpsc::Sender<Publish>,
) {
    let event = loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(packet)) => match session.incoming(packet) {
                Received::Handled => {}
                Received::Deliver(publish) => {
                    if deliveries.send(publish).await.is_err() {
                        warn!("Message delivery task has stopped");
                    }
                }
                Received::Closed(event) => break event,
            },
            Ok(Event::Outgoing(outgoing)) => {
                if session.outgoing(outgoing) {
                    info!("Sent DISCONNECT, closing connection");
                    break DisconnectEvent::client_initiated();
                }
            }
            Err(e) if session.closing.load(Ordering::SeqCst) => {
                debug!("Connection closed during disconnect: {}", e);
                break DisconnectEvent::client_initiated();
            }
            Err(e) => {
                error!("Connection lost: {}", e);
                session
                    .events
                    .log(LogLevel::Error, LOG_SOURCE, format!("Connection lost: {}", e));
                break DisconnectEvent {
                    reason: DisconnectReason::ConnectionLost,
                    reason_code: None,
                    reason_string: Some(e.to_string()),
                    client_was_connected: true,
                };
            }
        }
    };

    session.finish(event);
}

/// Hands received publishes to the observers one at a time and queues
/// each for acknowledgement only after every observer is done with it.
async fn deliver_messages(
    mut deliveries: mpsc::Receiver<Publish>,
    acks: mpsc::UnboundedSender<Publish>,
    events: EventSink,
) {
    while let Some(publish) = deliveries.recv().await {
        events.deliver(to_delivery(&publish)).await;
        // QoS 0 messages are never acknowledged.
        if publish.qos != WireQoS::AtMostOnce && acks.send(publish).is_err() {
            debug!("Acknowledgement task has stopped");
        }
    }
}

/// Sends acknowledgements in delivery order. Runs apart from the delivery
/// task so a full request channel never stalls the observers.
async fn send_acks(mut acks: mpsc::UnboundedReceiver<Publish>, client: AsyncClient) {
    while let Some(publish) = acks.recv().await {
        if let Err(e) = client.ack(&publish).await {
            debug!("Could not acknowledge packet_id {}: {}", publish.pkid, e);
        }
    }
}

fn to_delivery(publish: &Publish) -> Delivery {
    let properties = publish.properties.clone().unwrap_or_default();
    Delivery {
        topic: String::from_utf8_lossy(&publish.topic).into_owned(),
        payload: publish.payload.clone(),
        qos: domain_qos(publish.qos),
        retain: publish.retain,
        payload_format_indicator: properties.payload_format_indicator,
        content_type: properties.content_type,
        response_topic: properties.response_topic,
        correlation_data: properties.correlation_data,
        message_expiry_interval: properties.message_expiry_interval,
        subscription_identifiers: properties
            .subscription_identifiers
            .into_iter()
            .filter_map(|id| u32::try_from(id).ok())
            .collect(),
        user_properties: properties.user_properties,
    }
}

fn topic_outcomes(topic: &str, codes: Vec<ReasonCode>) -> Vec<TopicOutcome> {
    codes
        .into_iter()
        .map(|reason_code| TopicOutcome {
            topic: topic.to_string(),
            reason_code,
        })
        .collect()
}

fn incoming_packet_id(packet: &Packet) -> Option<u16> {
    let pkid = match packet {
        Packet::Publish(p) => p.pkid,
        Packet::PubAck(p) => p.pkid,
        Packet::PubRec(p) => p.pkid,
        Packet::PubRel(p) => p.pkid,
        Packet::PubComp(p) => p.pkid,
        Packet::SubAck(p) => p.pkid,
        Packet::UnsubAck(p) => p.pkid,
        _ => 0,
    };
    (pkid > 0).then_some(pkid)
}

fn packet_kind(packet: &Packet) -> PacketKind {
    match packet {
        Packet::Connect(..) => PacketKind::Connect,
        Packet::ConnAck(_) => PacketKind::ConnAck,
        Packet::Publish(_) => PacketKind::Publish,
        Packet::PubAck(_) => PacketKind::PubAck,
        Packet::PubRec(_) => PacketKind::PubRec,
        Packet::PubRel(_) => PacketKind::PubRel,
        Packet::PubComp(_) => PacketKind::PubComp,
        Packet::Subscribe(_) => PacketKind::Subscribe,
        Packet::SubAck(_) => PacketKind::SubAck,
        Packet::Unsubscribe(_) => PacketKind::Unsubscribe,
        Packet::UnsubAck(_) => PacketKind::UnsubAck,
        Packet::PingReq(_) => PacketKind::PingReq,
        Packet::PingResp(_) => PacketKind::PingResp,
        Packet::Disconnect(_) => PacketKind::Disconnect,
    }
}

/// Kind and packet id of a sent packet, `None` for events that are not packets.
fn outgoing_packet(outgoing: &Outgoing) -> Option<(PacketKind, Option<u16>)> {
    let (kind, pkid) = match outgoing {
        Outgoing::Publish(pkid) => (PacketKind::Publish, *pkid),
        Outgoing::Subscribe(pkid) => (PacketKind::Subscribe, *pkid),
        Outgoing::Unsubscribe(pkid) => (PacketKind::Unsubscribe, *pkid),
        Outgoing::PubAck(pkid) => (PacketKind::PubAck, *pkid),
        Outgoing::PubRec(pkid) => (PacketKind::PubRec, *pkid),
        Outgoing::PubRel(pkid) => (PacketKind::PubRel, *pkid),
        Outgoing::PubComp(pkid) => (PacketKind::PubComp, *pkid),
        Outgoing::PingReq => (PacketKind::PingReq, 0),
        Outgoing::PingResp => (PacketKind::PingResp, 0),
        Outgoing::Disconnect => (PacketKind::Disconnect, 0),
        Outgoing::AwaitAck(_) => return None,
    };
    Some((kind, (pkid > 0).then_some(pkid)))
}

fn connect_reason(code: ConnectReturnCode) -> ReasonCode {
    use ConnectReturnCode as C;
    match code {
        C::Success => ReasonCode::Success,
        C::RefusedProtocolVersion | C::UnsupportedProtocolVersion => {
            ReasonCode::UnsupportedProtocolVersion
        }
        C::BadClientId | C::ClientIdentifierNotValid => ReasonCode::ClientIdentifierNotValid,
        C::ServiceUnavailable | C::ServerUnavailable => ReasonCode::ServerUnavailable,
        C::UnspecifiedError => ReasonCode::UnspecifiedError,
        C::MalformedPacket => ReasonCode::MalformedPacket,
        C::ProtocolError => ReasonCode::ProtocolError,
        C::ImplementationSpecificError => ReasonCode::ImplementationSpecificError,
        C::BadUserNamePassword => ReasonCode::BadUserNameOrPassword,
        C::NotAuthorized => ReasonCode::NotAuthorized,
        C::ServerBusy => ReasonCode::ServerBusy,
        C::Banned => ReasonCode::Banned,
        C::BadAuthenticationMethod => ReasonCode::BadAuthenticationMethod,
        C::TopicNameInvalid => ReasonCode::TopicNameInvalid,
        C::PacketTooLarge => ReasonCode::PacketTooLarge,
        C::QuotaExceeded => ReasonCode::QuotaExceeded,
        C::PayloadFormatInvalid => ReasonCode::PayloadFormatInvalid,
        C::RetainNotSupported => ReasonCode::RetainNotSupported,
        C::QoSNotSupported => ReasonCode::QoSNotSupported,
        C::UseAnotherServer => ReasonCode::UseAnotherServer,
        C::ServerMoved => ReasonCode::ServerMoved,
        C::ConnectionRateExceeded => ReasonCode::ConnectionRateExceeded,
    }
}

fn puback_reason(reason: &PubAckReason) -> ReasonCode {
    match reason {
        PubAckReason::Success => ReasonCode::Success,
        PubAckReason::NoMatchingSubscribers => ReasonCode::NoMatchingSubscribers,
        PubAckReason::UnspecifiedError => ReasonCode::UnspecifiedError,
        PubAckReason::ImplementationSpecificError => ReasonCode::ImplementationSpecificError,
        PubAckReason::NotAuthorized => ReasonCode::NotAuthorized,
        PubAckReason::TopicNameInvalid => ReasonCode::TopicNameInvalid,
        PubAckReason::PacketIdentifierInUse => ReasonCode::PacketIdentifierInUse,
        PubAckReason::QuotaExceeded => ReasonCode::QuotaExceeded,
        PubAckReason::PayloadFormatInvalid => ReasonCode::PayloadFormatInvalid,
    }
}

fn pubrec_reason(reason: &PubRecReason) -> ReasonCode {
    match reason {
        PubRecReason::Success => ReasonCode::Success,
        PubRecReason::NoMatchingSubscribers => ReasonCode::NoMatchingSubscribers,
        PubRecReason::UnspecifiedError => ReasonCode::UnspecifiedError,
        PubRecReason::ImplementationSpecificError => ReasonCode::ImplementationSpecificError,
        PubRecReason::NotAuthorized => ReasonCode::NotAuthorized,
        PubRecReason::TopicNameInvalid => ReasonCode::TopicNameInvalid,
        PubRecReason::PacketIdentifierInUse => ReasonCode::PacketIdentifierInUse,
        PubRecReason::QuotaExceeded => ReasonCode::QuotaExceeded,
        PubRecReason::PayloadFormatInvalid => ReasonCode::PayloadFormatInvalid,
    }
}

fn pubcomp_reason(reason: &PubCompReason) -> ReasonCode {
    match reason {
        PubCompReason::Success => ReasonCode::Success,
        PubCompReason::PacketIdentifierNotFound => ReasonCode::PacketIdentifierNotFound,
    }
}

fn suback_reason(reason: &SubscribeReasonCode) -> ReasonCode {
    use SubscribeReasonCode as S;
    match *reason {
        S::Success(qos) => ReasonCode::granted(domain_qos(qos)),
        S::Failure | S::Unspecified => ReasonCode::UnspecifiedError,
        S::ImplementationSpecific => ReasonCode::ImplementationSpecificError,
        S::NotAuthorized => ReasonCode::NotAuthorized,
        S::TopicFilterInvalid => ReasonCode::TopicFilterInvalid,
        S::PkidInUse => ReasonCode::PacketIdentifierInUse,
        S::QuotaExceeded => ReasonCode::QuotaExceeded,
        S::SharedSubscriptionsNotSupported => ReasonCode::SharedSubscriptionsNotSupported,
        S::SubscriptionIdNotSupported => ReasonCode::SubscriptionIdentifiersNotSupported,
        S::WildcardSubscriptionsNotSupported => ReasonCode::WildcardSubscriptionsNotSupported,
    }
}

fn unsuback_reason(reason: &UnsubAckReason) -> ReasonCode {
    match reason {
        UnsubAckReason::Success => ReasonCode::Success,
        UnsubAckReason::NoSubscriptionExisted => ReasonCode::NoSubscriptionExisted,
        UnsubAckReason::UnspecifiedError => ReasonCode::UnspecifiedError,
        UnsubAckReason::ImplementationSpecificError => ReasonCode::ImplementationSpecificError,
        UnsubAckReason::NotAuthorized => ReasonCode::NotAuthorized,
        UnsubAckReason::TopicFilterInvalid => ReasonCode::TopicFilterInvalid,
        UnsubAckReason::PacketIdentifierInUse => ReasonCode::PacketIdentifierInUse,
    }
}

fn wire_qos(qos: QoS) -> WireQoS {
    match qos {
        QoS::AtMostOnce => WireQoS::AtMostOnce,
        QoS::AtLeastOnce => WireQoS::AtLeastOnce,
        QoS::ExactlyOnce => WireQoS::ExactlyOnce,
    }
}

fn domain_qos(qos: WireQoS) -> QoS {
    match qos {
        WireQoS::AtMostOnce => QoS::AtMostOnce,
        WireQoS::AtLeastOnce => QoS::AtLeastOnce,
        WireQoS::ExactlyOnce => QoS::ExactlyOnce,
    }
}

fn retain_forward_rule(handling: RetainHandling) -> RetainForwardRule {
    match handling {
        RetainHandling::SendAtSubscribe => RetainForwardRule::OnEverySubscribe,
        RetainHandling::SendAtSubscribeIfNew => RetainForwardRule::OnNewSubscribe,
        RetainHandling::DoNotSend => RetainForwardRule::Never,
    }
}
