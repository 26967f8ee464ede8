use std::sync::Arc;

use multimeter_core::{
    ConnectionProfile, InboundMessage, PublishRequest, SubscribeRequest, UnsubscribeRequest,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SessionError, TransportError};
use crate::events::{ConnectionState, DisconnectEvent, InspectedPacket, LogMessage};
use crate::observers::{MessageObserver, ObserverId};
use crate::options::{ConnectOptions, PublishOptions, SubscribeOptions, UnsubscribeOptions};
use crate::sink::{EventSink, Shared};
use crate::transport::{
    ConnectOutcome, PublishOutcome, SubscribeOutcome, TransportClient, TransportFactory,
    UnsubscribeOutcome,
};

/// Owns at most one broker connection and fans its events out to observers.
///
/// Connect and disconnect are serialized, so concurrent callers can never
/// end up with two live connections. Publish, subscribe and unsubscribe run
/// concurrently against the current connection.
pub struct ConnectionSessionManager<F> {
    factory: F,
    shared: Arc<Shared>,
    connect_lock: Mutex<()>,
}

impl<F: TransportFactory> ConnectionSessionManager<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            shared: Arc::new(Shared::new()),
            connect_lock: Mutex::new(()),
        }
    }

    /// Connects using `profile`, replacing any existing connection.
    ///
    /// The previous connection is disconnected first and errors while doing
    /// so are ignored. A failed attempt leaves the manager disconnected; it
    /// is not retried.
    pub async fn connect(&self, profile: &ConnectionProfile) -> Result<ConnectOutcome> {
        let options = ConnectOptions::from_profile(profile)?;
        let _guard = self.connect_lock.lock().await;

        self.release_current().await;

        let generation = {
            let mut slot = self.shared.slot();
            slot.generation += 1;
            slot.generation
        };
        self.shared.set_state(ConnectionState::Connecting);

        info!(
            "Connecting to MQTT broker at {} as {}",
            options.address(),
            options.client_id
        );

        let events = EventSink::new(Arc::clone(&self.shared), generation);
        let client: Arc<dyn TransportClient> = Arc::from(self.factory.create(events));

        match client.connect(&options).await {
            Ok(outcome) => {
                let installed = {
                    let mut slot = self.shared.slot();
                    if slot.generation == generation {
                        slot.client = Some(client);
                        slot.state = ConnectionState::Connected;
                        true
                    } else {
                        false
                    }
                };

                if !installed {
                    warn!("Connection closed before the CONNACK could be handled");
                    return Err(TransportError::Closed.into());
                }

                self.shared.notify_state(ConnectionState::Connected);
                info!(
                    "Connected to MQTT broker, reason: {}, session_present: {}",
                    outcome.reason_code, outcome.session_present
                );
                Ok(outcome)
            }
            Err(e) => {
                error!("Failed to connect to MQTT broker: {}", e);
                {
                    let mut slot = self.shared.slot();
                    if slot.generation == generation {
                        slot.generation += 1;
                    }
                }
                self.shared.set_state(ConnectionState::Disconnected);
                Err(e.into())
            }
        }
    }

    /// Disconnects the current connection gracefully.
    pub async fn disconnect(&self) -> Result<()> {
        let _guard = self.connect_lock.lock().await;

        let client = {
            let mut slot = self.shared.slot();
            let connected = slot.state == ConnectionState::Connected
                && slot.client.as_ref().is_some_and(|c| c.is_connected());
            if !connected {
                return Err(SessionError::NotConnected);
            }
            slot.generation += 1;
            slot.client.take()
        };

        info!("Disconnecting from MQTT broker");
        let result = match client {
            Some(client) => client.disconnect().await,
            None => Ok(()),
        };
        self.shared.set_state(ConnectionState::Disconnected);

        result.map_err(Into::into)
    }

    pub async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome> {
        let options = PublishOptions::from_request(request)?;
        let client = self.connected_client()?;

        debug!("Publishing to {} with {}", options.topic, options.qos);
        Ok(client.publish(options).await?)
    }

    /// Publishes a received message again.
    pub async fn repeat(&self, message: &InboundMessage) -> Result<PublishOutcome> {
        self.publish(&message.to_publish_request()).await
    }

    pub async fn subscribe(&self, request: &SubscribeRequest) -> Result<SubscribeOutcome> {
        let options = SubscribeOptions::from_request(request)?;
        let client = self.connected_client()?;

        debug!("Subscribing to {}", options.filter.topic);
        Ok(client.subscribe(options).await?)
    }

    pub async fn unsubscribe(&self, request: &UnsubscribeRequest) -> Result<UnsubscribeOutcome> {
        let options = UnsubscribeOptions::from_request(request)?;
        let client = self.connected_client()?;

        debug!("Unsubscribing from {}", options.topic);
        Ok(client.unsubscribe(options).await?)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.slot().state
    }

    pub fn is_connected(&self) -> bool {
        self.connected_client().is_ok()
    }

    /// Adds an observer for received application messages.
    pub fn add_message_observer(&self, observer: impl MessageObserver + 'static) -> ObserverId {
        let observer: Arc<dyn MessageObserver> = Arc::new(observer);
        self.shared.messages.attach(observer)
    }

    pub fn add_packet_inspector(
        &self,
        inspector: impl Fn(&InspectedPacket) + Send + Sync + 'static,
    ) -> ObserverId {
        self.shared.inspectors.attach(Arc::new(inspector))
    }

    pub fn add_log_observer(
        &self,
        observer: impl Fn(&LogMessage) + Send + Sync + 'static,
    ) -> ObserverId {
        self.shared.logs.attach(Arc::new(observer))
    }

    pub fn add_disconnect_observer(
        &self,
        observer: impl Fn(&DisconnectEvent) + Send + Sync + 'static,
    ) -> ObserverId {
        self.shared.disconnects.attach(Arc::new(observer))
    }

    pub fn add_state_observer(
        &self,
        observer: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> ObserverId {
        self.shared.states.attach(Arc::new(observer))
    }

    /// Removes an observer from whichever channel it was added to.
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        self.shared.messages.detach(id)
            || self.shared.inspectors.detach(id)
            || self.shared.logs.detach(id)
            || self.shared.disconnects.detach(id)
            || self.shared.states.detach(id)
    }

    fn connected_client(&self) -> Result<Arc<dyn TransportClient>> {
        let slot = self.shared.slot();
        match &slot.client {
            Some(client) if slot.state == ConnectionState::Connected && client.is_connected() => {
                Ok(Arc::clone(client))
            }
            _ => Err(SessionError::NotConnected),
        }
    }

    /// Takes the current client out of the slot and disconnects it,
    /// swallowing any failure.
    async fn release_current(&self) {
        let previous = {
            let mut slot = self.shared.slot();
            slot.generation += 1;
            slot.client.take()
        };

        if let Some(client) = previous {
            debug!("Releasing previous connection");
            if let Err(e) = client.disconnect().await {
                warn!("Ignoring error while releasing previous connection: {}", e);
            }
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }
}

impl<F> Drop for ConnectionSessionManager<F> {
    /// Releases the current client so its connection closes with the manager.
    /// The client's event sink keeps the shared state alive, so leaving it in
    /// the slot would keep the connection open.
    fn drop(&mut self) {
        let client = {
            let mut slot = self.shared.slot();
            slot.generation += 1;
            slot.client.take()
        };
        if client.is_some() {
            debug!("Manager dropped, closing its connection");
        }
        drop(client);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use multimeter_core::{QoS, ReasonCode, RetainHandling, UserProperty};

    use super::*;
    use crate::events::DisconnectReason;
    use crate::options::TopicFilter;
    use crate::transport::{Delivery, TopicOutcome};

    #[derive(Default)]
    struct Recorder {
        calls: StdMutex<Vec<String>>,
        sinks: StdMutex<Vec<EventSink>>,
        published: StdMutex<Vec<PublishOptions>>,
        subscribed: StdMutex<Vec<SubscribeOptions>>,
        refuse: AtomicBool,
        dropped: AtomicUsize,
    }

    impl Recorder {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn sink(&self, index: usize) -> EventSink {
            self.sinks.lock().unwrap()[index].clone()
        }
    }

    struct RecordingFactory(Arc<Recorder>);

    impl TransportFactory for RecordingFactory {
        fn create(&self, events: EventSink) -> Box<dyn TransportClient> {
            let id = {
                let mut sinks = self.0.sinks.lock().unwrap();
                sinks.push(events.clone());
                sinks.len()
            };
            Box::new(RecordingClient {
                id,
                recorder: Arc::clone(&self.0),
                events,
                connected: AtomicBool::new(false),
            })
        }
    }

    struct RecordingClient {
        id: usize,
        recorder: Arc<Recorder>,
        events: EventSink,
        connected: AtomicBool,
    }

    impl Drop for RecordingClient {
        fn drop(&mut self) {
            self.recorder.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TransportClient for RecordingClient {
        async fn connect(
            &self,
            options: &ConnectOptions,
        ) -> std::result::Result<ConnectOutcome, TransportError> {
            self.recorder
                .record(format!("connect#{} {}", self.id, options.address()));
            if self.recorder.refuse.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionRefused(ReasonCode::NotAuthorized));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(ConnectOutcome::default())
        }

        async fn disconnect(&self) -> std::result::Result<(), TransportError> {
            self.recorder.record(format!("disconnect#{}", self.id));
            self.connected.store(false, Ordering::SeqCst);
            self.events.disconnected(DisconnectEvent::client_initiated());
            Ok(())
        }

        async fn publish(
            &self,
            options: PublishOptions,
        ) -> std::result::Result<PublishOutcome, TransportError> {
            self.recorder
                .record(format!("publish#{} {}", self.id, options.topic));
            self.recorder.published.lock().unwrap().push(options);
            Ok(PublishOutcome {
                packet_id: Some(1),
                reason_code: ReasonCode::Success,
            })
        }

        async fn subscribe(
            &self,
            options: SubscribeOptions,
        ) -> std::result::Result<SubscribeOutcome, TransportError> {
            self.recorder
                .record(format!("subscribe#{} {}", self.id, options.filter.topic));
            let item = TopicOutcome {
                topic: options.filter.topic.clone(),
                reason_code: ReasonCode::granted(options.filter.qos),
            };
            self.recorder.subscribed.lock().unwrap().push(options);
            Ok(SubscribeOutcome {
                packet_id: 2,
                items: vec![item],
            })
        }

        async fn unsubscribe(
            &self,
            options: UnsubscribeOptions,
        ) -> std::result::Result<UnsubscribeOutcome, TransportError> {
            self.recorder
                .record(format!("unsubscribe#{} {}", self.id, options.topic));
            Ok(UnsubscribeOutcome {
                packet_id: 3,
                items: vec![TopicOutcome {
                    topic: options.topic,
                    reason_code: ReasonCode::Success,
                }],
            })
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    fn manager() -> (ConnectionSessionManager<RecordingFactory>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let manager = ConnectionSessionManager::new(RecordingFactory(Arc::clone(&recorder)));
        (manager, recorder)
    }

    fn watch_states(
        manager: &ConnectionSessionManager<RecordingFactory>,
    ) -> Arc<StdMutex<Vec<ConnectionState>>> {
        let states = Arc::new(StdMutex::new(Vec::new()));
        let seen = Arc::clone(&states);
        manager.add_state_observer(move |state| seen.lock().unwrap().push(state));
        states
    }

    fn local_profile() -> ConnectionProfile {
        let mut profile = ConnectionProfile::new("localhost", 1883);
        profile.clean_session = true;
        profile
    }

    #[tokio::test]
    async fn connect_replaces_previous_connection() {
        let (manager, recorder) = manager();
        let states = watch_states(&manager);
        let disconnects = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&disconnects);
        manager.add_disconnect_observer(move |event| {
            assert_eq!(event.reason, DisconnectReason::ClientInitiated);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.connect(&local_profile()).await.unwrap();
        manager.connect(&local_profile()).await.unwrap();

        assert_eq!(
            recorder.calls(),
            [
                "connect#1 localhost:1883",
                "disconnect#1",
                "connect#2 localhost:1883"
            ]
        );
        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(
            *states.lock().unwrap(),
            [
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Connecting,
                ConnectionState::Connected,
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_connects_leave_one_connection() {
        let (manager, recorder) = manager();

        let first = local_profile();
        let second = local_profile();
        let (a, b) = tokio::join!(manager.connect(&first), manager.connect(&second));
        a.unwrap();
        b.unwrap();

        let connects = recorder
            .calls()
            .iter()
            .filter(|call| call.starts_with("connect"))
            .count();
        assert_eq!(connects, 2);
        assert_eq!(recorder.calls()[1], "disconnect#1");
        assert!(manager.is_connected());
    }

    #[tokio::test]
    async fn dropping_the_manager_releases_the_client() {
        let (manager, recorder) = manager();
        manager.connect(&local_profile()).await.unwrap();
        assert_eq!(recorder.dropped.load(Ordering::SeqCst), 0);

        drop(manager);

        assert_eq!(recorder.dropped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn requests_fail_fast_when_disconnected() {
        let (manager, recorder) = manager();

        let publish = manager.publish(&PublishRequest::new("a/b", "x")).await;
        let subscribe = manager
            .subscribe(&SubscribeRequest::new("a/b", QoS::AtLeastOnce))
            .await;
        let unsubscribe = manager.unsubscribe(&UnsubscribeRequest::new("a/b")).await;
        let disconnect = manager.disconnect().await;

        assert!(matches!(publish, Err(SessionError::NotConnected)));
        assert!(matches!(subscribe, Err(SessionError::NotConnected)));
        assert!(matches!(unsubscribe, Err(SessionError::NotConnected)));
        assert!(matches!(disconnect, Err(SessionError::NotConnected)));
        assert!(recorder.calls().is_empty());
    }

    #[tokio::test]
    async fn topic_alias_only_sent_when_positive() {
        let (manager, recorder) = manager();
        manager.connect(&local_profile()).await.unwrap();

        let mut request = PublishRequest::new("a/b", "x");
        manager.publish(&request).await.unwrap();
        request.topic_alias = 7;
        manager.publish(&request).await.unwrap();

        let published = recorder.published.lock().unwrap();
        assert_eq!(published[0].topic_alias, None);
        assert_eq!(published[1].topic_alias, Some(7));
    }

    #[tokio::test]
    async fn empty_named_user_properties_are_dropped() {
        let (manager, recorder) = manager();
        manager.connect(&local_profile()).await.unwrap();

        let mut request = PublishRequest::new("a/b", "x");
        request.user_properties = vec![UserProperty::new("", "v"), UserProperty::new("k", "v")];
        manager.publish(&request).await.unwrap();

        let published = recorder.published.lock().unwrap();
        assert_eq!(
            published[0].user_properties,
            vec![("k".to_string(), "v".to_string())]
        );
    }

    #[tokio::test]
    async fn every_observer_sees_every_message() {
        let (manager, recorder) = manager();
        let count = Arc::new(AtomicUsize::new(0));
        let sequences = Arc::new(StdMutex::new(Vec::new()));

        for _ in 0..2 {
            let count = Arc::clone(&count);
            let sequences = Arc::clone(&sequences);
            manager.add_message_observer(move |message: InboundMessage| {
                let count = Arc::clone(&count);
                let sequences = Arc::clone(&sequences);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    sequences.lock().unwrap().push(message.sequence);
                }
            });
        }

        manager.connect(&local_profile()).await.unwrap();
        let sink = recorder.sink(0);
        for n in 0..3 {
            sink.deliver(Delivery::new("a/b", format!("{}", n), QoS::AtMostOnce))
                .await;
        }

        assert_eq!(count.load(Ordering::SeqCst), 6);
        assert_eq!(*sequences.lock().unwrap(), [1, 1, 2, 2, 3, 3]);
    }

    #[tokio::test]
    async fn message_observers_are_awaited_in_turn() {
        let (manager, recorder) = manager();
        let order = Arc::new(StdMutex::new(Vec::new()));

        let first = Arc::clone(&order);
        manager.add_message_observer(move |_message: InboundMessage| {
            let order = Arc::clone(&first);
            async move {
                order.lock().unwrap().push("first started");
                tokio::task::yield_now().await;
                order.lock().unwrap().push("first finished");
            }
        });
        let second = Arc::clone(&order);
        manager.add_message_observer(move |_message: InboundMessage| {
            let order = Arc::clone(&second);
            async move {
                order.lock().unwrap().push("second");
            }
        });

        manager.connect(&local_profile()).await.unwrap();
        recorder
            .sink(0)
            .deliver(Delivery::new("a/b", "x", QoS::AtLeastOnce))
            .await;

        assert_eq!(
            *order.lock().unwrap(),
            ["first started", "first finished", "second"]
        );
    }

    #[tokio::test]
    async fn subscribe_disconnect_scenario() {
        let (manager, recorder) = manager();
        let states = watch_states(&manager);
        assert_eq!(manager.state(), ConnectionState::Disconnected);

        manager.connect(&local_profile()).await.unwrap();
        assert_eq!(
            *states.lock().unwrap(),
            [ConnectionState::Connecting, ConnectionState::Connected]
        );

        let mut request = SubscribeRequest::new("a/b", QoS::AtLeastOnce);
        request.retain_handling = RetainHandling::SendAtSubscribe;
        let outcome = manager.subscribe(&request).await.unwrap();
        assert_eq!(outcome.items[0].reason_code, ReasonCode::GrantedQoS1);
        assert_eq!(
            recorder.subscribed.lock().unwrap()[0].filter,
            TopicFilter {
                topic: "a/b".to_string(),
                qos: QoS::AtLeastOnce,
                no_local: false,
                retain_as_published: false,
                retain_handling: RetainHandling::SendAtSubscribe,
            }
        );

        manager.disconnect().await.unwrap();
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(matches!(
            manager.publish(&PublishRequest::new("a/b", "x")).await,
            Err(SessionError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn server_disconnect_is_surfaced() {
        let (manager, recorder) = manager();
        let events = Arc::new(StdMutex::new(Vec::new()));
        let seen = Arc::clone(&events);
        manager.add_disconnect_observer(move |event| seen.lock().unwrap().push(event.clone()));

        manager.connect(&local_profile()).await.unwrap();
        recorder.sink(0).disconnected(DisconnectEvent {
            reason: DisconnectReason::ServerInitiated,
            reason_code: Some(ReasonCode::ServerShuttingDown),
            reason_string: Some("maintenance".to_string()),
            client_was_connected: true,
        });

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_connected());
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].reason_code, Some(ReasonCode::ServerShuttingDown));
        assert_eq!(events[0].reason_string.as_deref(), Some("maintenance"));
    }

    #[tokio::test]
    async fn stale_disconnect_keeps_current_connection() {
        let (manager, recorder) = manager();
        manager.connect(&local_profile()).await.unwrap();
        manager.connect(&local_profile()).await.unwrap();

        recorder.sink(0).disconnected(DisconnectEvent {
            reason: DisconnectReason::ConnectionLost,
            reason_code: None,
            reason_string: None,
            client_was_connected: true,
        });

        assert!(!recorder.sink(0).is_current());
        assert!(recorder.sink(1).is_current());
        assert_eq!(manager.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn refused_connect_stays_disconnected() {
        let (manager, recorder) = manager();
        let states = watch_states(&manager);
        recorder.refuse.store(true, Ordering::SeqCst);

        let result = manager.connect(&local_profile()).await;

        assert!(matches!(
            result,
            Err(SessionError::Transport(TransportError::ConnectionRefused(
                ReasonCode::NotAuthorized
            )))
        ));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(
            *states.lock().unwrap(),
            [ConnectionState::Connecting, ConnectionState::Disconnected]
        );
    }

    #[tokio::test]
    async fn invalid_topic_never_reaches_transport() {
        let (manager, recorder) = manager();
        manager.connect(&local_profile()).await.unwrap();

        let result = manager.publish(&PublishRequest::new("a/+", "x")).await;
        assert!(matches!(result, Err(SessionError::InvalidArgument(_))));

        let result = manager
            .subscribe(&SubscribeRequest::new("a/#/b", QoS::AtMostOnce))
            .await;
        assert!(matches!(result, Err(SessionError::InvalidArgument(_))));
        assert_eq!(recorder.calls().len(), 1);
    }

    #[tokio::test]
    async fn repeat_publishes_received_message() {
        let (manager, recorder) = manager();
        let received = Arc::new(StdMutex::new(None));
        let slot = Arc::clone(&received);
        manager.add_message_observer(move |message: InboundMessage| {
            let slot = Arc::clone(&slot);
            async move {
                *slot.lock().unwrap() = Some(message);
            }
        });

        manager.connect(&local_profile()).await.unwrap();
        let mut delivery = Delivery::new("sensors/temp", "21", QoS::AtLeastOnce);
        delivery.retain = true;
        delivery.subscription_identifiers = vec![3];
        recorder.sink(0).deliver(delivery).await;

        let message = received.lock().unwrap().clone().unwrap();
        manager.repeat(&message).await.unwrap();

        let published = recorder.published.lock().unwrap();
        assert_eq!(published[0].topic, "sensors/temp");
        assert_eq!(published[0].payload, "21");
        assert!(published[0].retain);
        assert_eq!(published[0].subscription_identifier, None);
    }

    #[tokio::test]
    async fn removed_observers_are_not_called() {
        let (manager, recorder) = manager();
        let lines = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&lines);
        let id = manager.add_log_observer(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        manager.connect(&local_profile()).await.unwrap();
        let sink = recorder.sink(0);
        sink.log(crate::events::LogLevel::Info, "test", "first");
        assert!(manager.remove_observer(id));
        assert!(!manager.remove_observer(id));
        sink.log(crate::events::LogLevel::Info, "test", "second");

        assert_eq!(lines.load(Ordering::SeqCst), 1);
    }
}
