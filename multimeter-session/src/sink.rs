use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use multimeter_core::{InboundMessage, PayloadFormat, UserProperty};
use tracing::{debug, info};

use crate::events::{ConnectionState, DisconnectEvent, InspectedPacket, LogLevel, LogMessage};
use crate::observers::{
    DisconnectObserver, LogObserver, MessageObserver, PacketInspector, Registry, StateObserver,
};
use crate::transport::{Delivery, TransportClient};

/// The manager's single connection slot.
pub(crate) struct Slot {
    pub(crate) state: ConnectionState,
    /// Bumped whenever the slot is handed to a new connection or released,
    /// so events from a replaced client cannot touch the current one.
    pub(crate) generation: u64,
    pub(crate) client: Option<Arc<dyn TransportClient>>,
}

/// State shared between the manager and the sinks of its clients.
pub(crate) struct Shared {
    slot: Mutex<Slot>,
    sequence: AtomicU64,
    pub(crate) messages: Registry<dyn MessageObserver>,
    pub(crate) inspectors: Registry<PacketInspector>,
    pub(crate) logs: Registry<LogObserver>,
    pub(crate) disconnects: Registry<DisconnectObserver>,
    pub(crate) states: Registry<StateObserver>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                state: ConnectionState::Disconnected,
                generation: 0,
                client: None,
            }),
            sequence: AtomicU64::new(0),
            messages: Registry::default(),
            inspectors: Registry::default(),
            logs: Registry::default(),
            disconnects: Registry::default(),
            states: Registry::default(),
        }
    }

    pub(crate) fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Moves the slot to `state` and notifies state observers if it changed.
    /// Observers run after the slot lock is released.
    pub(crate) fn set_state(&self, state: ConnectionState) {
        let changed = {
            let mut slot = self.slot();
            let changed = slot.state != state;
            slot.state = state;
            changed
        };

        if changed {
            self.notify_state(state);
        }
    }

    pub(crate) fn notify_state(&self, state: ConnectionState) {
        debug!("Connection state changed to {}", state);
        for observer in self.states.snapshot() {
            observer(state);
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Where a transport client reports what happens on its connection.
///
/// Each sink is bound to the connection it was created for. Messages,
/// inspected packets and log lines are forwarded no matter which connection
/// they come from, but only the current connection can move the manager
/// to `Disconnected`.
#[derive(Clone)]
pub struct EventSink {
    shared: Arc<Shared>,
    generation: u64,
}

impl EventSink {
    pub(crate) fn new(shared: Arc<Shared>, generation: u64) -> Self {
        Self { shared, generation }
    }

    /// Hands a received application message to every message observer and
    /// returns once all of them have finished with it.
    pub async fn deliver(&self, delivery: Delivery) {
        let message = InboundMessage {
            sequence: self.shared.next_sequence(),
            received_at: Utc::now(),
            topic: Arc::from(delivery.topic),
            payload: delivery.payload,
            qos: delivery.qos,
            retain: delivery.retain,
            payload_format: PayloadFormat::from_indicator(delivery.payload_format_indicator),
            content_type: delivery.content_type,
            response_topic: delivery.response_topic,
            correlation_data: delivery.correlation_data,
            message_expiry_interval: delivery.message_expiry_interval,
            subscription_identifiers: delivery.subscription_identifiers,
            user_properties: delivery
                .user_properties
                .into_iter()
                .map(|(name, value)| UserProperty { name, value })
                .collect(),
        };

        for observer in self.shared.messages.snapshot() {
            observer.on_message(&message).await;
        }
    }

    pub fn inspect(&self, packet: InspectedPacket) {
        for inspector in self.shared.inspectors.snapshot() {
            inspector(&packet);
        }
    }

    pub fn log(&self, level: LogLevel, source: &'static str, message: impl Into<String>) {
        let line = LogMessage {
            timestamp: Utc::now(),
            level,
            source,
            message: message.into(),
        };

        for observer in self.shared.logs.snapshot() {
            observer(&line);
        }
    }

    /// Reports the end of this sink's connection.
    pub fn disconnected(&self, event: DisconnectEvent) {
        let changed = {
            let mut slot = self.shared.slot();
            if slot.generation == self.generation {
                slot.generation += 1;
                slot.client = None;
                let changed = slot.state != ConnectionState::Disconnected;
                slot.state = ConnectionState::Disconnected;
                changed
            } else {
                false
            }
        };

        if changed {
            info!("Disconnected from MQTT broker: {:?}", event.reason);
            self.shared.notify_state(ConnectionState::Disconnected);
        }

        for observer in self.shared.disconnects.snapshot() {
            observer(&event);
        }
    }

    /// True while this sink's connection is the manager's current one.
    pub fn is_current(&self) -> bool {
        self.shared.slot().generation == self.generation
    }
}
