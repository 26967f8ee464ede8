//! Observer registries behind the manager's event channels.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use multimeter_core::InboundMessage;

use crate::events::{ConnectionState, DisconnectEvent, InspectedPacket, LogMessage};

/// Handle returned when an observer is attached, used to detach it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Receives every application message.
///
/// The manager awaits each observer in turn, and the message is only
/// acknowledged to the MQTT library once all of them have returned. A slow
/// observer therefore slows delivery down but never loses messages.
///
/// Plain async closures taking an [`InboundMessage`] implement this trait.
#[async_trait]
pub trait MessageObserver: Send + Sync {
    async fn on_message(&self, message: &InboundMessage);
}

#[async_trait]
impl<F, Fut> MessageObserver for F
where
    F: Fn(InboundMessage) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_message(&self, message: &InboundMessage) {
        (self)(message.clone()).await
    }
}

pub type PacketInspector = dyn Fn(&InspectedPacket) + Send + Sync;
pub type LogObserver = dyn Fn(&LogMessage) + Send + Sync;
pub type DisconnectObserver = dyn Fn(&DisconnectEvent) + Send + Sync;
pub type StateObserver = dyn Fn(ConnectionState) + Send + Sync;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Observers of one event channel, kept in registration order.
///
/// Dispatch works on a snapshot, so an observer may attach or detach
/// observers while it is being invoked.
pub(crate) struct Registry<T: ?Sized> {
    entries: RwLock<Vec<(ObserverId, Arc<T>)>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> Registry<T> {
    pub(crate) fn attach(&self, observer: Arc<T>) -> ObserverId {
        let id = ObserverId(NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, observer));
        id
    }

    pub(crate) fn detach(&self, id: ObserverId) -> bool {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = entries.len();
        entries.retain(|(entry, _)| *entry != id);
        entries.len() != before
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    type Callback = dyn Fn(&str) + Send + Sync;

    #[test]
    fn snapshot_keeps_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry: Registry<Callback> = Registry::default();

        for name in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            registry.attach(Arc::new(move |event: &str| {
                seen.lock().unwrap().push(format!("{name}:{event}"))
            }));
        }

        for observer in registry.snapshot() {
            observer("x");
        }

        assert_eq!(
            *seen.lock().unwrap(),
            ["first:x", "second:x", "third:x"]
        );
    }

    #[test]
    fn detach_removes_only_that_observer() {
        let registry: Registry<Callback> = Registry::default();
        let a = registry.attach(Arc::new(|_: &str| {}));
        let b = registry.attach(Arc::new(|_: &str| {}));

        assert!(registry.detach(a));
        assert!(!registry.detach(a));
        assert_eq!(registry.len(), 1);
        assert!(registry.detach(b));
        assert_eq!(registry.len(), 0);
    }
}
