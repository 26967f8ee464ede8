//! Matches broker acknowledgements to the requests waiting for them.
//!
//! A request is queued when it is handed to the MQTT library, receives its
//! packet identifier when the library reports the packet as sent, and is
//! resolved by the matching acknowledgement. The library sends requests in
//! submission order, so identifiers are assigned first in, first out.

use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;

use crate::error::TransportError;

pub(crate) type Reply<T> = oneshot::Receiver<Result<T, TransportError>>;
type Waiter<T> = oneshot::Sender<Result<T, TransportError>>;

pub(crate) struct Correlator<T> {
    queued: VecDeque<Waiter<T>>,
    in_flight: HashMap<u16, Waiter<T>>,
}

impl<T> Default for Correlator<T> {
    fn default() -> Self {
        Self {
            queued: VecDeque::new(),
            in_flight: HashMap::new(),
        }
    }
}

impl<T> Correlator<T> {
    /// Queues a request that is about to be submitted.
    pub(crate) fn enqueue(&mut self) -> Reply<T> {
        let (tx, rx) = oneshot::channel();
        self.queued.push_back(tx);
        rx
    }

    /// Drops the most recently queued request after its submission failed.
    pub(crate) fn withdraw_last(&mut self) {
        self.queued.pop_back();
    }

    /// Gives the oldest queued request its packet identifier.
    pub(crate) fn assign(&mut self, packet_id: u16) -> bool {
        match self.queued.pop_front() {
            Some(waiter) => {
                self.in_flight.insert(packet_id, waiter);
                true
            }
            None => false,
        }
    }

    /// Resolves the oldest queued request without waiting for an
    /// acknowledgement, for packets that never get one.
    pub(crate) fn complete_next(&mut self, value: T) -> bool {
        match self.queued.pop_front() {
            Some(waiter) => {
                let _ = waiter.send(Ok(value));
                true
            }
            None => false,
        }
    }

    pub(crate) fn resolve(&mut self, packet_id: u16, value: T) -> bool {
        match self.in_flight.remove(&packet_id) {
            Some(waiter) => {
                let _ = waiter.send(Ok(value));
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, packet_id: u16) -> bool {
        self.in_flight.contains_key(&packet_id)
    }

    /// Fails every request, queued or in flight.
    pub(crate) fn fail_all(&mut self, error: TransportError) {
        for waiter in self.queued.drain(..) {
            let _ = waiter.send(Err(error.clone()));
        }
        for (_, waiter) in self.in_flight.drain() {
            let _ = waiter.send(Err(error.clone()));
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.queued.is_empty() && self.in_flight.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acknowledgements_resolve_by_packet_id() {
        let mut correlator = Correlator::default();
        let first = correlator.enqueue();
        let second = correlator.enqueue();

        assert!(correlator.assign(10));
        assert!(correlator.assign(11));
        assert!(!correlator.assign(12));

        assert!(correlator.resolve(11, "second"));
        assert!(correlator.resolve(10, "first"));
        assert!(!correlator.resolve(10, "again"));

        assert_eq!(first.await.unwrap().unwrap(), "first");
        assert_eq!(second.await.unwrap().unwrap(), "second");
        assert!(correlator.is_empty());
    }

    #[tokio::test]
    async fn withdrawn_request_is_not_assigned() {
        let mut correlator: Correlator<u8> = Correlator::default();
        let kept = correlator.enqueue();
        let withdrawn = correlator.enqueue();
        correlator.withdraw_last();

        assert!(correlator.complete_next(1));
        assert!(!correlator.complete_next(2));
        assert_eq!(kept.await.unwrap().unwrap(), 1);
        assert!(withdrawn.await.is_err());
    }

    #[tokio::test]
    async fn fail_all_reaches_queued_and_in_flight() {
        let mut correlator: Correlator<()> = Correlator::default();
        let in_flight = correlator.enqueue();
        correlator.assign(1);
        let queued = correlator.enqueue();

        correlator.fail_all(TransportError::Closed);

        assert!(matches!(in_flight.await.unwrap(), Err(TransportError::Closed)));
        assert!(matches!(queued.await.unwrap(), Err(TransportError::Closed)));
        assert!(correlator.is_empty());
    }
}
