//! Hand-off between network callbacks and the tick thread
//!
//! Transport callbacks may run on any thread. They push decoded messages
//! through an [`InboxSender`]; the owning driver drains its [`Inbox`] only
//! during its own tick slot, so history is never touched off-thread.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use resim_core::{Command, SimTime, Snapshot};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Messages exchanged between participants for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetMessage<I, S> {
    /// Input from the producing participant, resent until confirmed
    Commands(Vec<Command<I>>),
    /// State captured by the authority (or relayed by the server)
    Snapshot {
        /// Capture time on the sender's clock
        remote_time: SimTime,
        /// The captured state
        snapshot: Snapshot<S>,
    },
}

/// Create a bounded inbox and its sending half
pub fn inbox<I, S>(capacity: usize) -> (InboxSender<I, S>, Inbox<I, S>) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        InboxSender {
            tx,
            dropped: Arc::clone(&dropped),
        },
        Inbox { rx, dropped },
    )
}

/// Sending half, safe to clone into network callbacks
#[derive(Debug)]
pub struct InboxSender<I, S> {
    tx: Sender<NetMessage<I, S>>,
    dropped: Arc<AtomicU64>,
}

impl<I, S> Clone for InboxSender<I, S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<I, S> InboxSender<I, S> {
    /// Queue a message without blocking
    ///
    /// Returns `false` if the inbox is full or its driver is gone; the
    /// message is dropped, like any other lost packet.
    pub fn push(&self, message: NetMessage<I, S>) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("inbox full, dropping message");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Receiving half, owned by the driver
#[derive(Debug)]
pub struct Inbox<I, S> {
    rx: Receiver<NetMessage<I, S>>,
    dropped: Arc<AtomicU64>,
}

impl<I, S> Inbox<I, S> {
    /// Take every queued message
    pub fn drain(&self) -> Vec<NetMessage<I, S>> {
        self.rx.try_iter().collect()
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Check if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Messages dropped because the inbox was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Msg = NetMessage<u8, u8>;

    #[test]
    fn test_push_and_drain() {
        let (tx, rx) = inbox::<u8, u8>(4);
        assert!(tx.push(Msg::Commands(vec![Command::new(1, SimTime::ZERO, 7)])));
        assert!(tx.push(Msg::Snapshot {
            remote_time: SimTime::from_millis(50),
            snapshot: Snapshot::new(SimTime::from_millis(50), 1, 3),
        }));
        assert_eq!(rx.len(), 2);

        let drained = rx.drain();
        assert_eq!(drained.len(), 2);
        assert!(matches!(drained[0], NetMessage::Commands(_)));
        assert!(rx.is_empty());
    }

    #[test]
    fn test_full_inbox_drops() {
        let (tx, rx) = inbox::<u8, u8>(1);
        assert!(tx.push(Msg::Commands(Vec::new())));
        assert!(!tx.push(Msg::Commands(Vec::new())));
        assert_eq!(rx.dropped(), 1);
        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn test_push_from_another_thread() {
        let (tx, rx) = inbox::<u8, u8>(16);
        let remote = tx.clone();
        std::thread::spawn(move || {
            for seq in 1..=3 {
                remote.push(Msg::Commands(vec![Command::new(seq, SimTime::ZERO, 0)]));
            }
        })
        .join()
        .unwrap();

        assert_eq!(rx.drain().len(), 3);
    }

    #[test]
    fn test_disconnected_sender() {
        let (tx, rx) = inbox::<u8, u8>(4);
        drop(rx);
        assert!(!tx.push(Msg::Commands(Vec::new())));
    }
}
