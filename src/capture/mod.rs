//! Frame transmission backends
//!
//! The forwarding core never owns a socket. Every outbound frame is handed to
//! a [`Transmit`] implementation together with the interface it must leave
//! on; the backend copies what it needs before returning.

use crate::dataplane::Interface;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Transmission collaborator
///
/// Implementations must be shareable with the ARP maintenance task.
pub trait Transmit: Send + Sync {
    /// Send a complete Ethernet frame out of `interface`
    fn transmit(&self, interface: &Interface, frame: &[u8]) -> Result<()>;
}

/// A frame captured by [`RecordingTransmitter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub interface: String,
    pub data: Vec<u8>,
}

/// In-memory backend that records every frame instead of sending it
///
/// Used for dry runs and tests. Interfaces can be marked down to exercise
/// transmit failures. A poisoned lock fails `transmit` with
/// [`Error::Resource`]; the inspection methods still return what was
/// recorded before the panic.
#[derive(Debug, Default)]
pub struct RecordingTransmitter {
    sent: Mutex<Vec<SentFrame>>,
    down: Mutex<HashSet<String>>,
}

impl RecordingTransmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every transmit on `interface` fail
    pub fn set_down(&self, interface: &str) {
        recover(&self.down).insert(interface.to_string());
    }

    /// Frames sent so far, in order
    pub fn sent(&self) -> Vec<SentFrame> {
        recover(&self.sent).clone()
    }

    /// Drain the recorded frames
    pub fn take(&self) -> Vec<SentFrame> {
        std::mem::take(&mut *recover(&self.sent))
    }

    pub fn len(&self) -> usize {
        recover(&self.sent).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn recover<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

fn checked<'a, T>(lock: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>> {
    lock.lock()
        .map_err(|_| Error::Resource(format!("{} lock poisoned", what)))
}

impl Transmit for RecordingTransmitter {
    fn transmit(&self, interface: &Interface, frame: &[u8]) -> Result<()> {
        if checked(&self.down, "interface state")?.contains(&interface.name) {
            return Err(Error::Transmit {
                interface: interface.name.clone(),
                reason: "interface down".into(),
            });
        }

        checked(&self.sent, "recording")?.push(SentFrame {
            interface: interface.name.clone(),
            data: frame.to_vec(),
        });
        Ok(())
    }
}
