//! Bounded hand-off between logging call sites and the drain worker.
//!
//! Producers go through [`EventQueue`], which never blocks: when the queue is
//! full the event is handed back and dropped by the caller. The single
//! consumer, [`EventDrain`], removes everything queued at once.

use log::warn;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::models::LogEvent;

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Why an event was not queued. The rejected event is handed back.
#[derive(Debug)]
pub enum Rejected {
    Full(LogEvent),
    Closed(LogEvent),
}

pub fn bounded(capacity: usize) -> (EventQueue, EventDrain) {
    let capacity = if capacity == 0 {
        warn!("Queue capacity is 0, using 1 instead");
        1
    } else {
        capacity
    };
    let (tx, rx) = mpsc::channel(capacity);
    (EventQueue { tx }, EventDrain { rx, capacity })
}

#[derive(Debug, Clone)]
pub struct EventQueue {
    tx: mpsc::Sender<LogEvent>,
}

impl EventQueue {
    /// Queues `event` without blocking. Returns false if it was dropped.
    pub fn offer(&self, event: LogEvent) -> bool {
        self.try_offer(event).is_ok()
    }

    /// Events queued and not yet drained.
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn try_offer(&self, event: LogEvent) -> Result<(), Rejected> {
        self.tx.try_send(event).map_err(|err| match err {
            TrySendError::Full(event) => Rejected::Full(event),
            TrySendError::Closed(event) => Rejected::Closed(event),
        })
    }
}

#[derive(Debug)]
pub struct EventDrain {
    rx: mpsc::Receiver<LogEvent>,
    capacity: usize,
}

impl EventDrain {
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Removes every event queued at the time of the call, oldest first.
    pub fn drain_all(&mut self) -> Vec<LogEvent> {
        let pending = self.rx.len();
        let mut buffer = Vec::with_capacity(pending);
        while buffer.len() < pending {
            match self.rx.try_recv() {
                Ok(event) => buffer.push(event),
                Err(_) => break,
            }
        }
        buffer
    }

    /// Drops everything still queued and returns how many events were lost.
    pub fn clear(&mut self) -> usize {
        self.drain_all().len()
    }
}
