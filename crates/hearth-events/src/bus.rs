//! Event bus for broadcasting events to subscribers.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace, warn};

use crate::event::HostEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Broadcasts events to async receivers.
///
/// Clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<HostEvent>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
        }
    }

    /// Publish an event.
    ///
    /// Returns the number of async receivers that received it.
    pub fn publish(&self, event: HostEvent) -> usize {
        let event = Arc::new(event);
        trace!(event_type = %event.event_type(), "Publishing event");

        if let Ok(c) = self.sender.send(Arc::clone(&event)) {
            debug!(
                event_type = %event.event_type(),
                receiver_count = c,
                "Event published"
            );
            c
        } else {
            trace!(event_type = %event.event_type(), "No receivers for event");
            0
        }
    }

    /// Subscribe to all events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// The channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver for events from the event bus.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: broadcast::Receiver<Arc<HostEvent>>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Events dropped because this receiver lagged are logged and skipped.
    /// Returns `None` once every bus handle is gone.
    pub async fn recv(&mut self) -> Option<Arc<HostEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<HostEvent>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!(skipped = count, "Event receiver lagged, events dropped");
                },
                Err(
                    broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed,
                ) => return None,
            }
        }
    }
}
