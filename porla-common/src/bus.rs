//! Publish/subscribe channel for lifecycle events.
//!
//! The job engine publishes, consumers such as the webhook dispatcher
//! subscribe. Built on `tokio::broadcast`: publishing never blocks, and a
//! subscriber that falls too far behind loses the oldest events instead of
//! stalling the publisher.

use tokio::sync::broadcast::{self, Receiver, Sender};

use crate::event::Event;

const DEFAULT_CAPACITY: usize = 1_024;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Sender<Event>,
}

impl EventBus {
    /// Construct a bus that buffers up to `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns how many subscribers will see it; zero when nobody listens.
    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> Receiver<Event> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
