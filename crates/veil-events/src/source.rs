//! Event sources: where compute events come from.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use veil_core::{ComputeEvent, Result, VeilError};

/// An ordered stream of compute events delivered by the network.
///
/// `next_event` must be cancel-safe: dropping the returned future before it
/// completes must not lose an event.
#[async_trait]
pub trait EventSource: Send {
    /// Suspend until the next event arrives. Fails with `StreamClosed` once
    /// the network closes the stream, and with `EventsLost` if events were
    /// dropped before this subscriber read them.
    async fn next_event(&mut self) -> Result<ComputeEvent>;
}

#[async_trait]
impl<S: EventSource + ?Sized> EventSource for Box<S> {
    async fn next_event(&mut self) -> Result<ComputeEvent> {
        (**self).next_event().await
    }
}

/// Publishes compute events to every subscriber.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ComputeEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> BroadcastSource {
        BroadcastSource {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish(&self, event: ComputeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Subscription to an [`EventBus`].
pub struct BroadcastSource {
    receiver: broadcast::Receiver<ComputeEvent>,
}

#[async_trait]
impl EventSource for BroadcastSource {
    async fn next_event(&mut self) -> Result<ComputeEvent> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event subscriber lagged, events dropped");
                Err(VeilError::EventsLost { skipped })
            }
            Err(broadcast::error::RecvError::Closed) => Err(VeilError::StreamClosed),
        }
    }
}

/// Events fed through an mpsc channel, e.g. by a transport task.
pub struct ChannelSource {
    receiver: mpsc::Receiver<ComputeEvent>,
}

impl ChannelSource {
    pub fn new(receiver: mpsc::Receiver<ComputeEvent>) -> Self {
        Self { receiver }
    }

    /// A source paired with the sender that feeds it.
    pub fn channel(capacity: usize) -> (mpsc::Sender<ComputeEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_event(&mut self) -> Result<ComputeEvent> {
        self.receiver.recv().await.ok_or(VeilError::StreamClosed)
    }
}
