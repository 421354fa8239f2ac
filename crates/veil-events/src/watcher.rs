//! Per-compute-id outcome tracking over a single event subscription.
//!
//! A [`ComputeWatcher`] owns one [`EventSource`]. Waiting for a compute id
//! buffers events for other ids instead of discarding them, so a later wait
//! (or a wait that timed out and is retried) still observes its event. Once a
//! terminal event for an id has been handed out, further events for that id
//! are dropped.
//!
//! The watcher serves one waiter at a time (`&mut self`); concurrent waiters
//! each take their own subscription.
//!
//! If the source reports that events were lost, the watcher cannot tell which
//! ids they belonged to. It reports `EventsLost` once and then behaves as if
//! the stream had closed: unsettled ids move to `StreamClosed` and buffered
//! events remain deliverable.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use veil_core::{ComputeEvent, ComputeId, ComputeOutcome, Result, VeilError};

use crate::source::EventSource;

/// Where an outstanding compute id stands, as seen by this watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Submitted, no terminal event seen yet.
    Submitted,
    /// A `Finished` event was delivered.
    Finished,
    /// A `Failed` event was delivered.
    Failed,
    /// The last wait gave up. A new wait re-arms the id.
    TimedOut,
    /// The stream closed before the event arrived.
    StreamClosed,
}

impl WatchState {
    /// True once an event for the id was delivered.
    pub fn is_settled(&self) -> bool {
        matches!(self, WatchState::Finished | WatchState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WatchState::Submitted => "submitted",
            WatchState::Finished => "finished",
            WatchState::Failed => "failed",
            WatchState::TimedOut => "timed_out",
            WatchState::StreamClosed => "stream_closed",
        }
    }
}

/// Single-subscription watcher for compute outcomes.
pub struct ComputeWatcher<S> {
    source: S,

    /// Received but not yet delivered, in arrival order.
    buffered: VecDeque<ComputeEvent>,

    states: HashMap<ComputeId, WatchState>,

    /// Set once the source reported `StreamClosed` or `EventsLost`.
    closed: bool,
}

impl<S: EventSource> ComputeWatcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffered: VecDeque::new(),
            states: HashMap::new(),
            closed: false,
        }
    }

    /// Register a compute id as outstanding.
    pub fn track(&mut self, compute_id: ComputeId) {
        self.states.entry(compute_id).or_insert(WatchState::Submitted);
    }

    pub fn state(&self, compute_id: ComputeId) -> Option<WatchState> {
        self.states.get(&compute_id).copied()
    }

    /// Number of received events not yet delivered.
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    /// Stop tracking `compute_id` and drop any buffered event for it. A later
    /// event for the id is treated as new.
    pub fn forget(&mut self, compute_id: ComputeId) {
        self.states.remove(&compute_id);
        self.buffered.retain(|event| event.compute_id() != compute_id);
    }

    /// Next undelivered event for any compute id.
    ///
    /// Buffered events come first. An id is never delivered twice.
    pub async fn next_event(&mut self) -> Result<ComputeEvent> {
        let event = match self.buffered.pop_front() {
            Some(event) => event,
            None => self.receive().await?,
        };
        self.settle(&event);
        Ok(event)
    }

    /// Wait for the outcome of `compute_id`.
    ///
    /// With a `timeout`, fails with `AwaitTimeout` once it elapses; the
    /// subscription stays open and the event can still be observed by a
    /// later call. Dropping the returned future only cancels the local wait.
    pub async fn wait_for(
        &mut self,
        compute_id: ComputeId,
        timeout: Option<Duration>,
    ) -> Result<ComputeOutcome> {
        if self.state(compute_id).map_or(false, |s| s.is_settled()) {
            return Err(VeilError::AlreadySettled { compute_id });
        }
        self.states.insert(compute_id, WatchState::Submitted);

        let Some(limit) = timeout else {
            return self.wait_unbounded(compute_id).await;
        };

        match tokio::time::timeout(limit, self.wait_unbounded(compute_id)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.states.insert(compute_id, WatchState::TimedOut);
                let waited_ms = limit.as_millis() as u64;
                tracing::debug!(%compute_id, waited_ms, "compute wait timed out");
                Err(VeilError::AwaitTimeout {
                    compute_id,
                    waited_ms,
                })
            }
        }
    }

    async fn wait_unbounded(&mut self, compute_id: ComputeId) -> Result<ComputeOutcome> {
        if let Some(pos) = self
            .buffered
            .iter()
            .position(|event| event.compute_id() == compute_id)
        {
            if let Some(event) = self.buffered.remove(pos) {
                self.settle(&event);
                return Ok(event.into_outcome());
            }
        }

        loop {
            let event = match self.receive().await {
                Ok(event) => event,
                Err(e) => {
                    if matches!(e, VeilError::StreamClosed | VeilError::EventsLost { .. }) {
                        self.states.insert(compute_id, WatchState::StreamClosed);
                    }
                    return Err(e);
                }
            };
            if event.compute_id() == compute_id {
                self.settle(&event);
                return Ok(event.into_outcome());
            }

            tracing::debug!(
                waiting_for = %compute_id,
                received = %event.compute_id(),
                "buffering event for another compute"
            );
            self.buffered.push_back(event);
        }
    }

    /// Pull the next event from the source that has not been seen before.
    async fn receive(&mut self) -> Result<ComputeEvent> {
        if self.closed {
            return Err(VeilError::StreamClosed);
        }

        loop {
            let event = match self.source.next_event().await {
                Ok(event) => event,
                Err(e @ (VeilError::StreamClosed | VeilError::EventsLost { .. })) => {
                    self.mark_closed();
                    return Err(e);
                }
                Err(e) => return Err(e),
            };

            let id = event.compute_id();
            let seen = self.state(id).map_or(false, |s| s.is_settled())
                || self.buffered.iter().any(|e| e.compute_id() == id);
            if seen {
                tracing::debug!(compute_id = %id, "dropping duplicate compute event");
                continue;
            }
            return Ok(event);
        }
    }

    fn settle(&mut self, event: &ComputeEvent) {
        let state = match event {
            ComputeEvent::Finished { .. } => WatchState::Finished,
            ComputeEvent::Failed { .. } => WatchState::Failed,
        };
        let compute_id = event.compute_id();
        tracing::debug!(%compute_id, state = state.as_str(), "compute settled");
        self.states.insert(compute_id, state);
    }

    fn mark_closed(&mut self) {
        self.closed = true;
        for state in self.states.values_mut() {
            if !state.is_settled() {
                *state = WatchState::StreamClosed;
            }
        }
        tracing::info!(buffered = self.buffered.len(), "compute event stream closed");
    }
}
