//! # Veil Events
//!
//! Compute event streams and per-compute-id outcome tracking.

pub mod source;
pub mod watcher;

pub use source::{BroadcastSource, ChannelSource, EventBus, EventSource};
pub use watcher::{ComputeWatcher, WatchState};
