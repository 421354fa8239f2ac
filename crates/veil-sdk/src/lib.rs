//! # Veil SDK
//!
//! Client SDK for submitting paid operations to MPC networks.
//!
//! Every operation follows quote → pay → submit. Compute results arrive later
//! on an event stream, which [`ComputeWatcher`] demultiplexes by compute id.

pub mod client;
pub mod http;
pub mod local;
pub mod network;
pub mod sequencer;
pub mod stream;
pub mod validate;

pub use client::{NetworkClient, NetworkClientBuilder};
pub use http::HttpNetwork;
pub use local::{LocalNetwork, LocalSession};
pub use network::{Network, ProgramRegistry};
pub use sequencer::Submission;
pub use stream::WsEventSource;
pub use validate::validate_bindings;
pub use veil_events::{ComputeWatcher, EventSource, WatchState};

/// Prelude module for common imports.
pub mod prelude {
    pub use crate::client::NetworkClient;
    pub use crate::http::HttpNetwork;
    pub use crate::local::LocalNetwork;
    pub use crate::network::{Network, ProgramRegistry};
    pub use veil_core::prelude::*;
    pub use veil_events::{ComputeWatcher, EventSource};
    pub use veil_payments::{
        InMemoryLedger, LedgerGateway, LocalWallet, PriceSchedule, WalletGateway,
    };
}
