//! # Veil Payments
//!
//! Quote service and ledger gateway interfaces, with in-memory
//! implementations for local development.

pub mod ledger;
pub mod quote;

pub use ledger::{InMemoryLedger, LedgerGateway, LocalWallet, Transaction, WalletGateway};
pub use quote::{InMemoryQuoteService, PriceSchedule, QuoteService};
