//! Ledger gateway interface and an in-memory ledger.
//!
//! [`WalletGateway`] pays quotes by signing transactions with a
//! [`LocalWallet`] and broadcasting them to an [`InMemoryLedger`]. The ledger
//! verifies signatures, balances and nonces, and refuses a second payment for
//! the same quote.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use veil_core::keys::verify_signature;
use veil_core::{PaymentFailure, PaymentReceipt, Quote, QuoteId, Result, TxHash, UserKey, VeilError};

/// Signs and broadcasts payments for quotes.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Pay the quoted price and return the confirmed receipt.
    ///
    /// Fails with `PaymentFailed` on rejection or insufficient funds.
    async fn pay(&self, quote: &Quote) -> Result<PaymentReceipt>;
}

/// The signed part of a payment transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionBody {
    pub chain_id: String,
    /// Hex-encoded public key of the paying account.
    pub from: String,
    pub quote_id: QuoteId,
    pub amount: u64,
    pub nonce: u64,
}

impl TransactionBody {
    fn signing_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub body: TransactionBody,
    pub signature: String,
}

/// A transaction included in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: TxHash,
    pub body: TransactionBody,
    pub included_at: DateTime<Utc>,
}

/// A wallet whose key is derived from a seed.
#[derive(Debug, Clone)]
pub struct LocalWallet {
    key: UserKey,
    chain_id: String,
}

impl LocalWallet {
    pub fn new(key: UserKey, chain_id: impl Into<String>) -> Self {
        Self {
            key,
            chain_id: chain_id.into(),
        }
    }

    pub fn from_seed(seed: &str, chain_id: impl Into<String>) -> Self {
        Self::new(UserKey::from_seed(seed), chain_id)
    }

    /// The ledger account of this wallet.
    pub fn account(&self) -> String {
        self.key.public_key_hex()
    }

    pub fn sign(&self, quote: &Quote, nonce: u64) -> Result<SignedTransaction> {
        let body = TransactionBody {
            chain_id: self.chain_id.clone(),
            from: self.account(),
            quote_id: quote.id,
            amount: quote.price,
            nonce,
        };
        let signature = self.key.sign(&body.signing_bytes()?);
        Ok(SignedTransaction { body, signature })
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<String, u64>,
    nonces: HashMap<String, u64>,
    paid_quotes: HashSet<QuoteId>,
    transactions: HashMap<TxHash, Transaction>,
}

/// Single-chain in-memory ledger.
pub struct InMemoryLedger {
    chain_id: String,
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedger {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            state: Arc::new(RwLock::new(LedgerState::default())),
        }
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// Credit an account.
    pub async fn fund(&self, account: &str, amount: u64) {
        let mut state = self.state.write().await;
        *state.balances.entry(account.to_string()).or_insert(0) += amount;
    }

    pub async fn balance(&self, account: &str) -> u64 {
        self.state.read().await.balances.get(account).copied().unwrap_or(0)
    }

    /// Next nonce expected from an account.
    pub async fn nonce(&self, account: &str) -> u64 {
        self.state.read().await.nonces.get(account).copied().unwrap_or(0)
    }

    pub async fn transaction(&self, hash: &TxHash) -> Option<Transaction> {
        self.state.read().await.transactions.get(hash).cloned()
    }

    pub async fn transaction_count(&self) -> usize {
        self.state.read().await.transactions.len()
    }

    /// Verify and include a signed transaction.
    pub async fn broadcast(
        &self,
        tx: SignedTransaction,
    ) -> std::result::Result<Transaction, PaymentFailure> {
        let body = &tx.body;
        if body.chain_id != self.chain_id {
            return Err(PaymentFailure::Rejected {
                message: format!("wrong chain id '{}'", body.chain_id),
            });
        }

        let bytes = body.signing_bytes().map_err(|e| PaymentFailure::Rejected {
            message: e.to_string(),
        })?;
        verify_signature(&body.from, &bytes, &tx.signature).map_err(|_| {
            PaymentFailure::Rejected {
                message: "invalid signature".to_string(),
            }
        })?;

        let mut state = self.state.write().await;

        if state.paid_quotes.contains(&body.quote_id) {
            return Err(PaymentFailure::QuoteAlreadyPaid);
        }

        let expected_nonce = state.nonces.get(&body.from).copied().unwrap_or(0);
        if body.nonce != expected_nonce {
            return Err(PaymentFailure::Rejected {
                message: format!("nonce {} does not match expected {}", body.nonce, expected_nonce),
            });
        }

        let available = state.balances.get(&body.from).copied().unwrap_or(0);
        if available < body.amount {
            return Err(PaymentFailure::InsufficientFunds {
                required: body.amount,
                available,
            });
        }

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        hasher.update(tx.signature.as_bytes());
        let hash = TxHash(hex::encode(hasher.finalize()));

        state.balances.insert(body.from.clone(), available - body.amount);
        state.nonces.insert(body.from.clone(), expected_nonce + 1);
        state.paid_quotes.insert(body.quote_id);

        let transaction = Transaction {
            hash: hash.clone(),
            body: tx.body,
            included_at: Utc::now(),
        };
        state.transactions.insert(hash, transaction.clone());

        Ok(transaction)
    }
}

/// Pays quotes from a local wallet on an in-memory ledger.
pub struct WalletGateway {
    wallet: LocalWallet,
    ledger: Arc<InMemoryLedger>,

    /// Simulated time until a broadcast transaction is confirmed.
    confirmation_delay: Duration,

    /// Serializes nonce assignment across concurrent payments.
    sequencer: Mutex<()>,
}

impl WalletGateway {
    pub fn new(wallet: LocalWallet, ledger: Arc<InMemoryLedger>) -> Self {
        Self {
            wallet,
            ledger,
            confirmation_delay: Duration::ZERO,
            sequencer: Mutex::new(()),
        }
    }

    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    pub fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

#[async_trait]
impl LedgerGateway for WalletGateway {
    async fn pay(&self, quote: &Quote) -> Result<PaymentReceipt> {
        let failed = |reason| VeilError::PaymentFailed {
            quote_id: quote.id,
            reason,
        };

        if quote.is_expired() {
            return Err(failed(PaymentFailure::QuoteExpired));
        }

        let transaction = {
            let _guard = self.sequencer.lock().await;
            let nonce = self.ledger.nonce(&self.wallet.account()).await;
            let signed = self.wallet.sign(quote, nonce)?;
            self.ledger.broadcast(signed).await.map_err(failed)?
        };

        tracing::debug!(quote_id = %quote.id, tx_hash = %transaction.hash, "payment broadcast");

        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }

        Ok(PaymentReceipt {
            quote_id: quote.id,
            tx_hash: transaction.hash,
            amount: transaction.body.amount,
            paid_at: transaction.included_at,
        })
    }
}
