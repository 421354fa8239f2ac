//! Seed-derived identities.
//!
//! A user key identifies who stores and computes; a node key identifies the
//! party a client participates as. Both are ed25519 keys whose secret is the
//! SHA-256 of a seed string.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::{Result, VeilError};
use crate::types::{PartyId, UserId};

/// Length in bytes of a derived identifier before hex encoding.
const ID_BYTES: usize = 20;

fn signing_key_from_seed(domain: &str, seed: &str) -> SigningKey {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(seed.as_bytes());
    let mut secret = [0u8; 32];
    secret.copy_from_slice(&hasher.finalize());
    SigningKey::from_bytes(&secret)
}

fn short_id(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..ID_BYTES])
}

/// Key of a network user.
#[derive(Clone)]
pub struct UserKey {
    signing: SigningKey,
}

impl UserKey {
    /// Derive a user key from a seed.
    pub fn from_seed(seed: &str) -> Self {
        Self {
            signing: signing_key_from_seed("veil-user:", seed),
        }
    }

    /// The user id this key authenticates as.
    pub fn user_id(&self) -> UserId {
        UserId(short_id(&self.signing.verifying_key()))
    }

    /// Hex-encoded public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing.verifying_key().as_bytes())
    }

    /// Sign a message, returning the hex-encoded signature.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.signing.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserKey")
            .field("user_id", &self.user_id())
            .finish_non_exhaustive()
    }
}

/// Key of the node a client participates through.
#[derive(Clone)]
pub struct NodeKey {
    signing: SigningKey,
}

impl NodeKey {
    /// Derive a node key from a seed.
    pub fn from_seed(seed: &str) -> Self {
        Self {
            signing: signing_key_from_seed("veil-node:", seed),
        }
    }

    /// The party id this node is known as on the network.
    pub fn party_id(&self) -> PartyId {
        PartyId(short_id(&self.signing.verifying_key()))
    }
}

impl std::fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKey")
            .field("party_id", &self.party_id())
            .finish_non_exhaustive()
    }
}

/// Verify a hex-encoded signature against a hex-encoded public key.
pub fn verify_signature(public_key_hex: &str, message: &[u8], signature_hex: &str) -> Result<()> {
    let key_bytes: [u8; 32] = hex::decode(public_key_hex)
        .map_err(|e| VeilError::SerializationError(e.to_string()))?
        .try_into()
        .map_err(|_| VeilError::SerializationError("public key must be 32 bytes".to_string()))?;
    let sig_bytes: [u8; 64] = hex::decode(signature_hex)
        .map_err(|e| VeilError::SerializationError(e.to_string()))?
        .try_into()
        .map_err(|_| VeilError::SerializationError("signature must be 64 bytes".to_string()))?;

    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| VeilError::SerializationError(e.to_string()))?;
    key.verify(message, &Signature::from_bytes(&sig_bytes))
        .map_err(|_| VeilError::Internal("signature verification failed".to_string()))
}
