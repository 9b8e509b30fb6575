//! Signed call envelopes.
//!
//! A caller proves its address by signing the canonical JSON of the envelope
//! with the `signature` field cleared. The address is derived from the public
//! key, so the envelope carries no separate sender field. The envelope names
//! the node instance it targets, so a signature does not replay elsewhere.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::guarded::Call;
use crate::types::Address;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("bad public key: {0}")]
    BadPublicKey(String),

    #[error("bad signature: {0}")]
    BadSignature(String),

    #[error("nonce mismatch for {address} (expected {expected}, got {got})")]
    NonceMismatch {
        address: Address,
        expected: u64,
        got: u64,
    },

    #[error("envelope targets instance {got:?}, this node is {expected}")]
    WrongInstance { expected: String, got: String },

    #[error("encode envelope: {0}")]
    Encoding(String),
}

impl CallError {
    pub fn code(&self) -> &'static str {
        match self {
            CallError::BadPublicKey(_) => "BadPublicKey",
            CallError::BadSignature(_) => "BadSignature",
            CallError::NonceMismatch { .. } => "NonceMismatch",
            CallError::WrongInstance { .. } => "WrongInstance",
            CallError::Encoding(_) => "Encoding",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCall {
    pub call: Call,
    pub nonce: u64,
    /// Instance id of the node the call is meant for
    pub instance: String,
    /// Hex-encoded 32-byte ed25519 public key
    pub public_key: String,
    /// Hex-encoded 64-byte ed25519 signature
    #[serde(default)]
    pub signature: String,
}

impl SignedCall {
    /// Build and sign an envelope for the node identified by `instance`
    pub fn sign(
        call: Call,
        nonce: u64,
        instance: &str,
        key: &SigningKey,
    ) -> Result<Self, CallError> {
        let mut envelope = Self {
            call,
            nonce,
            instance: instance.to_string(),
            public_key: hex::encode(key.verifying_key().to_bytes()),
            signature: String::new(),
        };
        let sig: Signature = key.sign(&envelope.signable_bytes()?);
        envelope.signature = hex::encode(sig.to_bytes());
        Ok(envelope)
    }

    /// Bytes covered by the signature
    pub fn signable_bytes(&self) -> Result<Vec<u8>, CallError> {
        let mut tmp = self.clone();
        tmp.signature.clear();
        serde_json::to_vec(&tmp).map_err(|e| CallError::Encoding(e.to_string()))
    }

    pub fn verifying_key(&self) -> Result<VerifyingKey, CallError> {
        let raw = hex::decode(self.public_key.trim())
            .map_err(|e| CallError::BadPublicKey(e.to_string()))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|v: Vec<u8>| CallError::BadPublicKey(format!("expected 32 bytes, got {}", v.len())))?;
        VerifyingKey::from_bytes(&bytes).map_err(|e| CallError::BadPublicKey(e.to_string()))
    }

    /// Check the signature and return the caller address
    pub fn verify(&self) -> Result<Address, CallError> {
        let key = self.verifying_key()?;
        let raw = hex::decode(self.signature.trim())
            .map_err(|e| CallError::BadSignature(e.to_string()))?;
        let bytes: [u8; 64] = raw
            .try_into()
            .map_err(|v: Vec<u8>| CallError::BadSignature(format!("expected 64 bytes, got {}", v.len())))?;
        let sig = Signature::from_bytes(&bytes);
        key.verify(&self.signable_bytes()?, &sig)
            .map_err(|e| CallError::BadSignature(e.to_string()))?;
        Ok(Address::from_public_key(&key))
    }
}
