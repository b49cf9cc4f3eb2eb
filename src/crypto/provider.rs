// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Key providers: keypair generation and detached signing over
//! encrypted-at-rest material.
//!
//! The [`KeyProvider`] trait is the substitution seam for hardware- or
//! KMS-backed implementations; the orchestrator only ever talks to the
//! [`ProviderRegistry`]. The raw private key exists in memory only
//! between decrypt and sign, in zeroize-on-drop buffers, and is wiped on
//! every exit path.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::envelope::{EncryptedEnvelope, EnvelopeService};
use crate::error::CustodyError;

/// Fixed payload signed by `validate_key_pair`. Validation never touches
/// caller data and never exposes the secret.
const VALIDATION_PROBE: &[u8] = b"custody-core key validation probe v1";

/// Supported signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Ed25519,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::Ed25519 => f.write_str("ed25519"),
        }
    }
}

/// Freshly generated keypair. Transient: never persisted in this shape;
/// the private material must be sealed into an envelope before it leaves
/// the provider boundary, and is wiped on drop.
pub struct KeyPair {
    /// Hex-encoded public key.
    pub public_key: String,
    /// Raw private key material (zeroized on drop).
    pub private_key_material: Zeroizing<Vec<u8>>,
    pub algorithm: Algorithm,
}

/// Detached signature over caller-supplied bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
    pub public_key: String,
    pub algorithm: Algorithm,
    pub timestamp: DateTime<Utc>,
}

/// Capability interface for key generation and signing.
///
/// Implementations never return or retain raw private keys beyond the
/// scope of a single call.
pub trait KeyProvider: Send + Sync {
    fn algorithm(&self) -> Algorithm;

    /// Generate a keypair from a cryptographically secure entropy
    /// source. Never deterministic; the private key is never logged.
    fn generate_key_pair(&self) -> Result<KeyPair, CustodyError>;

    /// Decrypt the sealed material, sign `data`, drop the plaintext, and
    /// return the detached signature. Failure is an opaque
    /// [`CustodyError::SigningFailed`].
    fn sign(&self, encrypted: &EncryptedEnvelope, data: &[u8]) -> Result<Signature, CustodyError>;

    /// Check that the sealed material corresponds to `public_key` by
    /// signing a fixed probe and comparing the derived key. Returns
    /// `false` on any failure; never exposes the secret.
    fn validate_key_pair(&self, public_key: &str, encrypted: &EncryptedEnvelope) -> bool;
}

impl std::fmt::Debug for dyn KeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyProvider")
            .field("algorithm", &self.algorithm())
            .finish()
    }
}

/// Software Ed25519 provider backed by the envelope service.
pub struct Ed25519Provider {
    envelope: Arc<EnvelopeService>,
}

impl Ed25519Provider {
    pub fn new(envelope: Arc<EnvelopeService>) -> Self {
        Self { envelope }
    }

    /// Decrypt the envelope and reconstruct the signing key. The seed
    /// buffer is zeroized on every exit path.
    fn signing_key(&self, encrypted: &EncryptedEnvelope) -> Result<SigningKey, CustodyError> {
        let plaintext = self
            .envelope
            .decrypt(encrypted)
            .map_err(|_| CustodyError::SigningFailed)?;
        if plaintext.len() != ed25519_dalek::SECRET_KEY_LENGTH {
            return Err(CustodyError::SigningFailed);
        }

        let mut seed = Zeroizing::new([0u8; ed25519_dalek::SECRET_KEY_LENGTH]);
        seed.copy_from_slice(&plaintext);
        Ok(SigningKey::from_bytes(&seed))
    }
}

impl KeyProvider for Ed25519Provider {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Ed25519
    }

    fn generate_key_pair(&self) -> Result<KeyPair, CustodyError> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key = hex::encode(signing_key.verifying_key().to_bytes());
        let private_key_material = Zeroizing::new(signing_key.to_bytes().to_vec());

        Ok(KeyPair {
            public_key,
            private_key_material,
            algorithm: Algorithm::Ed25519,
        })
    }

    fn sign(&self, encrypted: &EncryptedEnvelope, data: &[u8]) -> Result<Signature, CustodyError> {
        let signing_key = self.signing_key(encrypted)?;
        let signature = signing_key.sign(data);

        Ok(Signature {
            bytes: signature.to_bytes().to_vec(),
            public_key: hex::encode(signing_key.verifying_key().to_bytes()),
            algorithm: Algorithm::Ed25519,
            timestamp: Utc::now(),
        })
    }

    fn validate_key_pair(&self, public_key: &str, encrypted: &EncryptedEnvelope) -> bool {
        let Ok(signature) = self.sign(encrypted, VALIDATION_PROBE) else {
            return false;
        };
        if !signature.public_key.eq_ignore_ascii_case(public_key) {
            return false;
        }

        // Cross-check against the claimed key, not just the derived one.
        let Ok(key_bytes) = hex::decode(public_key) else {
            return false;
        };
        let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes) else {
            return false;
        };
        let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(dalek_sig) = DalekSignature::from_slice(&signature.bytes) else {
            return false;
        };
        verifying_key.verify(VALIDATION_PROBE, &dalek_sig).is_ok()
    }
}

/// Registry of providers keyed by algorithm.
///
/// A hardware- or KMS-backed provider is a drop-in registration, not an
/// orchestrator change.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<Algorithm, Arc<dyn KeyProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the software Ed25519 provider.
    pub fn with_defaults(envelope: Arc<EnvelopeService>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(Ed25519Provider::new(envelope)));
        registry
    }

    pub fn register(&mut self, provider: Arc<dyn KeyProvider>) {
        self.providers.insert(provider.algorithm(), provider);
    }

    pub fn get(&self, algorithm: Algorithm) -> Result<&Arc<dyn KeyProvider>, CustodyError> {
        self.providers
            .get(&algorithm)
            .ok_or_else(|| CustodyError::UnsupportedAlgorithm(algorithm.to_string()))
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded).map_err(serde::de::Error::custom)
    }
}
