// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Cryptographic core: envelope encryption and key providers.

pub mod envelope;
pub mod provider;

pub use envelope::{
    DecryptionError, EncryptedEnvelope, EncryptionError, EnvelopeService, ENVELOPE_VERSION,
    ENVELOPE_VERSION_LEGACY,
};
pub use provider::{
    Algorithm, Ed25519Provider, KeyPair, KeyProvider, ProviderRegistry, Signature,
};
