// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! # Runtime Configuration
//!
//! This module defines environment variable names and the master-secret
//! loading path. Configuration is loaded from the environment once at
//! startup; a missing or undersized master secret is a fatal startup
//! error, never a per-request error.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CUSTODY_MASTER_KEY` | Master encryption secret (preferred) | Required |
//! | `MASTER_ENCRYPTION_KEY` | Master encryption secret (fallback) | none |
//! | `WALLET_MASTER_KEY` | Master encryption secret (legacy fallback) | none |
//! | `RUST_LOG` | Log level filter for the host process | `info` |

use std::env;

use zeroize::Zeroizing;

/// Environment variable names accepted for the master secret, checked in
/// order. The first one that is set wins.
pub const MASTER_KEY_ENV_VARS: [&str; 3] = [
    "CUSTODY_MASTER_KEY",
    "MASTER_ENCRYPTION_KEY",
    "WALLET_MASTER_KEY",
];

/// Minimum accepted master secret length in bytes.
pub const MIN_MASTER_SECRET_LEN: usize = 32;

/// Fatal startup errors for master-secret loading.
#[derive(Debug, thiserror::Error)]
pub enum MasterKeyError {
    #[error("master secret not configured (set one of {})", MASTER_KEY_ENV_VARS.join(", "))]
    Missing,

    #[error("master secret too short: {len} bytes (minimum {MIN_MASTER_SECRET_LEN})")]
    TooShort { len: usize },
}

/// Process-wide master encryption secret.
///
/// Read-only after construction, wiped from memory on drop. The secret
/// itself is never logged, serialized, or exposed through `Debug`.
pub struct MasterSecret(Zeroizing<Vec<u8>>);

impl MasterSecret {
    /// Wrap raw secret bytes, enforcing the minimum length.
    pub fn new(bytes: Vec<u8>) -> Result<Self, MasterKeyError> {
        let bytes = Zeroizing::new(bytes);
        if bytes.len() < MIN_MASTER_SECRET_LEN {
            return Err(MasterKeyError::TooShort { len: bytes.len() });
        }
        Ok(Self(bytes))
    }

    /// Load the master secret from the environment.
    ///
    /// Checks [`MASTER_KEY_ENV_VARS`] in order and takes the first
    /// variable that is set. Fails fast if none is set or the value is
    /// shorter than [`MIN_MASTER_SECRET_LEN`].
    pub fn from_env() -> Result<Self, MasterKeyError> {
        for name in MASTER_KEY_ENV_VARS {
            if let Ok(value) = env::var(name) {
                return Self::new(value.into_bytes());
            }
        }
        Err(MasterKeyError::Missing)
    }

    /// Borrow the raw secret bytes for key derivation.
    pub(crate) fn expose(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterSecret(<redacted>)")
    }
}
