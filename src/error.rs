// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Crate-wide error taxonomy.
//!
//! Races on wallet creation and idempotency-cache hits are recovered
//! inside the orchestrator and never surface here. Cryptographic
//! failures always surface, with deliberately generic message text and
//! no secret material in any `Display` output.

use crate::crypto::envelope::{DecryptionError, EncryptionError};
use crate::lifecycle::WalletStatus;
use crate::storage::db::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    /// Caller error: the referenced user does not exist. No side effects.
    #[error("user not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("wallet not found: {wallet_id}")]
    WalletNotFound { wallet_id: String },

    /// Signing was requested while the wallet is not `Active`.
    #[error("wallet {wallet_id} is not active (status: {status})")]
    WalletNotActive {
        wallet_id: String,
        status: WalletStatus,
    },

    /// Wallet creation failed after the user check; no partial state
    /// remains.
    #[error("wallet creation failed: {0}")]
    CreationFailed(String),

    /// Disallowed lifecycle transition; rejected, never coerced.
    #[error("invalid wallet transition: {from} -> {to}")]
    InvalidTransition { from: WalletStatus, to: WalletStatus },

    #[error("unsupported key algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Opaque signing failure. Never reveals whether decryption or the
    /// signature itself failed.
    #[error("signing failed")]
    SigningFailed,

    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    #[error(transparent)]
    Encryption(#[from] EncryptionError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
