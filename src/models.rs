// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! # Domain Models
//!
//! Persisted records and result types for the custody core. The
//! [`Wallet`] record carries the encrypted secret; the [`WalletView`]
//! returned to collaborators structurally cannot, so key material can
//! never leak through a response type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::envelope::EncryptedEnvelope;
use crate::crypto::provider::Algorithm;
use crate::lifecycle::WalletStatus;

/// Ledger network a wallet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user that wallets are custodied for. Account management itself is a
/// collaborator concern; the core only reads this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// Custodial wallet record.
///
/// At most one wallet exists per `(user_id, network)`; `public_key` is
/// globally unique and never reused; `secret_version` increments only on
/// rotation. Only the orchestrator writes this record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet identifier (UUID).
    pub id: String,
    /// Owning user (1:1 per network).
    pub user_id: String,
    /// Hex-encoded public key.
    pub public_key: String,
    /// Signing algorithm of the key pair.
    pub algorithm: Algorithm,
    /// Private key material, encrypted at rest.
    pub encrypted_secret: EncryptedEnvelope,
    /// Envelope format version the secret was sealed with.
    pub encryption_version: u32,
    /// Monotonic; incremented only by rotation.
    pub secret_version: u32,
    pub network: Network,
    pub status: WalletStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    pub status_changed_at: DateTime<Utc>,
    /// Lineage marker set by key rotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotated_from_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wallet representation for collaborators (never includes the encrypted
/// secret).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletView {
    pub id: String,
    pub user_id: String,
    pub public_key: String,
    pub algorithm: Algorithm,
    pub network: Network,
    pub status: WalletStatus,
    pub secret_version: u32,
    pub created_at: DateTime<Utc>,
}

impl From<&Wallet> for WalletView {
    fn from(wallet: &Wallet) -> Self {
        Self {
            id: wallet.id.clone(),
            user_id: wallet.user_id.clone(),
            public_key: wallet.public_key.clone(),
            algorithm: wallet.algorithm,
            network: wallet.network,
            status: wallet.status,
            secret_version: wallet.secret_version,
            created_at: wallet.created_at,
        }
    }
}

/// Outcome of `create_wallet` / `rotate_key`.
///
/// `raw_private_key` is populated exactly once, for the call that created
/// the key material; it is hex-encoded and wiped from memory on drop.
#[derive(Clone)]
pub struct WalletCreationResult {
    pub wallet: WalletView,
    pub raw_private_key: Option<Zeroizing<String>>,
    pub is_new_wallet: bool,
}

impl std::fmt::Debug for WalletCreationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletCreationResult")
            .field("wallet", &self.wallet)
            .field(
                "raw_private_key",
                &self.raw_private_key.as_ref().map(|_| "<redacted>"),
            )
            .field("is_new_wallet", &self.is_new_wallet)
            .finish()
    }
}
