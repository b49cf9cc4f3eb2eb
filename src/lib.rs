// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! # Custody Core
//!
//! Custodial key and wallet lifecycle engine. Wallets are provisioned
//! transparently on behalf of users; private keys are generated inside
//! the core, sealed with envelope encryption before they touch storage,
//! and never leave through a response type.
//!
//! ## Modules
//!
//! - [`config`]: master-secret loading and validation
//! - [`crypto`]: envelope encryption and key providers
//! - [`lifecycle`]: wallet status state machine
//! - [`models`]: persisted records and result types
//! - [`storage`]: embedded database and repositories
//! - [`idempotency`]: creation replay cache
//! - [`audit`]: bounded secrets-free audit trail
//! - [`orchestrator`]: the wallet operation entry point
//!
//! ## Configuration
//!
//! | Variable | Purpose |
//! |----------|---------|
//! | `CUSTODY_MASTER_KEY` | Master secret for envelope encryption (min 32 bytes) |
//! | `MASTER_ENCRYPTION_KEY` | Fallback name for the master secret |
//! | `WALLET_MASTER_KEY` | Fallback name for the master secret |

pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod idempotency;
pub mod lifecycle;
pub mod models;
pub mod orchestrator;
pub mod storage;

pub use audit::{AuditLog, KeyOperation, KeyOperationAudit};
pub use config::{MasterKeyError, MasterSecret};
pub use crypto::{
    Algorithm, DecryptionError, EncryptedEnvelope, EncryptionError, EnvelopeService, KeyPair,
    KeyProvider, ProviderRegistry, Signature,
};
pub use error::CustodyError;
pub use idempotency::IdempotencyCache;
pub use lifecycle::WalletStatus;
pub use models::{Network, User, Wallet, WalletCreationResult, WalletView};
pub use orchestrator::WalletOrchestrator;
pub use storage::{CustodyDb, StoreError};
