// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Wallet orchestrator: the single entry point for wallet creation,
//! signing, key rotation, validation, and lifecycle changes.
//!
//! ## Creation Protocol
//!
//! 1. Replay check against the idempotency cache.
//! 2. User existence check (no side effects on failure).
//! 3. Existing-wallet check for the `(user, network)` pair.
//! 4. Key generation, envelope sealing, atomic insert.
//! 5. Audit record and cache fill, after commit only.
//!
//! Two callers racing step 3 both see "no wallet"; the storage
//! uniqueness constraint picks the winner and the loser re-fetches the
//! committed row. Either way the caller gets the same wallet back.

use std::sync::Arc;

use zeroize::Zeroizing;

use crate::audit::{AuditLog, KeyOperation, KeyOperationAudit};
use crate::crypto::envelope::{EnvelopeService, ENVELOPE_VERSION};
use crate::crypto::provider::{Algorithm, ProviderRegistry, Signature};
use crate::error::CustodyError;
use crate::idempotency::IdempotencyCache;
use crate::lifecycle::{self, WalletStatus};
use crate::models::{Network, Wallet, WalletCreationResult, WalletView};
use crate::storage::db::{CustodyDb, StoreError};
use crate::storage::repository::{UserRepository, WalletRepository};

pub struct WalletOrchestrator {
    db: Arc<CustodyDb>,
    envelope: Arc<EnvelopeService>,
    registry: ProviderRegistry,
    audit: AuditLog,
    idempotency: IdempotencyCache,
}

impl WalletOrchestrator {
    /// Orchestrator with the default software providers, audit capacity
    /// and idempotency window.
    pub fn new(db: Arc<CustodyDb>, envelope: Arc<EnvelopeService>) -> Self {
        let registry = ProviderRegistry::with_defaults(Arc::clone(&envelope));
        Self::with_registry(db, envelope, registry)
    }

    /// Orchestrator with a caller-supplied provider registry, e.g. one
    /// holding hardware-backed providers.
    pub fn with_registry(
        db: Arc<CustodyDb>,
        envelope: Arc<EnvelopeService>,
        registry: ProviderRegistry,
    ) -> Self {
        Self {
            db,
            envelope,
            registry,
            audit: AuditLog::default(),
            idempotency: IdempotencyCache::default(),
        }
    }

    /// Create the wallet for `(user_id, network)`, or return the
    /// existing one.
    ///
    /// Idempotent: only the call that actually creates the wallet gets
    /// `is_new_wallet = true` and the raw private key; every later call
    /// observes the same wallet with neither.
    pub fn create_wallet(
        &self,
        user_id: &str,
        network: Network,
        idempotency_key: Option<&str>,
    ) -> Result<WalletCreationResult, CustodyError> {
        if let Some(key) = idempotency_key {
            if let Some(cached) = self.idempotency.get(key) {
                tracing::debug!(user_id, %network, "wallet creation replayed from idempotency cache");
                return Ok(cached);
            }
        }

        let users = UserRepository::new(&self.db);
        if !users.exists(user_id)? {
            return Err(CustodyError::UserNotFound {
                user_id: user_id.to_string(),
            });
        }

        let wallets = WalletRepository::new(&self.db);
        if let Some(existing) = wallets.find_by_user_and_network(user_id, network)? {
            return Ok(existing_wallet_result(&existing));
        }

        let provider = self.registry.get(Algorithm::Ed25519)?;
        let pair = provider.generate_key_pair().map_err(|e| {
            self.audit.record(KeyOperationAudit::failure(
                KeyOperation::Generate,
                None,
                "key generation failed",
            ));
            e
        })?;
        let encrypted_secret = self.envelope.encrypt(&pair.private_key_material)?;
        let raw_private_key = Zeroizing::new(hex::encode(&*pair.private_key_material));

        let now = chrono::Utc::now();
        let wallet = Wallet {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            public_key: pair.public_key.clone(),
            algorithm: pair.algorithm,
            encrypted_secret,
            encryption_version: ENVELOPE_VERSION,
            secret_version: 1,
            network,
            status: WalletStatus::Active,
            status_reason: None,
            status_changed_at: now,
            rotated_from_id: None,
            created_at: now,
            updated_at: now,
        };

        match wallets.insert_unique(&wallet) {
            Ok(()) => {}
            Err(StoreError::UniqueConstraintViolation { constraint }) => {
                // Lost a creation race; the winner's row is committed.
                tracing::warn!(user_id, %network, constraint, "wallet creation race detected, returning committed wallet");
                let existing = wallets
                    .find_by_user_and_network(user_id, network)?
                    .ok_or_else(|| {
                        CustodyError::CreationFailed(
                            "constraint violated but no committed wallet found".to_string(),
                        )
                    })?;
                return Ok(existing_wallet_result(&existing));
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id, %network, wallet_id = %wallet.id, "wallet created");
        self.audit
            .record(KeyOperationAudit::success(KeyOperation::Generate, &wallet.public_key));

        let result = WalletCreationResult {
            wallet: WalletView::from(&wallet),
            raw_private_key: Some(raw_private_key),
            is_new_wallet: true,
        };
        if let Some(key) = idempotency_key {
            self.idempotency.put(key, result.clone());
        }
        Ok(result)
    }

    /// Fetch the wallet for `(user_id, network)`, if any.
    pub fn get_wallet_by_user(
        &self,
        user_id: &str,
        network: Network,
    ) -> Result<Option<WalletView>, CustodyError> {
        let wallets = WalletRepository::new(&self.db);
        Ok(wallets
            .find_by_user_and_network(user_id, network)?
            .as_ref()
            .map(WalletView::from))
    }

    /// Fetch a wallet by id.
    pub fn get_wallet(&self, wallet_id: &str) -> Result<WalletView, CustodyError> {
        let wallet = self.load_wallet(wallet_id)?;
        Ok(WalletView::from(&wallet))
    }

    /// Sign `payload` with the wallet's sealed key.
    ///
    /// Only `Active` wallets may sign; the key exists in plaintext only
    /// inside the provider call.
    pub fn sign(&self, wallet_id: &str, payload: &[u8]) -> Result<Signature, CustodyError> {
        let wallet = self.load_wallet(wallet_id)?;

        if wallet.status != WalletStatus::Active {
            self.audit.record(KeyOperationAudit::failure(
                KeyOperation::Sign,
                Some(&wallet.public_key),
                format!("wallet not active: {}", wallet.status),
            ));
            return Err(CustodyError::WalletNotActive {
                wallet_id: wallet.id,
                status: wallet.status,
            });
        }

        let provider = self.registry.get(wallet.algorithm)?;
        match provider.sign(&wallet.encrypted_secret, payload) {
            Ok(signature) => {
                self.audit
                    .record(KeyOperationAudit::success(KeyOperation::Sign, &wallet.public_key));
                Ok(signature)
            }
            Err(_) => {
                self.audit.record(KeyOperationAudit::failure(
                    KeyOperation::Sign,
                    Some(&wallet.public_key),
                    "signing failed",
                ));
                Err(CustodyError::SigningFailed)
            }
        }
    }

    /// Rotate the wallet's key material in place.
    ///
    /// The wallet passes through `Rotating` and returns to `Active`
    /// with a fresh keypair, `secret_version + 1`, and a lineage marker.
    /// Terminal wallets reject the transition and keep their record
    /// untouched.
    pub fn rotate_key(&self, wallet_id: &str) -> Result<WalletCreationResult, CustodyError> {
        let wallet = self.load_wallet(wallet_id)?;
        let previous_key = wallet.public_key.clone();

        let mut rotating = lifecycle::transition(&wallet, WalletStatus::Rotating, Some("key rotation"))?;

        let provider = self.registry.get(wallet.algorithm)?;
        let pair = provider.generate_key_pair().map_err(|e| {
            self.audit.record(KeyOperationAudit::failure(
                KeyOperation::Rotate,
                Some(&previous_key),
                "key generation failed",
            ));
            e
        })?;
        let encrypted_secret = self.envelope.encrypt(&pair.private_key_material)?;
        let raw_private_key = Zeroizing::new(hex::encode(&*pair.private_key_material));

        rotating.public_key = pair.public_key;
        rotating.encrypted_secret = encrypted_secret;
        rotating.encryption_version = ENVELOPE_VERSION;
        rotating.secret_version = wallet.secret_version + 1;
        rotating.rotated_from_id = Some(wallet.id.clone());

        let rotated =
            lifecycle::transition(&rotating, WalletStatus::Active, Some("rotation complete"))?;
        let wallets = WalletRepository::new(&self.db);
        wallets.update(&rotated)?;

        tracing::info!(
            wallet_id = %rotated.id,
            secret_version = rotated.secret_version,
            "wallet key rotated"
        );
        self.audit
            .record(KeyOperationAudit::success(KeyOperation::Rotate, &rotated.public_key));

        Ok(WalletCreationResult {
            wallet: WalletView::from(&rotated),
            raw_private_key: Some(raw_private_key),
            is_new_wallet: false,
        })
    }

    /// Check that the wallet's sealed material matches its public key.
    pub fn validate_wallet_key(&self, wallet_id: &str) -> Result<bool, CustodyError> {
        let wallet = self.load_wallet(wallet_id)?;
        let provider = self.registry.get(wallet.algorithm)?;

        let valid = provider.validate_key_pair(&wallet.public_key, &wallet.encrypted_secret);
        let entry = if valid {
            KeyOperationAudit::success(KeyOperation::Validate, &wallet.public_key)
        } else {
            KeyOperationAudit::failure(
                KeyOperation::Validate,
                Some(&wallet.public_key),
                "key validation failed",
            )
        };
        self.audit.record(entry);
        Ok(valid)
    }

    /// Apply a lifecycle transition and persist the result.
    pub fn transition_wallet(
        &self,
        wallet_id: &str,
        to: WalletStatus,
        reason: Option<&str>,
    ) -> Result<WalletView, CustodyError> {
        let wallet = self.load_wallet(wallet_id)?;
        let next = lifecycle::transition(&wallet, to, reason)?;

        let wallets = WalletRepository::new(&self.db);
        wallets.update(&next)?;

        tracing::info!(wallet_id, from = %wallet.status, %to, "wallet status changed");
        Ok(WalletView::from(&next))
    }

    /// Most recent audit entries, newest first.
    pub fn audit_log(&self, limit: usize) -> Vec<KeyOperationAudit> {
        self.audit.query(limit)
    }

    fn load_wallet(&self, wallet_id: &str) -> Result<Wallet, CustodyError> {
        let wallets = WalletRepository::new(&self.db);
        wallets
            .find_by_id(wallet_id)?
            .ok_or_else(|| CustodyError::WalletNotFound {
                wallet_id: wallet_id.to_string(),
            })
    }
}

fn existing_wallet_result(wallet: &Wallet) -> WalletCreationResult {
    WalletCreationResult {
        wallet: WalletView::from(wallet),
        raw_private_key: None,
        is_new_wallet: false,
    }
}
