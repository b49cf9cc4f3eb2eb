// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Embedded custody database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized User
//! - `wallets`: wallet_id → serialized Wallet
//! - `wallet_by_user`: composite key (user_id|network) → wallet_id
//! - `public_keys`: public_key → wallet_id
//!
//! `wallet_by_user` enforces "one wallet per user per network" at the
//! storage layer; `public_keys` enforces that a public key is never
//! reused, across rotations included (entries are never deleted).

use std::path::Path;

use redb::{Database, TableDefinition};

use crate::models::Network;

/// Primary table: user_id → User JSON bytes.
pub(crate) const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Primary table: wallet_id → Wallet JSON bytes.
pub(crate) const WALLETS: TableDefinition<&str, &[u8]> = TableDefinition::new("wallets");

/// Uniqueness index: `user_id|network` → wallet_id.
pub(crate) const WALLET_BY_USER: TableDefinition<&str, &str> =
    TableDefinition::new("wallet_by_user");

/// Uniqueness index: public_key → wallet_id. Append-only.
pub(crate) const PUBLIC_KEYS: TableDefinition<&str, &str> = TableDefinition::new("public_keys");

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A storage-level uniqueness constraint rejected the write. Wallet
    /// creation races land here and are recovered by the orchestrator.
    #[error("unique constraint violated: {constraint}")]
    UniqueConstraintViolation { constraint: &'static str },

    #[error("not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Build the composite key for the `wallet_by_user` index.
pub(crate) fn user_wallet_key(user_id: &str, network: Network) -> String {
    format!("{user_id}|{network}")
}

/// Embedded ACID store for users and custodial wallets.
pub struct CustodyDb {
    db: Database,
}

impl CustodyDb {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(WALLETS)?;
            let _ = write_txn.open_table(WALLET_BY_USER)?;
            let _ = write_txn.open_table(PUBLIC_KEYS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Raw database handle for the repositories in this module tree.
    pub(crate) fn handle(&self) -> &Database {
        &self.db
    }
}
