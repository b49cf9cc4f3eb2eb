// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Wallet repository.
//!
//! `insert_unique` is the storage half of the "one wallet per user per
//! network" invariant: the index check and all inserts happen in one
//! write transaction, so two racing creations cannot both commit. The
//! loser sees [`StoreError::UniqueConstraintViolation`] and the
//! orchestrator converts that into the existing-wallet outcome.

use redb::{ReadableDatabase, ReadableTable};

use super::super::db::{
    user_wallet_key, CustodyDb, StoreError, StoreResult, PUBLIC_KEYS, WALLETS, WALLET_BY_USER,
};
use crate::models::{Network, Wallet};

pub struct WalletRepository<'a> {
    db: &'a CustodyDb,
}

impl<'a> WalletRepository<'a> {
    pub fn new(db: &'a CustodyDb) -> Self {
        Self { db }
    }

    /// Look up a wallet by id.
    pub fn find_by_id(&self, wallet_id: &str) -> StoreResult<Option<Wallet>> {
        let read_txn = self.db.handle().begin_read()?;
        let table = read_txn.open_table(WALLETS)?;
        match table.get(wallet_id)? {
            Some(value) => {
                let wallet: Wallet = serde_json::from_slice(value.value())?;
                Ok(Some(wallet))
            }
            None => Ok(None),
        }
    }

    /// Look up the wallet for a `(user, network)` pair via the
    /// uniqueness index.
    pub fn find_by_user_and_network(
        &self,
        user_id: &str,
        network: Network,
    ) -> StoreResult<Option<Wallet>> {
        let read_txn = self.db.handle().begin_read()?;
        let by_user = read_txn.open_table(WALLET_BY_USER)?;
        let key = user_wallet_key(user_id, network);

        let wallet_id = match by_user.get(key.as_str())? {
            Some(value) => value.value().to_string(),
            None => return Ok(None),
        };

        let wallets = read_txn.open_table(WALLETS)?;
        match wallets.get(wallet_id.as_str())? {
            Some(value) => {
                let wallet: Wallet = serde_json::from_slice(value.value())?;
                Ok(Some(wallet))
            }
            None => Ok(None),
        }
    }

    /// Insert a new wallet atomically, enforcing both uniqueness
    /// constraints.
    ///
    /// Either every table is updated and committed, or the transaction
    /// aborts leaving no partial row.
    pub fn insert_unique(&self, wallet: &Wallet) -> StoreResult<()> {
        let json = serde_json::to_vec(wallet)?;
        let key = user_wallet_key(&wallet.user_id, wallet.network);

        let write_txn = self.db.handle().begin_write()?;
        {
            let mut by_user = write_txn.open_table(WALLET_BY_USER)?;
            if by_user.get(key.as_str())?.is_some() {
                return Err(StoreError::UniqueConstraintViolation {
                    constraint: "wallet_by_user",
                });
            }

            let mut public_keys = write_txn.open_table(PUBLIC_KEYS)?;
            if public_keys.get(wallet.public_key.as_str())?.is_some() {
                return Err(StoreError::UniqueConstraintViolation {
                    constraint: "public_keys",
                });
            }

            by_user.insert(key.as_str(), wallet.id.as_str())?;
            public_keys.insert(wallet.public_key.as_str(), wallet.id.as_str())?;

            let mut wallets = write_txn.open_table(WALLETS)?;
            wallets.insert(wallet.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Update an existing wallet record.
    ///
    /// When rotation replaced the public key, the new key is pinned in
    /// the `public_keys` index; prior entries are never removed, so a
    /// retired key can never be reused by a later wallet.
    pub fn update(&self, wallet: &Wallet) -> StoreResult<()> {
        let json = serde_json::to_vec(wallet)?;

        let write_txn = self.db.handle().begin_write()?;
        {
            let mut wallets = write_txn.open_table(WALLETS)?;
            let previous_key = {
                let existing = wallets.get(wallet.id.as_str())?.ok_or_else(|| {
                    StoreError::NotFound(format!("wallet {}", wallet.id))
                })?;
                let stored: Wallet = serde_json::from_slice(existing.value())?;
                stored.public_key
            };

            if previous_key != wallet.public_key {
                let mut public_keys = write_txn.open_table(PUBLIC_KEYS)?;
                if let Some(owner) = public_keys.get(wallet.public_key.as_str())? {
                    if owner.value() != wallet.id {
                        return Err(StoreError::UniqueConstraintViolation {
                            constraint: "public_keys",
                        });
                    }
                }
                public_keys.insert(wallet.public_key.as_str(), wallet.id.as_str())?;
            }

            wallets.insert(wallet.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::WalletStatus;
    use crate::models::test_fixtures::wallet_with_status;

    fn temp_db() -> (CustodyDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = CustodyDb::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    fn sample_wallet(user_id: &str, public_key_byte: u8) -> Wallet {
        let mut wallet = wallet_with_status(WalletStatus::Active);
        wallet.user_id = user_id.to_string();
        wallet.public_key = hex::encode([public_key_byte; 32]);
        wallet
    }

    #[test]
    fn insert_and_find_wallet() {
        let (db, _dir) = temp_db();
        let repo = WalletRepository::new(&db);

        let wallet = sample_wallet("user-1", 0x11);
        repo.insert_unique(&wallet).unwrap();

        let by_id = repo.find_by_id(&wallet.id).unwrap().unwrap();
        assert_eq!(by_id.public_key, wallet.public_key);

        let by_user = repo
            .find_by_user_and_network("user-1", wallet.network)
            .unwrap()
            .unwrap();
        assert_eq!(by_user.id, wallet.id);
    }

    #[test]
    fn second_wallet_for_same_user_and_network_is_rejected() {
        let (db, _dir) = temp_db();
        let repo = WalletRepository::new(&db);

        repo.insert_unique(&sample_wallet("user-1", 0x11)).unwrap();
        let result = repo.insert_unique(&sample_wallet("user-1", 0x22));

        assert!(matches!(
            result,
            Err(StoreError::UniqueConstraintViolation {
                constraint: "wallet_by_user"
            })
        ));
    }

    #[test]
    fn rejected_insert_leaves_no_partial_row() {
        let (db, _dir) = temp_db();
        let repo = WalletRepository::new(&db);

        let first = sample_wallet("user-1", 0x11);
        repo.insert_unique(&first).unwrap();

        let second = sample_wallet("user-1", 0x22);
        assert!(repo.insert_unique(&second).is_err());

        // The losing wallet id and public key must not exist anywhere.
        assert!(repo.find_by_id(&second.id).unwrap().is_none());
        let survivor = repo
            .find_by_user_and_network("user-1", first.network)
            .unwrap()
            .unwrap();
        assert_eq!(survivor.id, first.id);
    }

    #[test]
    fn duplicate_public_key_is_rejected() {
        let (db, _dir) = temp_db();
        let repo = WalletRepository::new(&db);

        repo.insert_unique(&sample_wallet("user-1", 0x11)).unwrap();
        let result = repo.insert_unique(&sample_wallet("user-2", 0x11));

        assert!(matches!(
            result,
            Err(StoreError::UniqueConstraintViolation {
                constraint: "public_keys"
            })
        ));
    }

    #[test]
    fn same_user_different_network_is_allowed() {
        let (db, _dir) = temp_db();
        let repo = WalletRepository::new(&db);

        let testnet = sample_wallet("user-1", 0x11);
        let mut mainnet = sample_wallet("user-1", 0x22);
        mainnet.network = Network::Mainnet;

        repo.insert_unique(&testnet).unwrap();
        repo.insert_unique(&mainnet).unwrap();

        assert!(repo
            .find_by_user_and_network("user-1", Network::Mainnet)
            .unwrap()
            .is_some());
        assert!(repo
            .find_by_user_and_network("user-1", Network::Testnet)
            .unwrap()
            .is_some());
    }

    #[test]
    fn update_pins_rotated_public_key() {
        let (db, _dir) = temp_db();
        let repo = WalletRepository::new(&db);

        let wallet = sample_wallet("user-1", 0x11);
        repo.insert_unique(&wallet).unwrap();

        let mut rotated = wallet.clone();
        rotated.public_key = hex::encode([0x33u8; 32]);
        rotated.secret_version = 2;
        repo.update(&rotated).unwrap();

        let stored = repo.find_by_id(&wallet.id).unwrap().unwrap();
        assert_eq!(stored.secret_version, 2);
        assert_eq!(stored.public_key, rotated.public_key);

        // The retired key stays pinned: a new wallet cannot take it.
        let reuse = repo.insert_unique(&sample_wallet("user-2", 0x11));
        assert!(matches!(
            reuse,
            Err(StoreError::UniqueConstraintViolation {
                constraint: "public_keys"
            })
        ));
    }

    #[test]
    fn update_missing_wallet_is_not_found() {
        let (db, _dir) = temp_db();
        let repo = WalletRepository::new(&db);
        let ghost = sample_wallet("user-1", 0x44);
        assert!(matches!(repo.update(&ghost), Err(StoreError::NotFound(_))));
    }
}
