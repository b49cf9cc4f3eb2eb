// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! User repository.
//!
//! The custody core only ever reads users; `insert` exists as the seam
//! through which the account-management collaborator (and tests) seed
//! them.

use redb::{ReadableDatabase, ReadableTable};

use super::super::db::{CustodyDb, StoreError, StoreResult, USERS};
use crate::models::User;

pub struct UserRepository<'a> {
    db: &'a CustodyDb,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a CustodyDb) -> Self {
        Self { db }
    }

    /// Look up a user by id.
    pub fn find_by_id(&self, user_id: &str) -> StoreResult<Option<User>> {
        let read_txn = self.db.handle().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(user_id)? {
            Some(value) => {
                let user: User = serde_json::from_slice(value.value())?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    /// Check user existence without deserializing the record.
    pub fn exists(&self, user_id: &str) -> StoreResult<bool> {
        let read_txn = self.db.handle().begin_read()?;
        let table = read_txn.open_table(USERS)?;
        Ok(table.get(user_id)?.is_some())
    }

    /// Insert a new user. Fails if the id is already taken.
    pub fn insert(&self, user: &User) -> StoreResult<()> {
        let json = serde_json::to_vec(user)?;

        let write_txn = self.db.handle().begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            if table.get(user.user_id.as_str())?.is_some() {
                return Err(StoreError::UniqueConstraintViolation { constraint: "users" });
            }
            table.insert(user.user_id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db() -> (CustodyDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = CustodyDb::open(&dir.path().join("test.redb")).unwrap();
        (db, dir)
    }

    #[test]
    fn insert_and_find_user() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);

        repo.insert(&User::new("user-1")).unwrap();

        let found = repo.find_by_id("user-1").unwrap().unwrap();
        assert_eq!(found.user_id, "user-1");
        assert!(repo.exists("user-1").unwrap());
        assert!(!repo.exists("user-2").unwrap());
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);

        repo.insert(&User::new("user-1")).unwrap();
        let result = repo.insert(&User::new("user-1"));
        assert!(matches!(
            result,
            Err(StoreError::UniqueConstraintViolation { constraint: "users" })
        ));
    }

    #[test]
    fn missing_user_is_none() {
        let (db, _dir) = temp_db();
        let repo = UserRepository::new(&db);
        assert!(repo.find_by_id("ghost").unwrap().is_none());
    }
}
