// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Persistence layer: embedded database and repositories.

pub mod db;
pub mod repository;

pub use db::{CustodyDb, StoreError, StoreResult};
pub use repository::{UserRepository, WalletRepository};
