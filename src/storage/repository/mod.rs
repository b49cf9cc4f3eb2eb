// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Repositories over the embedded custody database.

pub mod users;
pub mod wallets;

pub use users::UserRepository;
pub use wallets::WalletRepository;
