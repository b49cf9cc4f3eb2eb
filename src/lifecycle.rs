// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Wallet lifecycle state machine.
//!
//! Pure transition rules over [`WalletStatus`], no I/O. Callers persist
//! the result themselves, which keeps the rules testable in isolation.
//!
//! `Disabled` and `Compromised` are terminal: once a wallet enters either
//! state it can never be reactivated. That is a safety property, not a
//! convenience.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::CustodyError;
use crate::models::Wallet;

/// Lifecycle status of a custodial wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletStatus {
    /// Creation in progress; key material not yet committed.
    Provisioning,
    /// Wallet can sign.
    Active,
    /// Key rotation in progress.
    Rotating,
    /// Temporarily blocked (e.g. pending review).
    Suspended,
    /// Permanently retired. Terminal.
    Disabled,
    /// Key material suspected leaked. Terminal.
    Compromised,
}

impl WalletStatus {
    /// All statuses, for exhaustive checks in tests.
    pub const ALL: [WalletStatus; 6] = [
        WalletStatus::Provisioning,
        WalletStatus::Active,
        WalletStatus::Rotating,
        WalletStatus::Suspended,
        WalletStatus::Disabled,
        WalletStatus::Compromised,
    ];

    /// Whether no outbound transition exists from this status.
    pub fn is_terminal(self) -> bool {
        matches!(self, WalletStatus::Disabled | WalletStatus::Compromised)
    }
}

impl std::fmt::Display for WalletStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WalletStatus::Provisioning => "provisioning",
            WalletStatus::Active => "active",
            WalletStatus::Rotating => "rotating",
            WalletStatus::Suspended => "suspended",
            WalletStatus::Disabled => "disabled",
            WalletStatus::Compromised => "compromised",
        };
        f.write_str(s)
    }
}

/// Whether `from -> to` is an allowed lifecycle transition.
pub fn can_transition(from: WalletStatus, to: WalletStatus) -> bool {
    use WalletStatus::*;
    matches!(
        (from, to),
        (Provisioning, Active | Suspended | Disabled)
            | (Active, Rotating | Suspended | Disabled | Compromised)
            | (Rotating, Active | Suspended | Disabled | Compromised)
            | (Suspended, Active | Disabled | Compromised)
    )
}

/// Apply a lifecycle transition, returning the updated wallet record.
///
/// Fails with [`CustodyError::InvalidTransition`] if the transition is
/// not allowed; the input wallet is never mutated.
pub fn transition(
    wallet: &Wallet,
    to: WalletStatus,
    reason: Option<&str>,
) -> Result<Wallet, CustodyError> {
    if !can_transition(wallet.status, to) {
        return Err(CustodyError::InvalidTransition {
            from: wallet.status,
            to,
        });
    }

    let now = Utc::now();
    let mut next = wallet.clone();
    next.status = to;
    next.status_reason = reason.map(str::to_owned);
    next.status_changed_at = now;
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_fixtures::wallet_with_status;

    #[test]
    fn provisioning_activates() {
        assert!(can_transition(WalletStatus::Provisioning, WalletStatus::Active));
        assert!(!can_transition(WalletStatus::Provisioning, WalletStatus::Rotating));
        assert!(!can_transition(WalletStatus::Provisioning, WalletStatus::Compromised));
    }

    #[test]
    fn active_can_rotate_suspend_disable_compromise() {
        for to in [
            WalletStatus::Rotating,
            WalletStatus::Suspended,
            WalletStatus::Disabled,
            WalletStatus::Compromised,
        ] {
            assert!(can_transition(WalletStatus::Active, to));
        }
        assert!(!can_transition(WalletStatus::Active, WalletStatus::Provisioning));
    }

    #[test]
    fn suspended_can_reactivate() {
        assert!(can_transition(WalletStatus::Suspended, WalletStatus::Active));
        assert!(!can_transition(WalletStatus::Suspended, WalletStatus::Rotating));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in [WalletStatus::Disabled, WalletStatus::Compromised] {
            assert!(from.is_terminal());
            for to in WalletStatus::ALL {
                assert!(!can_transition(from, to), "{from} -> {to} must be rejected");
            }
        }
    }

    #[test]
    fn no_self_transitions() {
        for status in WalletStatus::ALL {
            assert!(!can_transition(status, status));
        }
    }

    #[test]
    fn transition_updates_bookkeeping() {
        let wallet = wallet_with_status(WalletStatus::Active);
        let suspended =
            transition(&wallet, WalletStatus::Suspended, Some("manual review")).unwrap();

        assert_eq!(suspended.status, WalletStatus::Suspended);
        assert_eq!(suspended.status_reason.as_deref(), Some("manual review"));
        assert!(suspended.status_changed_at >= wallet.status_changed_at);
        // Input untouched.
        assert_eq!(wallet.status, WalletStatus::Active);
    }

    #[test]
    fn invalid_transition_is_rejected_not_coerced() {
        let wallet = wallet_with_status(WalletStatus::Disabled);
        let err = transition(&wallet, WalletStatus::Active, None).unwrap_err();
        assert!(matches!(
            err,
            CustodyError::InvalidTransition {
                from: WalletStatus::Disabled,
                to: WalletStatus::Active
            }
        ));
    }
}
