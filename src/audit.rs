// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Audit trail for key operations.
//!
//! Append-only, bounded, secrets-free. Entries carry at most a truncated
//! public-key prefix; private key bytes, full public keys, and ciphertext
//! never enter an entry, including the error message. Durable mirroring
//! of the trail is an external observability concern; this buffer only
//! guarantees the core's correctness contract.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default ring-buffer capacity.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1024;

/// Length of the retained public-key prefix.
const KEY_REF_LEN: usize = 8;

/// Auditable key operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOperation {
    Generate,
    Sign,
    Rotate,
    Validate,
}

/// One audit entry. Never contains secret material in any field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyOperationAudit {
    pub operation: KeyOperation,
    /// Truncated public-key prefix, or `"unknown"` when the operation
    /// failed before a key existed.
    pub key_ref: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl KeyOperationAudit {
    pub fn success(operation: KeyOperation, public_key: &str) -> Self {
        Self {
            operation,
            key_ref: key_ref(public_key),
            timestamp: Utc::now(),
            success: true,
            error_message: None,
        }
    }

    pub fn failure(
        operation: KeyOperation,
        public_key: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            key_ref: public_key.map(key_ref).unwrap_or_else(|| "unknown".to_string()),
            timestamp: Utc::now(),
            success: false,
            error_message: Some(message.into()),
        }
    }
}

/// Redact a public key down to its retained prefix.
pub fn key_ref(public_key: &str) -> String {
    if public_key.len() <= KEY_REF_LEN {
        return public_key.to_string();
    }
    format!("{}..", &public_key[..KEY_REF_LEN])
}

/// Bounded in-memory audit log (ring buffer, oldest-entry eviction).
pub struct AuditLog {
    entries: Mutex<VecDeque<KeyOperationAudit>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_AUDIT_CAPACITY))),
            capacity: capacity.max(1),
        }
    }

    /// Append an entry.
    ///
    /// Never fails towards the caller: an audit problem must not block
    /// the key operation it describes. Internal failures are escalated
    /// via tracing for an external observer to pick up.
    pub fn record(&self, entry: KeyOperationAudit) {
        match self.entries.lock() {
            Ok(mut entries) => {
                if entries.len() == self.capacity {
                    entries.pop_front();
                }
                entries.push_back(entry);
            }
            Err(e) => {
                tracing::warn!(error = %e, "audit log lock poisoned; entry dropped");
            }
        }
    }

    /// Snapshot of the most recent `limit` entries, newest first.
    pub fn query(&self, limit: usize) -> Vec<KeyOperationAudit> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().rev().take(limit).cloned().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "audit log lock poisoned; returning empty snapshot");
                Vec::new()
            }
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PK: &str = "4f2a9c1db7e83365d1a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f701";

    #[test]
    fn key_ref_truncates() {
        let r = key_ref(PK);
        assert_eq!(r, "4f2a9c1d..");
        assert!(r.len() < PK.len());
    }

    #[test]
    fn record_and_query_newest_first() {
        let log = AuditLog::default();
        log.record(KeyOperationAudit::success(KeyOperation::Generate, PK));
        log.record(KeyOperationAudit::success(KeyOperation::Sign, PK));
        log.record(KeyOperationAudit::failure(
            KeyOperation::Sign,
            Some(PK),
            "signing failed",
        ));

        let entries = log.query(10);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].operation, KeyOperation::Sign);
        assert!(!entries[0].success);
        assert_eq!(entries[2].operation, KeyOperation::Generate);
    }

    #[test]
    fn query_respects_limit() {
        let log = AuditLog::default();
        for _ in 0..5 {
            log.record(KeyOperationAudit::success(KeyOperation::Sign, PK));
        }
        assert_eq!(log.query(2).len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let log = AuditLog::new(3);
        for i in 0..5 {
            let mut entry = KeyOperationAudit::success(KeyOperation::Sign, PK);
            entry.error_message = Some(format!("marker-{i}"));
            log.record(entry);
        }

        let entries = log.query(10);
        assert_eq!(entries.len(), 3);
        // Oldest two (marker-0, marker-1) were evicted.
        assert_eq!(entries[2].error_message.as_deref(), Some("marker-2"));
        assert_eq!(entries[0].error_message.as_deref(), Some("marker-4"));
    }

    #[test]
    fn entries_never_contain_full_public_key() {
        let log = AuditLog::default();
        log.record(KeyOperationAudit::success(KeyOperation::Generate, PK));
        log.record(KeyOperationAudit::failure(
            KeyOperation::Validate,
            Some(PK),
            "validation failed",
        ));

        for entry in log.query(10) {
            let json = serde_json::to_string(&entry).unwrap();
            assert!(!json.contains(PK));
        }
    }

    #[test]
    fn failure_without_key_uses_placeholder() {
        let entry = KeyOperationAudit::failure(KeyOperation::Generate, None, "entropy exhausted");
        assert_eq!(entry.key_ref, "unknown");
        assert!(!entry.success);
    }
}
