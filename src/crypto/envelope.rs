// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Custody Core Contributors

//! Envelope encryption for secret key material at rest.
//!
//! Every envelope is self-describing: ciphertext, nonce, auth tag, KDF
//! salt, and a format version sufficient to decrypt with nothing but the
//! process master secret. Encryption is probabilistic (fresh salt and
//! nonce per call) and authenticated (AES-256-GCM), so any bit-flip or
//! wrong key is a hard decrypt failure, never garbage plaintext.
//!
//! ## Versions
//!
//! - **1** (legacy): compact string `salt:iv:ciphertext` of three base64
//!   fields, GCM tag appended to the ciphertext. Decode-only support is
//!   kept so previously stored ciphertexts never need a backfill.
//! - **2** (current): structured record with the tag split out.
//!
//! The key for both versions is derived from the master secret with
//! Argon2id. Derived keys live in zeroize-on-drop buffers and are never
//! logged or serialized.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm as KdfAlgorithm, Argon2, Params, Version};
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::config::MasterSecret;

/// Legacy compact-string format version.
pub const ENVELOPE_VERSION_LEGACY: u32 = 1;

/// Current structured format version.
pub const ENVELOPE_VERSION: u32 = 2;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

/// Decrypt failure. The `Display` text is identical across kinds so the
/// message never acts as a wrong-key vs corruption oracle; callers that
/// need the distinction match on the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecryptionError {
    /// AEAD authentication failed: tampered data or wrong master key.
    #[error("envelope decryption failed")]
    AuthenticationFailed,

    /// The envelope is structurally invalid (lengths, encoding, version).
    #[error("envelope decryption failed")]
    MalformedEnvelope,

    /// The envelope's declared parameters do not match this service's
    /// key-derivation configuration.
    #[error("envelope decryption failed")]
    KeyMismatch,
}

/// Encrypt failure. Deliberately opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("envelope encryption failed")]
pub struct EncryptionError;

/// Self-describing ciphertext bundle. Immutable once created;
/// re-encryption produces a new envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// AEAD ciphertext (tag excluded).
    #[serde(rename = "encrypted_data", with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
    /// AEAD nonce.
    #[serde(with = "base64_bytes")]
    pub iv: Vec<u8>,
    /// GCM authentication tag.
    #[serde(rename = "tag", with = "base64_bytes")]
    pub auth_tag: Vec<u8>,
    /// KDF salt used to derive the data key from the master secret.
    #[serde(rename = "salt", with = "base64_bytes_opt", default)]
    pub key_derivation_salt: Option<Vec<u8>>,
    /// Format version; fully determines how the fields are interpreted.
    pub version: u32,
}

impl EncryptedEnvelope {
    /// Decode the legacy version-1 compact string `salt:iv:ciphertext`
    /// (three base64 fields, tag appended to the ciphertext).
    pub fn from_compact_v1(compact: &str) -> Result<Self, DecryptionError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let mut parts = compact.split(':');
        let (Some(salt), Some(iv), Some(ct), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(DecryptionError::MalformedEnvelope);
        };

        let salt = engine
            .decode(salt)
            .map_err(|_| DecryptionError::MalformedEnvelope)?;
        let iv = engine
            .decode(iv)
            .map_err(|_| DecryptionError::MalformedEnvelope)?;
        let ct_and_tag = engine
            .decode(ct)
            .map_err(|_| DecryptionError::MalformedEnvelope)?;

        if ct_and_tag.len() < TAG_LEN {
            return Err(DecryptionError::MalformedEnvelope);
        }
        let (ciphertext, auth_tag) = ct_and_tag.split_at(ct_and_tag.len() - TAG_LEN);

        Ok(Self {
            ciphertext: ciphertext.to_vec(),
            iv,
            auth_tag: auth_tag.to_vec(),
            key_derivation_salt: Some(salt),
            version: ENVELOPE_VERSION_LEGACY,
        })
    }

    /// Encode as the legacy version-1 compact string. Only meaningful for
    /// migration tooling; new envelopes are stored structured.
    pub fn to_compact_v1(&self) -> String {
        let engine = base64::engine::general_purpose::STANDARD;
        let salt = self.key_derivation_salt.as_deref().unwrap_or_default();
        let mut ct_and_tag = Vec::with_capacity(self.ciphertext.len() + self.auth_tag.len());
        ct_and_tag.extend_from_slice(&self.ciphertext);
        ct_and_tag.extend_from_slice(&self.auth_tag);
        format!(
            "{}:{}:{}",
            engine.encode(salt),
            engine.encode(&self.iv),
            engine.encode(&ct_and_tag)
        )
    }
}

/// Envelope encryption service bound to the process master secret.
pub struct EnvelopeService {
    master_secret: MasterSecret,
    kdf: Argon2<'static>,
}

impl EnvelopeService {
    /// Build the service.
    ///
    /// Argon2id parameters are pinned so envelopes remain decryptable
    /// across dependency updates.
    pub fn new(master_secret: MasterSecret) -> Self {
        // 19 MiB, 2 iterations, 1 lane; output length is the caller's
        // buffer size. Algorithm and version are pinned explicitly.
        let kdf = Argon2::new(KdfAlgorithm::Argon2id, Version::V0x13, Params::DEFAULT);
        Self { master_secret, kdf }
    }

    /// Encrypt secret bytes into a fresh envelope.
    ///
    /// Draws a new random salt and nonce on every call; two encryptions
    /// of identical plaintext never produce the same ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedEnvelope, EncryptionError> {
        let mut salt = vec![0u8; SALT_LEN];
        let mut iv = vec![0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let key = self.derive_key(&salt).map_err(|_| EncryptionError)?;
        let cipher = Aes256Gcm::new_from_slice(&key[..]).map_err(|_| EncryptionError)?;
        let mut ct_and_tag = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|_| EncryptionError)?;

        let auth_tag = ct_and_tag.split_off(ct_and_tag.len() - TAG_LEN);
        Ok(EncryptedEnvelope {
            ciphertext: ct_and_tag,
            iv,
            auth_tag,
            key_derivation_salt: Some(salt),
            version: ENVELOPE_VERSION,
        })
    }

    /// Decrypt an envelope back into plaintext.
    ///
    /// Fails hard on any integrity or format violation; never returns
    /// partial plaintext. The returned buffer is wiped on drop.
    pub fn decrypt(&self, envelope: &EncryptedEnvelope) -> Result<Zeroizing<Vec<u8>>, DecryptionError> {
        match envelope.version {
            ENVELOPE_VERSION_LEGACY | ENVELOPE_VERSION => {}
            _ => return Err(DecryptionError::MalformedEnvelope),
        }

        let salt = envelope
            .key_derivation_salt
            .as_deref()
            .ok_or(DecryptionError::MalformedEnvelope)?;
        if envelope.iv.len() != NONCE_LEN || envelope.auth_tag.len() != TAG_LEN {
            return Err(DecryptionError::MalformedEnvelope);
        }

        let key = self
            .derive_key(salt)
            .map_err(|_| DecryptionError::KeyMismatch)?;
        let cipher =
            Aes256Gcm::new_from_slice(&key[..]).map_err(|_| DecryptionError::KeyMismatch)?;

        let mut ct_and_tag =
            Vec::with_capacity(envelope.ciphertext.len() + envelope.auth_tag.len());
        ct_and_tag.extend_from_slice(&envelope.ciphertext);
        ct_and_tag.extend_from_slice(&envelope.auth_tag);

        cipher
            .decrypt(Nonce::from_slice(&envelope.iv), ct_and_tag.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| DecryptionError::AuthenticationFailed)
    }

    fn derive_key(&self, salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, argon2::Error> {
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        self.kdf
            .hash_password_into(self.master_secret.expose(), salt, &mut key[..])?;
        Ok(key)
    }
}

mod base64_bytes {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer
                .serialize_some(&base64::engine::general_purpose::STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => base64::engine::general_purpose::STANDARD
                .decode(encoded)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> EnvelopeService {
        EnvelopeService::new(MasterSecret::new(vec![0x5a; 32]).unwrap())
    }

    fn other_service() -> EnvelopeService {
        EnvelopeService::new(MasterSecret::new(vec![0xa5; 32]).unwrap())
    }

    #[test]
    fn round_trip() {
        let svc = service();
        let plaintext = b"ed25519 seed bytes go here......";
        let envelope = svc.encrypt(plaintext).unwrap();
        assert_eq!(envelope.version, ENVELOPE_VERSION);

        let decrypted = svc.decrypt(&envelope).unwrap();
        assert_eq!(&decrypted[..], plaintext);
    }

    #[test]
    fn encryption_is_probabilistic() {
        let svc = service();
        let a = svc.encrypt(b"same plaintext").unwrap();
        let b = svc.encrypt(b"same plaintext").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.key_derivation_salt, b.key_derivation_salt);
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let svc = service();
        let mut envelope = svc.encrypt(b"secret").unwrap();
        envelope.ciphertext[0] ^= 0x01;
        assert_eq!(
            svc.decrypt(&envelope),
            Err(DecryptionError::AuthenticationFailed)
        );
    }

    #[test]
    fn tampered_tag_fails_authentication() {
        let svc = service();
        let mut envelope = svc.encrypt(b"secret").unwrap();
        envelope.auth_tag[TAG_LEN - 1] ^= 0x80;
        assert_eq!(
            svc.decrypt(&envelope),
            Err(DecryptionError::AuthenticationFailed)
        );
    }

    #[test]
    fn tampered_iv_fails_authentication() {
        let svc = service();
        let mut envelope = svc.encrypt(b"secret").unwrap();
        envelope.iv[3] ^= 0xff;
        assert_eq!(
            svc.decrypt(&envelope),
            Err(DecryptionError::AuthenticationFailed)
        );
    }

    #[test]
    fn wrong_master_key_is_rejected() {
        let envelope = service().encrypt(b"secret").unwrap();
        assert_eq!(
            other_service().decrypt(&envelope),
            Err(DecryptionError::AuthenticationFailed)
        );
    }

    #[test]
    fn missing_salt_is_malformed() {
        let svc = service();
        let mut envelope = svc.encrypt(b"secret").unwrap();
        envelope.key_derivation_salt = None;
        assert_eq!(
            svc.decrypt(&envelope),
            Err(DecryptionError::MalformedEnvelope)
        );
    }

    #[test]
    fn unknown_version_is_malformed() {
        let svc = service();
        let mut envelope = svc.encrypt(b"secret").unwrap();
        envelope.version = 99;
        assert_eq!(
            svc.decrypt(&envelope),
            Err(DecryptionError::MalformedEnvelope)
        );
    }

    #[test]
    fn legacy_compact_v1_round_trips() {
        let svc = service();
        let mut envelope = svc.encrypt(b"legacy stored secret").unwrap();
        envelope.version = ENVELOPE_VERSION_LEGACY;

        let compact = envelope.to_compact_v1();
        let decoded = EncryptedEnvelope::from_compact_v1(&compact).unwrap();
        assert_eq!(decoded, envelope);

        let decrypted = svc.decrypt(&decoded).unwrap();
        assert_eq!(&decrypted[..], b"legacy stored secret");
    }

    #[test]
    fn compact_v1_rejects_bad_field_count() {
        assert_eq!(
            EncryptedEnvelope::from_compact_v1("only:two"),
            Err(DecryptionError::MalformedEnvelope)
        );
        assert_eq!(
            EncryptedEnvelope::from_compact_v1("a:b:c:d"),
            Err(DecryptionError::MalformedEnvelope)
        );
    }

    #[test]
    fn compact_v1_rejects_bad_base64() {
        assert_eq!(
            EncryptedEnvelope::from_compact_v1("!!:??:%%"),
            Err(DecryptionError::MalformedEnvelope)
        );
    }

    #[test]
    fn structured_serialization_round_trips() {
        let svc = service();
        let envelope = svc.encrypt(b"persist me").unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"version\":2"));
        // Raw bytes never appear; fields are base64 strings.
        let restored: EncryptedEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, envelope);

        let decrypted = svc.decrypt(&restored).unwrap();
        assert_eq!(&decrypted[..], b"persist me");
    }

    #[test]
    fn error_messages_are_generic_and_identical() {
        let auth = DecryptionError::AuthenticationFailed.to_string();
        let malformed = DecryptionError::MalformedEnvelope.to_string();
        let mismatch = DecryptionError::KeyMismatch.to_string();
        assert_eq!(auth, malformed);
        assert_eq!(auth, mismatch);
        assert!(!auth.contains("key"));
    }
}
