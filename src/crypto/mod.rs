//! Envelope encryption: master key -> per-user DEK -> content ciphertext (§4.2)

mod dek_registry;

pub use dek_registry::{DekRegistry, InMemoryDekRegistry};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{MemoryError, Result};

const MASTER_SALT: &[u8] = b"memoryx_master_salt_v1";
const PBKDF2_ITERATIONS: u32 = 100_000;
const NONCE_LEN: usize = 12;

/// A 256-bit symmetric key that zeroes itself on drop.
///
/// DEKs are per-request values (§5): callers must let this drop at the end
/// of the request that used it, never cache it beyond that scope.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Dek(Vec<u8>);

impl Dek {
    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Dek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Dek(..)")
    }
}

/// Plaintext encrypted for storage, alongside its nonce, both base64-encoded.
#[derive(Debug, Clone)]
pub struct EncryptedPayload {
    pub ciphertext_b64: String,
    pub nonce_b64: String,
}

/// Derives and holds the process-wide master key; wraps/unwraps DEKs and
/// encrypts/decrypts content under AES-256-GCM (§4.2).
pub struct EncryptionManager {
    master_key: Vec<u8>,
}

impl EncryptionManager {
    /// Derive the master key from a process secret via PBKDF2-HMAC-SHA256.
    ///
    /// Returns `None` with a logged line when `key_source` is empty, per
    /// §4.2 ("absent => encryption disabled process-wide").
    pub fn new(key_source: &str) -> Option<Self> {
        if key_source.is_empty() {
            tracing::info!("no master key source provided, encryption disabled");
            return None;
        }

        let mut master_key = vec![0u8; 32];
        pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
            key_source.as_bytes(),
            MASTER_SALT,
            PBKDF2_ITERATIONS,
            &mut master_key,
        );

        Some(Self { master_key })
    }

    /// Generate a new random 256-bit DEK.
    pub fn generate_dek(&self) -> Dek {
        let mut bytes = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Dek(bytes)
    }

    /// Wrap a DEK under the master key: `nonce || AES-256-GCM(master_key, nonce, dek)`.
    pub fn wrap_dek(&self, dek: &Dek) -> Result<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, dek.as_bytes())
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;

        let mut wrapped = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        wrapped.extend_from_slice(&nonce_bytes);
        wrapped.extend_from_slice(&ciphertext);
        Ok(wrapped)
    }

    /// Unwrap a DEK that was wrapped by [`Self::wrap_dek`].
    pub fn unwrap_dek(&self, wrapped: &[u8]) -> Result<Dek> {
        if wrapped.len() < NONCE_LEN {
            return Err(MemoryError::CryptoFailure("wrapped DEK too short".to_string()));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.master_key)
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;

        let nonce = Nonce::from_slice(&wrapped[..NONCE_LEN]);
        let ciphertext = &wrapped[NONCE_LEN..];

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;

        Ok(Dek(plaintext))
    }

    /// Encrypt content with a DEK: fresh 12-byte nonce per record (§4.2).
    pub fn encrypt_content(&self, plaintext: &str, dek: &Dek) -> Result<EncryptedPayload> {
        let cipher = Aes256Gcm::new_from_slice(dek.as_bytes())
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;

        Ok(EncryptedPayload {
            ciphertext_b64: BASE64.encode(ciphertext),
            nonce_b64: BASE64.encode(nonce_bytes),
        })
    }

    /// Decrypt content previously produced by [`Self::encrypt_content`].
    ///
    /// On any failure (bad base64, wrong DEK, MAC mismatch) this returns a
    /// `CryptoFailure` so the caller can substitute the decryption-failure
    /// sentinel from §4.2 rather than aborting the whole request.
    pub fn decrypt_content(&self, payload: &EncryptedPayload, dek: &Dek) -> Result<String> {
        let ciphertext = BASE64
            .decode(&payload.ciphertext_b64)
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;
        let nonce_bytes = BASE64
            .decode(&payload.nonce_b64)
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;

        let cipher = Aes256Gcm::new_from_slice(dek.as_bytes())
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext.as_slice())
            .map_err(|e| MemoryError::CryptoFailure(e.to_string()))?;

        String::from_utf8(plaintext).map_err(|e| MemoryError::CryptoFailure(e.to_string()))
    }
}

/// Sentinel returned instead of plaintext when decryption cannot proceed (§4.2).
pub const DECRYPT_UNAVAILABLE_SENTINEL: &str = "[Encrypted content - unable to decrypt]";
/// Sentinel returned when decryption was attempted but the AEAD tag failed (§4.2).
pub const DECRYPT_FAILED_SENTINEL: &str = "[Encrypted content - decryption failed]";
