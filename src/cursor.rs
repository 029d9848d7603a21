use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CursorError {
    #[error("failed to seal page token")]
    Seal,
    #[error("page token is malformed or has been tampered with")]
    Tampered,
}

/// Seals message ids into opaque pagination tokens.
///
/// The AES-256-GCM key is generated once at construction and lives for the
/// process only; it is never persisted, so tokens do not survive a restart.
/// A token carries no conversation binding: callers always supply the
/// conversation id from their own context and never route on token content.
pub struct CursorCodec {
    cipher: Aes256Gcm,
}

impl CursorCodec {
    pub fn new() -> Self {
        let mut key_bytes = [0u8; 32];
        OsRng.fill_bytes(&mut key_bytes);
        let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Turns a message id into an opaque token. The empty id maps to the
    /// empty token.
    pub fn encode(&self, id: &str) -> Result<String, CursorError> {
        if id.is_empty() {
            return Ok(String::new());
        }
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, id.as_bytes())
            .map_err(|_| CursorError::Seal)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Recovers the message id from a token. The empty token maps to the
    /// empty id; anything malformed or tampered with is a hard error, never
    /// a fallback to "most recent".
    pub fn decode(&self, token: &str) -> Result<String, CursorError> {
        if token.is_empty() {
            return Ok(String::new());
        }
        let sealed = BASE64.decode(token).map_err(|_| CursorError::Tampered)?;
        if sealed.len() < 12 {
            return Err(CursorError::Tampered);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CursorError::Tampered)?;

        String::from_utf8(plaintext).map_err(|_| CursorError::Tampered)
    }
}

impl Default for CursorCodec {
    fn default() -> Self {
        Self::new()
    }
}
