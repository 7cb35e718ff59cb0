use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;

use crate::constants::{KDF_CONTEXT_CHANNEL_KEY, NONCE_SIZE};
use crate::error::CryptoError;

pub type SymmetricKey = [u8; 32];

/// Derive the shared channel key from the pre-shared deployment secret.
/// Every client of a deployment derives the same key; see DESIGN.md.
pub fn derive_channel_key(shared_secret: &str) -> SymmetricKey {
    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_CHANNEL_KEY);
    hasher.update(shared_secret.as_bytes());
    let hash = hasher.finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&hash.as_bytes()[..32]);
    key
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// Returns nonce || ciphertext (24 bytes nonce prepended)
pub fn encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

pub fn decrypt(key: &SymmetricKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new(key.into());
    let nonce = XNonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

/// Encrypt UTF-8 text and armor it as base64 so it can live in a graph
/// string field.
pub fn encrypt_text(key: &SymmetricKey, plaintext: &str) -> Result<String, CryptoError> {
    let sealed = encrypt(key, plaintext.as_bytes())?;
    Ok(BASE64.encode(sealed))
}

/// Reverse of [`encrypt_text`].  Any failure (bad base64, bad ciphertext,
/// non-UTF-8 plaintext) maps to `DecryptionFailed`.
pub fn decrypt_text(key: &SymmetricKey, armored: &str) -> Result<String, CryptoError> {
    let sealed = BASE64
        .decode(armored)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    let plain = decrypt(key, &sealed)?;
    String::from_utf8(plain).map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = derive_channel_key("test-secret");
        let plaintext = b"Bonjour tout le monde!";

        let encrypted = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &encrypted).unwrap();

        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_text_roundtrip_utf8() {
        let key = derive_channel_key("test-secret");
        for plaintext in ["", "hello", "héhé ☕ — ça va?", "多字节"] {
            let armored = encrypt_text(&key, plaintext).unwrap();
            assert_eq!(decrypt_text(&key, &armored).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = derive_channel_key("secret-one");
        let key2 = derive_channel_key("secret-two");

        let armored = encrypt_text(&key1, "secret message").unwrap();
        assert!(decrypt_text(&key2, &armored).is_err());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = derive_channel_key("test-secret");
        let mut encrypted = encrypt(&key, b"important data").unwrap();
        let len = encrypted.len();
        encrypted[len - 1] ^= 0xFF;

        assert!(decrypt(&key, &encrypted).is_err());
    }

    #[test]
    fn test_garbage_armor_fails() {
        let key = derive_channel_key("test-secret");
        assert!(decrypt_text(&key, "not-base64!!!").is_err());
        assert!(decrypt_text(&key, "").is_err());
    }

    #[test]
    fn test_channel_key_deterministic() {
        assert_eq!(
            derive_channel_key("shared-secret"),
            derive_channel_key("shared-secret")
        );
        assert_ne!(
            derive_channel_key("secret-one"),
            derive_channel_key("secret-two")
        );
    }
}
