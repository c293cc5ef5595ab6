use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use huddle_types::envelope::EncryptedBody;
use huddle_types::{Error, Result};
use rand::Rng;

const IV_LEN: usize = 12;
const IV_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Fresh IV as a base-36 ASCII string. Its raw bytes are used as the GCM
/// nonce and the string itself travels in the envelope, so the at-rest
/// format stays a printable short string rather than random binary.
pub fn random_iv() -> String {
    let mut rng = rand::rng();
    (0..IV_LEN)
        .map(|_| IV_ALPHABET[rng.random_range(0..IV_ALPHABET.len())] as char)
        .collect()
}

/// Encrypt with AES-256-GCM under a fresh string IV.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<EncryptedBody> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let iv = random_iv();
    let nonce = Nonce::from_slice(iv.as_bytes());

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| Error::Crypto(format!("encryption failed: {e}")))?;

    Ok(EncryptedBody {
        ciphertext: B64.encode(ciphertext),
        iv,
    })
}

/// Decrypt an [`EncryptedBody`]. Tag mismatch, malformed base64 and a
/// wrong-length IV all surface as `Crypto`.
pub fn decrypt(key: &[u8; 32], body: &EncryptedBody) -> Result<Vec<u8>> {
    let iv = body.iv.as_bytes();
    if iv.len() != IV_LEN {
        return Err(Error::Crypto(format!("bad IV length: {}", iv.len())));
    }

    let ciphertext = B64
        .decode(&body.ciphertext)
        .map_err(|e| Error::Crypto(format!("malformed ciphertext: {e}")))?;

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext.as_ref())
        .map_err(|e| Error::Crypto(format!("decryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(seed: u8) -> [u8; 32] {
        [seed; 32]
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key(7);
        let message = "Hello from the huddle! Ünïcodé too: 数据".as_bytes();

        let body = encrypt(&key, message).unwrap();
        assert_ne!(body.ciphertext.as_bytes(), message);

        let decrypted = decrypt(&key, &body).unwrap();
        assert_eq!(decrypted, message);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let key = test_key(1);
        let body = encrypt(&key, b"").unwrap();
        assert_eq!(decrypt(&key, &body).unwrap(), b"");
    }

    #[test]
    fn wrong_key_fails() {
        let body = encrypt(&test_key(2), b"Secret message").unwrap();
        assert!(decrypt(&test_key(3), &body).is_err());
    }

    #[test]
    fn iv_is_short_base36() {
        let iv = random_iv();
        assert_eq!(iv.len(), 12);
        assert!(iv.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn tampered_iv_is_rejected() {
        let key = test_key(4);
        let mut body = encrypt(&key, b"payload").unwrap();
        body.iv = "tooshort".into();
        assert!(decrypt(&key, &body).is_err());
    }
}
