use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64URL;
use huddle_types::envelope::{EncryptedBody, PublicKeyJwk};
use huddle_types::{Error, Result};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::{EncodedPoint, FieldBytes, PublicKey, SecretKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};

const PBKDF2_ROUNDS: u32 = 10_000;

/// At-rest shape of the password-sealed identity secret. The established
/// format calls the ciphertext field `message`, unlike the envelope's
/// `ciphertext`, and stored blobs depend on that name.
#[derive(Serialize, Deserialize)]
struct SealedBlob {
    message: String,
    iv: String,
}

/// Long-term P-256 identity keypair. The secret half never leaves the
/// client; at rest it is sealed with [`encrypt_with_password`].
pub struct IdentityKeyPair {
    public: PublicKeyJwk,
    secret: SecretKey,
}

impl IdentityKeyPair {
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = jwk_from_public(&secret.public_key());
        Self { public, secret }
    }

    pub fn public(&self) -> &PublicKeyJwk {
        &self.public
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }

    /// Base64url scalar, the `d` component of a private JWK.
    pub fn export_secret(&self) -> String {
        B64URL.encode(self.secret.to_bytes())
    }

    pub fn from_exported_secret(d: &str) -> Result<Self> {
        let bytes = B64URL
            .decode(d)
            .map_err(|e| Error::Crypto(format!("malformed secret key: {e}")))?;
        let secret = SecretKey::from_slice(&bytes)
            .map_err(|e| Error::Crypto(format!("invalid secret scalar: {e}")))?;
        let public = jwk_from_public(&secret.public_key());
        Ok(Self { public, secret })
    }
}

pub fn jwk_from_public(key: &PublicKey) -> PublicKeyJwk {
    let point = key.to_encoded_point(false);
    // x/y are always present on an uncompressed public point
    let x = point.x().map(|b| B64URL.encode(b)).unwrap_or_default();
    let y = point.y().map(|b| B64URL.encode(b)).unwrap_or_default();
    PublicKeyJwk::new(x, y)
}

pub fn public_from_jwk(jwk: &PublicKeyJwk) -> Result<PublicKey> {
    if jwk.kty != "EC" || jwk.crv != "P-256" {
        return Err(Error::Crypto(format!(
            "unsupported key type {}/{}",
            jwk.kty, jwk.crv
        )));
    }
    let x = decode_coordinate(&jwk.x)?;
    let y = decode_coordinate(&jwk.y)?;
    let point = EncodedPoint::from_affine_coordinates(&x, &y, false);
    Option::<PublicKey>::from(PublicKey::from_encoded_point(&point))
        .ok_or_else(|| Error::Crypto("public key is not a point on P-256".into()))
}

fn decode_coordinate(encoded: &str) -> Result<FieldBytes> {
    let bytes = B64URL
        .decode(encoded)
        .map_err(|e| Error::Crypto(format!("malformed coordinate: {e}")))?;
    if bytes.len() != 32 {
        return Err(Error::Crypto(format!(
            "coordinate has length {}, expected 32",
            bytes.len()
        )));
    }
    Ok(FieldBytes::clone_from_slice(&bytes))
}

/// Raw ECDH shared bytes (the x-coordinate of the shared point), used
/// directly as an AES-256-GCM key.
pub fn shared_secret(secret: &SecretKey, public: &PublicKey) -> [u8; 32] {
    let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
    let mut key = [0u8; 32];
    key.copy_from_slice(shared.raw_secret_bytes());
    key
}

/// ECDH against a JWK-encoded counterpart key.
pub fn shared_secret_jwk(secret: &SecretKey, public: &PublicKeyJwk) -> Result<[u8; 32]> {
    Ok(shared_secret(secret, &public_from_jwk(public)?))
}

/// PBKDF2-HMAC-SHA256 over the login password. The empty salt and the low
/// round count are part of the established at-rest format and must not be
/// changed without re-sealing every stored key.
pub fn derive_password_key(password: &str) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password.as_bytes(), b"", PBKDF2_ROUNDS, &mut key);
    key
}

/// Seal a string under a password-derived key. Output is
/// base64(JSON{message, iv}), the shape stored client-side for the
/// wrapped identity secret.
pub fn encrypt_with_password(plaintext: &str, password: &str) -> Result<String> {
    let key = derive_password_key(password);
    let body = crate::encrypt::encrypt(&key, plaintext.as_bytes())?;
    let blob = SealedBlob {
        message: body.ciphertext,
        iv: body.iv,
    };
    let json = serde_json::to_string(&blob)
        .map_err(|e| Error::Crypto(format!("serializing sealed blob: {e}")))?;
    Ok(B64.encode(json))
}

pub fn decrypt_with_password(blob: &str, password: &str) -> Result<String> {
    let json = B64
        .decode(blob)
        .map_err(|e| Error::Crypto(format!("malformed sealed blob: {e}")))?;
    let blob: SealedBlob = serde_json::from_slice(&json)
        .map_err(|e| Error::Crypto(format!("malformed sealed blob: {e}")))?;
    let body = EncryptedBody {
        ciphertext: blob.message,
        iv: blob.iv,
    };
    let key = derive_password_key(password);
    let plaintext = crate::encrypt::decrypt(&key, &body)?;
    String::from_utf8(plaintext).map_err(|e| Error::Crypto(format!("sealed blob is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_jwk_roundtrip() {
        let pair = IdentityKeyPair::generate();
        let parsed = public_from_jwk(pair.public()).unwrap();
        assert_eq!(&jwk_from_public(&parsed), pair.public());
    }

    #[test]
    fn exported_secret_restores_same_identity() {
        let pair = IdentityKeyPair::generate();
        let restored = IdentityKeyPair::from_exported_secret(&pair.export_secret()).unwrap();
        assert_eq!(restored.public(), pair.public());
    }

    #[test]
    fn ecdh_agrees_both_ways() {
        let alice = IdentityKeyPair::generate();
        let bob = IdentityKeyPair::generate();
        let ab = shared_secret_jwk(alice.secret(), bob.public()).unwrap();
        let ba = shared_secret_jwk(bob.secret(), alice.public()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn password_key_is_deterministic() {
        assert_eq!(derive_password_key("hunter2"), derive_password_key("hunter2"));
        assert_ne!(derive_password_key("hunter2"), derive_password_key("hunter3"));
    }

    #[test]
    fn password_seal_roundtrip() {
        let pair = IdentityKeyPair::generate();
        let sealed = encrypt_with_password(&pair.export_secret(), "correct horse").unwrap();
        let opened = decrypt_with_password(&sealed, "correct horse").unwrap();
        let restored = IdentityKeyPair::from_exported_secret(&opened).unwrap();
        assert_eq!(restored.public(), pair.public());

        assert!(decrypt_with_password(&sealed, "wrong horse").is_err());
    }

    #[test]
    fn sealed_blob_keeps_the_stored_field_names() {
        let sealed = encrypt_with_password("secret scalar", "correct horse").unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&B64.decode(sealed).unwrap()).unwrap();

        // Stored blobs name the ciphertext field "message"; renaming it
        // would orphan every key sealed by existing clients.
        assert!(json.get("message").is_some());
        assert!(json.get("iv").is_some());
        assert!(json.get("ciphertext").is_none());
    }

    #[test]
    fn rejects_coordinates_off_curve() {
        let bogus = PublicKeyJwk::new(
            B64URL.encode([1u8; 32]),
            B64URL.encode([2u8; 32]),
        );
        assert!(public_from_jwk(&bogus).is_err());
    }
}
