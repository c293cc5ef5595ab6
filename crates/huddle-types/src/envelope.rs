use serde::{Deserialize, Serialize};

/// JWK-style P-256 public key: base64url-encoded affine coordinates.
/// Recipients are matched inside an [`Envelope`] by comparing `x`/`y`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
}

impl PublicKeyJwk {
    pub fn new(x: String, y: String) -> Self {
        Self {
            kty: "EC".into(),
            crv: "P-256".into(),
            x,
            y,
        }
    }
}

/// AES-GCM output: base64 ciphertext plus the base-36 IV string whose raw
/// bytes were used as the nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedBody {
    pub ciphertext: String,
    pub iv: String,
}

/// One message key wrapped for one recipient under the pairwise
/// sender/recipient ECDH key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrappedKey {
    pub recipient_public_key: PublicKeyJwk,
    pub wrapped_key: String,
    pub iv: String,
}

/// Wire/at-rest shape of an encrypted message body: one ciphertext plus one
/// wrapped message-key per recipient. The server stores this verbatim and
/// never holds material to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub message: EncryptedBody,
    pub sending_user_public_key: PublicKeyJwk,
    pub key_array: Vec<WrappedKey>,
}
