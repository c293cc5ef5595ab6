use huddle_types::envelope::{EncryptedBody, Envelope, PublicKeyJwk, WrappedKey};
use huddle_types::{Error, Result};
use p256::SecretKey;
use rand_core::OsRng;
use tracing::warn;

use crate::encrypt;
use crate::keys::{self, IdentityKeyPair};

/// Build an envelope addressed to `recipients`.
///
/// The message key comes from an ECDH agreement between two disposable
/// keypairs generated here and thrown away; it is unrelated to the sender's
/// or any recipient's identity material. Each recipient then gets the key
/// wrapped under the pairwise sender/recipient ECDH key.
pub fn create_envelope(
    plaintext: &str,
    recipients: &[PublicKeyJwk],
    sender: &IdentityKeyPair,
) -> Result<Envelope> {
    let eph_a = SecretKey::random(&mut OsRng);
    let eph_b = SecretKey::random(&mut OsRng);
    let message_key = keys::shared_secret(&eph_a, &eph_b.public_key());

    let message = encrypt::encrypt(&message_key, plaintext.as_bytes())?;

    let mut key_array = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        match wrap_for(&message_key, recipient, sender) {
            Ok(wrapped) => key_array.push(wrapped),
            // One unusable recipient key must not sink the whole envelope.
            Err(e) => warn!("skipping recipient with unusable key: {e}"),
        }
    }

    Ok(Envelope {
        message,
        sending_user_public_key: sender.public().clone(),
        key_array,
    })
}

fn wrap_for(
    message_key: &[u8; 32],
    recipient: &PublicKeyJwk,
    sender: &IdentityKeyPair,
) -> Result<WrappedKey> {
    let pairwise = keys::shared_secret_jwk(sender.secret(), recipient)?;
    let sealed = encrypt::encrypt(&pairwise, message_key)?;
    Ok(WrappedKey {
        recipient_public_key: recipient.clone(),
        wrapped_key: sealed.ciphertext,
        iv: sealed.iv,
    })
}

/// Open an envelope with the recipient's identity keypair.
///
/// Returns `Ok(None)` when no keyArray entry matches the identity's public
/// coordinates: the recipient simply was not addressed, which is not an
/// error. Primitive failures (bad key material, tag mismatch) surface as
/// `Crypto` and are scoped to this one envelope.
pub fn open_envelope(envelope: &Envelope, identity: &IdentityKeyPair) -> Result<Option<String>> {
    let me = identity.public();
    let Some(entry) = envelope
        .key_array
        .iter()
        .find(|k| k.recipient_public_key.x == me.x && k.recipient_public_key.y == me.y)
    else {
        return Ok(None);
    };

    let pairwise = keys::shared_secret_jwk(identity.secret(), &envelope.sending_user_public_key)?;
    let raw = encrypt::decrypt(
        &pairwise,
        &EncryptedBody {
            ciphertext: entry.wrapped_key.clone(),
            iv: entry.iv.clone(),
        },
    )?;
    let message_key: [u8; 32] = raw
        .as_slice()
        .try_into()
        .map_err(|_| Error::Crypto("unwrapped message key has wrong length".into()))?;

    let plaintext = encrypt::decrypt(&message_key, &envelope.message)?;
    String::from_utf8(plaintext)
        .map(Some)
        .map_err(|e| Error::Crypto(format!("plaintext is not UTF-8: {e}")))
}
