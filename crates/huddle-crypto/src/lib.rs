//! Client-side envelope protocol.
//!
//! Every user holds one long-term P-256 ECDH keypair. A message is encrypted
//! once under a disposable AES-256-GCM message key, and that key is wrapped
//! separately for each recipient under the pairwise ECDH key shared between
//! the sender's and the recipient's long-term keys. The server only ever
//! relays public keys and stores envelopes; no private key or plaintext
//! crosses its boundary.
//!
//! Everything here is a pure function over key material; there is no state
//! and no retry. A failure to open one envelope is reported for that
//! envelope alone.

pub mod encrypt;
pub mod envelope;
pub mod keys;

pub use envelope::{create_envelope, open_envelope};
pub use keys::IdentityKeyPair;
