//! Key directory: published identity public keys, nothing else. Private key
//! material never reaches this crate; clients wrap it themselves before it
//! leaves the device.

use std::collections::HashMap;

use huddle_db::queries;
use huddle_types::envelope::PublicKeyJwk;
use huddle_types::models::{Role, RosterEntry};
use huddle_types::{Error, Result};
use uuid::Uuid;

use crate::channels::resolve_visibility;
use crate::users::parse_pub_key;
use crate::Engine;

impl Engine {
    /// Publish (or replace) a user's identity public key. Conditional on the
    /// user being active.
    pub fn publish_public_key(&self, user: Uuid, key: &PublicKeyJwk) -> Result<()> {
        let uid = user.to_string();
        let raw = serde_json::to_string(key)
            .map_err(|e| Error::Validation(format!("unserializable public key: {e}")))?;
        let matched = self.store().conditional_update(
            "UPDATE users SET pub_key = :key WHERE id = :id AND active = 1",
            &[(":key", &raw), (":id", &uid)],
        )?;
        if matched == 0 {
            return Err(Error::NotFound("user"));
        }
        Ok(())
    }

    /// Published keys for a set of users. Inactive users and users without a
    /// published key are silently absent from the result.
    pub fn public_keys(&self, users: &[Uuid]) -> Result<HashMap<Uuid, PublicKeyJwk>> {
        let ids: Vec<String> = users.iter().map(Uuid::to_string).collect();
        self.store().with_conn(|conn| {
            let mut keys = HashMap::with_capacity(ids.len());
            for (id, raw) in queries::pub_keys_for(conn, &ids)? {
                if let Some(key) = parse_pub_key(&raw) {
                    keys.insert(crate::parse_uuid("user id", &id), key);
                }
            }
            Ok(keys)
        })
    }

    /// The effective roster of a channel with each member's published key,
    /// for building an envelope. Gated on the requester being on that
    /// roster.
    pub fn channel_keys(&self, requester: Uuid, channel: Uuid) -> Result<Vec<RosterEntry>> {
        let cid = channel.to_string();
        self.store().with_conn(|conn| {
            let visibility = resolve_visibility(conn, requester, &cid)?;
            if visibility.role == Role::Absent {
                return Err(Error::Authorization);
            }
            Ok(visibility.roster)
        })
    }
}
