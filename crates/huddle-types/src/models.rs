use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::envelope::{Envelope, PublicKeyJwk};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub public: bool,
    pub pub_key: Option<PublicKeyJwk>,
    /// Groups the user is an active member of, resolved on read.
    pub groups: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Per-user record scoped to a Group or a named Channel. Tri-state per user:
/// absent, present-inactive (soft-removed), present-active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: Uuid,
    pub active: bool,
    pub admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
    pub public: bool,
    /// True for 1:1 "friend" pairings.
    pub friend: bool,
    pub members: Vec<Membership>,
    pub channels: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: Uuid,
    pub group_id: Uuid,
    /// `None` marks the group's single default channel.
    pub name: Option<String>,
    pub active: bool,
    /// `None` means the roster is inherited from the owning group.
    pub members: Option<Vec<Membership>>,
    pub created_at: DateTime<Utc>,
}

/// Caller's resolved standing within a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Absent,
    Member,
    Admin,
}

/// One active member of an effective roster, carrying the published public
/// key so the envelope-building path is gated in one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub user_id: Uuid,
    pub username: String,
    pub admin: bool,
    pub pub_key: Option<PublicKeyJwk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visibility {
    pub role: Role,
    pub roster: Vec<RosterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: Uuid,
    pub emoji: String,
}

/// A message body is either an [`Envelope`] or a legacy plaintext string.
/// Untagged so legacy strings stay acceptable on the wire and at rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Encrypted(Envelope),
    Plain(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub active: bool,
    pub author_id: Uuid,
    /// Denormalized at append time; survives later profile changes.
    pub author_username: String,
    pub date: DateTime<Utc>,
    pub body: MessageBody,
    pub reactions: Vec<Reaction>,
}

/// Input shape for initial/added members. `active` is implied true.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewMember {
    pub user_id: Uuid,
    pub admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_plaintext_body_round_trips() {
        let body: MessageBody = serde_json::from_str("\"hello there\"").unwrap();
        assert_eq!(body, MessageBody::Plain("hello there".into()));
        assert_eq!(serde_json::to_string(&body).unwrap(), "\"hello there\"");
    }

    #[test]
    fn envelope_body_deserializes_as_encrypted() {
        let json = r#"{
            "message": {"ciphertext": "AAECAw==", "iv": "x9y8z7w6v5u4"},
            "sendingUserPublicKey": {"kty":"EC","crv":"P-256","x":"eA","y":"eQ"},
            "keyArray": []
        }"#;
        let body: MessageBody = serde_json::from_str(json).unwrap();
        assert!(matches!(body, MessageBody::Encrypted(_)));
    }
}
