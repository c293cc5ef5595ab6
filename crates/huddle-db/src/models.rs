//! Raw row shapes as stored. Id/timestamp parsing into typed models happens
//! at the engine boundary.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub public: bool,
    pub pub_key: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct GroupRow {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub public: bool,
    pub friend: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct ChannelRow {
    pub id: String,
    pub group_id: String,
    pub name: Option<String>,
    pub active: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MembershipRow {
    pub user_id: String,
    pub active: bool,
    pub admin: bool,
}

/// Active roster entry joined with the user record for username + key.
#[derive(Debug, Clone)]
pub struct RosterRow {
    pub user_id: String,
    pub username: String,
    pub admin: bool,
    pub pub_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub active: bool,
    pub author_id: String,
    pub author_username: String,
    pub body: String,
    pub reactions: String,
    pub created_at: String,
}
