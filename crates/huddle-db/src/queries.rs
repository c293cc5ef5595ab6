use huddle_types::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::filter::ScopeKind;
use crate::models::{ChannelRow, GroupRow, MembershipRow, MessageRow, RosterRow, UserRow};

/// Retrieval window: the last N messages of a channel, before the
/// active/date filters are applied. Storage itself is unbounded.
pub const MESSAGE_WINDOW: u32 = 200;

// -- Users --

pub fn insert_user(
    conn: &Connection,
    id: &str,
    username: &str,
    email: &str,
    public: bool,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, public) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id, username, email, public],
    )?;
    Ok(())
}

pub fn user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    query_user(conn, "id = ?1", id)
}

/// Case-insensitive: the username column carries COLLATE NOCASE.
pub fn user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    query_user(conn, "username = ?1", username)
}

pub fn user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    query_user(conn, "email = ?1", email)
}

fn query_user(conn: &Connection, predicate: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, active, public, pub_key, created_at \
         FROM users WHERE {predicate}"
    );
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                active: row.get(3)?,
                public: row.get(4)?,
                pub_key: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;
    Ok(row)
}

/// Public keys for a set of users: active users with a published key only.
pub fn pub_keys_for(conn: &Connection, user_ids: &[String]) -> Result<Vec<(String, String)>> {
    if user_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=user_ids.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT id, pub_key FROM users \
         WHERE active = 1 AND pub_key IS NOT NULL AND id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = user_ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Groups / channels --

pub fn group_by_id(conn: &Connection, id: &str) -> Result<Option<GroupRow>> {
    let row = conn
        .query_row(
            "SELECT id, name, active, public, friend, created_at FROM groups WHERE id = ?1",
            [id],
            |row| {
                Ok(GroupRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    active: row.get(2)?,
                    public: row.get(3)?,
                    friend: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn channel_by_id(conn: &Connection, id: &str) -> Result<Option<ChannelRow>> {
    let row = conn
        .query_row(
            "SELECT id, group_id, name, active, created_at FROM channels WHERE id = ?1",
            [id],
            |row| {
                Ok(ChannelRow {
                    id: row.get(0)?,
                    group_id: row.get(1)?,
                    name: row.get(2)?,
                    active: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn default_channel_id(conn: &Connection, group_id: &str) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM channels WHERE group_id = ?1 AND name IS NULL",
            [group_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn channel_ids_of_group(conn: &Connection, group_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT id FROM channels WHERE group_id = ?1 ORDER BY rowid")?;
    let rows = stmt
        .query_map([group_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Memberships --

/// Full membership list of a scope, soft-removed entries included, in
/// insertion order.
pub fn memberships_for(
    conn: &Connection,
    kind: ScopeKind,
    scope_id: &str,
) -> Result<Vec<MembershipRow>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, active, admin FROM memberships \
         WHERE scope_kind = ?1 AND scope_id = ?2 ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([kind.as_str(), scope_id], |row| {
            Ok(MembershipRow {
                user_id: row.get(0)?,
                active: row.get(1)?,
                admin: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Active members of a scope joined with their user record.
pub fn roster_for(conn: &Connection, kind: ScopeKind, scope_id: &str) -> Result<Vec<RosterRow>> {
    let mut stmt = conn.prepare(
        "SELECT m.user_id, u.username, m.admin, u.pub_key \
         FROM memberships m JOIN users u ON u.id = m.user_id \
         WHERE m.scope_kind = ?1 AND m.scope_id = ?2 AND m.active = 1 \
         ORDER BY m.rowid",
    )?;
    let rows = stmt
        .query_map([kind.as_str(), scope_id], |row| {
            Ok(RosterRow {
                user_id: row.get(0)?,
                username: row.get(1)?,
                admin: row.get(2)?,
                pub_key: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn group_ids_of_user(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT scope_id FROM memberships \
         WHERE scope_kind = 'group' AND user_id = ?1 AND active = 1 ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([user_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Messages --

/// Last [`MESSAGE_WINDOW`] rows of the channel by insertion order, then
/// filtered to active rows newer than `since`, returned oldest-first.
pub fn recent_messages(
    conn: &Connection,
    channel_id: &str,
    since: Option<&str>,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, active, author_id, author_username, body, reactions, created_at \
         FROM (SELECT rowid AS seq, * FROM messages WHERE channel_id = :channel \
               ORDER BY rowid DESC LIMIT :limit) \
         WHERE active = 1 AND (:since IS NULL OR created_at > :since) \
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map(
            rusqlite::named_params! {
                ":channel": channel_id,
                ":limit": MESSAGE_WINDOW,
                ":since": since,
            },
            |row| {
                Ok(MessageRow {
                    id: row.get(0)?,
                    active: row.get(1)?,
                    author_id: row.get(2)?,
                    author_username: row.get(3)?,
                    body: row.get(4)?,
                    reactions: row.get(5)?,
                    created_at: row.get(6)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Error classification --

/// True when an execute failed on a UNIQUE constraint; the engine maps these
/// to its conflict kind instead of a bare store fault.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    ) && err.to_string().contains("UNIQUE")
}
