//! Append-only per-channel log. Appends are gated by the effective roster
//! in the insert statement itself; reads apply the retrieval window of the
//! last [`queries::MESSAGE_WINDOW`] rows before any filtering, so storage
//! stays unbounded while clients only ever see the recent slice.

use chrono::{DateTime, Utc};
use huddle_db::filter::effective_roster_sql;
use huddle_db::models::MessageRow;
use huddle_db::queries;
use huddle_types::models::{Message, MessageBody, Role};
use huddle_types::{Error, Result};
use rusqlite::{Connection, named_params};
use tracing::warn;
use uuid::Uuid;

use crate::channels::resolve_visibility;
use crate::Engine;

impl Engine {
    /// Append a message authored by `author`. One guarded insert: the row
    /// lands only if the author is on the channel's effective active roster,
    /// with the author's username denormalized in at the same time.
    pub fn append_message(
        &self,
        channel: Uuid,
        author: Uuid,
        body: &MessageBody,
    ) -> Result<Message> {
        let cid = channel.to_string();
        let author_id = author.to_string();
        let raw_body = serde_json::to_string(body)
            .map_err(|e| Error::Validation(format!("unserializable message body: {e}")))?;
        let id = Uuid::new_v4().to_string();
        let date = crate::now();
        let created_at = crate::timestamp(date);

        let sql = format!(
            "INSERT INTO messages (id, channel_id, author_id, author_username, body, created_at) \
             SELECT :id, :channel, :author, u.username, :body, :now \
             FROM users u \
             WHERE u.id = :author AND u.active = 1 AND {roster}",
            roster = effective_roster_sql(":channel", ":author"),
        );

        self.store().with_tx(|tx| {
            let matched = tx.execute(
                &sql,
                named_params! {
                    ":id": id,
                    ":channel": cid,
                    ":author": author_id,
                    ":body": raw_body,
                    ":now": created_at,
                },
            )?;
            if matched == 0 {
                return Err(classify_log_access(tx, &cid, &author_id));
            }

            let author_row = queries::user_by_id(tx, &author_id)?
                .ok_or(Error::NotFound("user"))?;
            Ok(Message {
                id: crate::parse_uuid("message id", &id),
                active: true,
                author_id: author,
                author_username: author_row.username,
                date,
                body: body.clone(),
                reactions: vec![],
            })
        })
    }

    /// Recent messages of a channel, oldest-first. The requester is gated by
    /// the same effective-roster rule as appends. `since` trims the window
    /// further; it never widens it past the last 200 rows.
    pub fn messages(
        &self,
        channel: Uuid,
        requester: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Message>> {
        let cid = channel.to_string();
        self.store().with_conn(|conn| {
            let visibility = resolve_visibility(conn, requester, &cid)?;
            if visibility.role == Role::Absent {
                return Err(Error::Authorization);
            }

            let since = since.map(crate::timestamp);
            Ok(queries::recent_messages(conn, &cid, since.as_deref())?
                .iter()
                .map(message_from_row)
                .collect())
        })
    }
}

/// Why did a guarded append match nothing: dead channel or group reads as
/// not-found, everything else is an authorization failure.
fn classify_log_access(conn: &Connection, channel_id: &str, user_id: &str) -> Error {
    let explain = || -> Result<Error> {
        let channel = match queries::channel_by_id(conn, channel_id)? {
            Some(c) if c.active => c,
            _ => return Ok(Error::NotFound("channel")),
        };
        let group_live =
            queries::group_by_id(conn, &channel.group_id)?.is_some_and(|g| g.active);
        if !group_live {
            return Ok(Error::NotFound("group"));
        }
        let user_live = queries::user_by_id(conn, user_id)?.is_some_and(|u| u.active);
        if !user_live {
            return Ok(Error::NotFound("user"));
        }
        Ok(Error::Authorization)
    };
    match explain() {
        Ok(err) => err,
        Err(e) => e,
    }
}

pub(crate) fn message_from_row(row: &MessageRow) -> Message {
    let body = match serde_json::from_str(&row.body) {
        Ok(body) => body,
        Err(e) => {
            warn!("corrupt message body in {}: {e}", row.id);
            MessageBody::Plain(row.body.clone())
        }
    };
    let reactions = serde_json::from_str(&row.reactions).unwrap_or_else(|e| {
        warn!("corrupt reactions in {}: {e}", row.id);
        vec![]
    });
    Message {
        id: crate::parse_uuid("message id", &row.id),
        active: row.active,
        author_id: crate::parse_uuid("author id", &row.author_id),
        author_username: row.author_username.clone(),
        date: crate::parse_timestamp("created_at", &row.created_at),
        body,
        reactions,
    }
}

/// Service notices (creation, joins, departures) share the log with user
/// messages; they are plain string bodies authored by the subject user.
pub(crate) fn push_system_message(
    conn: &Connection,
    channel_id: &str,
    author_id: &str,
    author_username: &str,
    text: &str,
) -> Result<()> {
    let body = serde_json::Value::String(text.to_string()).to_string();
    conn.execute(
        "INSERT INTO messages (id, channel_id, author_id, author_username, body, created_at) \
         VALUES (:id, :channel, :author, :username, :body, :now)",
        named_params! {
            ":id": Uuid::new_v4().to_string(),
            ":channel": channel_id,
            ":author": author_id,
            ":username": author_username,
            ":body": body,
            ":now": crate::timestamp(crate::now()),
        },
    )?;
    Ok(())
}
