//! Authorization engine, message log and key directory.
//!
//! Every state-changing membership operation is phrased as a conditional
//! update whose WHERE clause *is* the authorization rule; the match count is
//! the only success signal, so there is no check-then-act window. Losers of
//! a race observe zero matched rows and get the operation's error kind
//! immediately — nothing here retries.

pub mod channels;
pub mod groups;
pub mod keys;
pub mod members;
pub mod messages;
pub mod users;

use chrono::{DateTime, SecondsFormat, Utc};
use huddle_db::Store;
use tracing::warn;
use uuid::Uuid;

pub use huddle_db::filter::Scope;

pub struct Engine {
    store: Store,
}

impl Engine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// Stored timestamp format; fixed-width so lexical order is chronological.
pub(crate) fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn parse_uuid(field: &'static str, value: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("corrupt {field} '{value}': {e}");
        Uuid::default()
    })
}

pub(crate) fn parse_timestamp(field: &'static str, value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // datetime('now') defaults are naive "YYYY-MM-DD HH:MM:SS" in UTC
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("corrupt {field} '{value}': {e}");
            DateTime::default()
        })
}
