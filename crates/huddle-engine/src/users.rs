use huddle_db::queries;
use huddle_types::envelope::PublicKeyJwk;
use huddle_types::models::User;
use huddle_types::{Error, Result};
use rusqlite::{Connection, ToSql};
use tracing::warn;
use uuid::Uuid;

use crate::Engine;

pub const MIN_USERNAME_LENGTH: usize = 5;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub public: bool,
}

/// Partial profile update; unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub public: Option<bool>,
}

impl Engine {
    /// Insert a new profile row. Credential issuance (passwords, tokens,
    /// verification mail) lives with external collaborators; the repository
    /// only records the profile.
    pub fn register_user(&self, new: NewUser) -> Result<User> {
        let username = new.username.trim().to_string();
        if username.chars().count() < MIN_USERNAME_LENGTH {
            return Err(Error::Validation(format!(
                "usernames must be at least {MIN_USERNAME_LENGTH} characters"
            )));
        }
        let email = normalize_email(&new.email)?;

        let id = Uuid::new_v4().to_string();
        self.store().with_tx(|tx| {
            match queries::insert_user(tx, &id, &username, &email, new.public) {
                Ok(()) => {}
                Err(Error::Store(e)) if queries::is_unique_violation(&e) => {
                    return Err(unique_user_conflict(&e));
                }
                Err(e) => return Err(e),
            }
            load_user(tx, &id)
        })
    }

    pub fn update_profile(&self, user: Uuid, changes: ProfileUpdate) -> Result<User> {
        let uid = user.to_string();

        let mut sets: Vec<&str> = Vec::new();
        let mut text_values: Vec<(&str, String)> = Vec::new();
        if let Some(u) = &changes.username {
            let u = u.trim().to_string();
            if u.chars().count() < MIN_USERNAME_LENGTH {
                return Err(Error::Validation(format!(
                    "usernames must be at least {MIN_USERNAME_LENGTH} characters"
                )));
            }
            sets.push("username = :username");
            text_values.push((":username", u));
        }
        if let Some(e) = &changes.email {
            sets.push("email = :email");
            text_values.push((":email", normalize_email(e)?));
        }
        if changes.public.is_some() {
            sets.push("public = :public");
        }
        if sets.is_empty() {
            return Err(Error::Validation("no profile fields to update".into()));
        }

        let sql = format!(
            "UPDATE users SET {} WHERE id = :id AND active = 1",
            sets.join(", ")
        );

        self.store().with_tx(|tx| {
            let mut params: Vec<(&str, &dyn ToSql)> = text_values
                .iter()
                .map(|(name, value)| (*name, value as &dyn ToSql))
                .collect();
            if let Some(public) = &changes.public {
                params.push((":public", public));
            }
            params.push((":id", &uid));

            let matched = match tx.execute(&sql, params.as_slice()) {
                Ok(n) => n,
                Err(e) if queries::is_unique_violation(&e) => {
                    return Err(unique_user_conflict(&e));
                }
                Err(e) => return Err(e.into()),
            };
            if matched == 0 {
                return Err(Error::NotFound("user"));
            }
            load_user(tx, &uid)
        })
    }

    pub fn user(&self, id: Uuid) -> Result<User> {
        self.store().with_conn(|conn| load_user(conn, &id.to_string()))
    }

    /// Group ids the user is an active member of.
    pub fn user_groups(&self, user: Uuid) -> Result<Vec<Uuid>> {
        self.store().with_conn(|conn| {
            Ok(queries::group_ids_of_user(conn, &user.to_string())?
                .iter()
                .map(|g| crate::parse_uuid("group id", g))
                .collect())
        })
    }
}

pub(crate) fn load_user(conn: &Connection, id: &str) -> Result<User> {
    let row = queries::user_by_id(conn, id)?.ok_or(Error::NotFound("user"))?;
    let groups = queries::group_ids_of_user(conn, id)?
        .iter()
        .map(|g| crate::parse_uuid("group id", g))
        .collect();
    Ok(User {
        id: crate::parse_uuid("user id", &row.id),
        username: row.username,
        email: row.email,
        active: row.active,
        public: row.public,
        pub_key: row.pub_key.as_deref().and_then(parse_pub_key),
        groups,
        created_at: crate::parse_timestamp("created_at", &row.created_at),
    })
}

pub(crate) fn parse_pub_key(raw: &str) -> Option<PublicKeyJwk> {
    match serde_json::from_str(raw) {
        Ok(key) => Some(key),
        Err(e) => {
            warn!("corrupt stored public key: {e}");
            None
        }
    }
}

fn unique_user_conflict(e: &rusqlite::Error) -> Error {
    let what = if e.to_string().contains("users.email") {
        "email address"
    } else {
        "username"
    };
    Error::Conflict(format!("a user already exists with that {what}"))
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(Error::Validation(format!("invalid email address '{email}'")));
    }
    Ok(email)
}
