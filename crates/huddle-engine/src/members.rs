//! Roster mutations. Each one is a guarded statement whose WHERE clause
//! encodes the full authorization rule; zero matched rows is the only
//! failure signal, classified after the fact inside the same transaction.

use huddle_db::filter::{MemberFilter, Scope, ScopeKind, scope_active_sql, self_or_admin_sql};
use huddle_db::queries;
use huddle_types::models::Membership;
use huddle_types::{Error, Result};
use rusqlite::{Connection, ToSql};
use tracing::debug;
use uuid::Uuid;

use crate::{Engine, messages};

impl Engine {
    /// Add `target` to a scope, or reactivate their soft-removed row.
    ///
    /// Group adds carry no actor requirement beyond the group being active:
    /// they model invitation acceptance, where the inviter's authority was
    /// checked when the invite was issued. Channel adds require the actor to
    /// be an active admin of the channel and the target to be on the owning
    /// group's active roster. The default channel has no roster of its own
    /// and can never be a target.
    pub fn add_member(
        &self,
        scope: Scope,
        actor: Uuid,
        target: Uuid,
        as_admin: bool,
    ) -> Result<Vec<Membership>> {
        let kind = scope.kind();
        let scope_id = scope.id().to_string();
        let actor_id = actor.to_string();
        let target_id = target.to_string();

        let guards = add_guards(kind);
        let update = format!(
            "UPDATE memberships SET active = 1, admin = :admin \
             WHERE scope_kind = '{kind}' AND scope_id = :scope AND user_id = :target \
               AND active = 0 AND {guards}",
            kind = kind.as_str(),
        );
        let insert = format!(
            "INSERT INTO memberships (scope_kind, scope_id, user_id, admin) \
             SELECT '{kind}', :scope, :target, :admin \
             WHERE NOT EXISTS (SELECT 1 FROM memberships \
                               WHERE scope_kind = '{kind}' AND scope_id = :scope \
                                 AND user_id = :target) \
               AND {guards}",
            kind = kind.as_str(),
        );

        self.store().with_tx(|tx| {
            let mut params: Vec<(&str, &dyn ToSql)> = vec![
                (":scope", &scope_id),
                (":target", &target_id),
                (":admin", &as_admin),
            ];
            if kind == ScopeKind::Channel {
                params.push((":actor", &actor_id));
            }

            let mut matched = tx.execute(&update, params.as_slice())?;
            if matched == 0 {
                matched = tx.execute(&insert, params.as_slice())?;
            }
            if matched == 0 {
                return Err(classify_add(tx, kind, &scope_id, &target_id));
            }

            let member = queries::user_by_id(tx, &target_id)?
                .ok_or(Error::NotFound("user"))?;
            match kind {
                ScopeKind::Group => {
                    if let Some(channel) = queries::default_channel_id(tx, &scope_id)? {
                        messages::push_system_message(
                            tx,
                            &channel,
                            &target_id,
                            &member.username,
                            &format!(
                                "'{}' has accepted the invitation to join the group!",
                                member.username
                            ),
                        )?;
                    }
                }
                ScopeKind::Channel => {
                    messages::push_system_message(
                        tx,
                        &scope_id,
                        &target_id,
                        &member.username,
                        &format!("'{}' is now a member of the channel!", member.username),
                    )?;
                }
            }

            debug!("{} {scope_id}: added member {target_id}", kind.as_str());
            load_memberships(tx, kind, &scope_id)
        })
    }

    /// Soft-remove `target` from a scope. Allowed for the target themself or
    /// for an active admin of the scope, and only against non-admin rows;
    /// admins must be demoted out of band before removal.
    pub fn remove_member(&self, scope: Scope, actor: Uuid, target: Uuid) -> Result<()> {
        let kind = scope.kind();
        let scope_id = scope.id().to_string();
        let actor_id = actor.to_string();
        let target_id = target.to_string();

        let sql = format!(
            "UPDATE memberships SET active = 0 \
             WHERE scope_kind = '{kind}' AND scope_id = :scope AND user_id = :target \
               AND {target_removable} \
               AND {scope_active} \
               AND {self_or_admin}",
            kind = kind.as_str(),
            target_removable = MemberFilter::ActiveNonAdmin.exists_sql(kind, ":scope", ":target"),
            scope_active = scope_active_sql(kind, ":scope"),
            self_or_admin = self_or_admin_sql(kind, ":scope", ":actor", ":target"),
        );

        self.store().with_tx(|tx| {
            let matched = tx.execute(
                &sql,
                rusqlite::named_params! {
                    ":scope": scope_id,
                    ":target": target_id,
                    ":actor": actor_id,
                },
            )?;
            if matched == 0 {
                return Err(classify_remove(tx, kind, &scope_id, &target_id));
            }

            let member = queries::user_by_id(tx, &target_id)?
                .ok_or(Error::NotFound("user"))?;
            let (channel, notice) = match kind {
                ScopeKind::Group => (
                    queries::default_channel_id(tx, &scope_id)?,
                    format!("'{}' has left the group!", member.username),
                ),
                ScopeKind::Channel => (
                    Some(scope_id.clone()),
                    format!("'{}' has left the channel!", member.username),
                ),
            };
            if let Some(channel) = channel {
                messages::push_system_message(
                    tx,
                    &channel,
                    &target_id,
                    &member.username,
                    &notice,
                )?;
            }

            debug!("{} {scope_id}: removed member {target_id}", kind.as_str());
            Ok(())
        })
    }

    /// Soft-delete a scope outright. Only an active admin of the scope may
    /// do it; memberships and messages stay in place but every roster guard
    /// requires the scope row active, so the scope goes dark atomically.
    pub fn deactivate(&self, scope: Scope, actor: Uuid) -> Result<()> {
        let kind = scope.kind();
        let scope_id = scope.id().to_string();
        let actor_id = actor.to_string();

        let sql = format!(
            "UPDATE {table} SET active = 0 WHERE id = :scope AND active = 1 AND {actor_admin}",
            table = kind.table(),
            actor_admin = MemberFilter::ActiveAdmin.exists_sql(kind, ":scope", ":actor"),
        );

        self.store().with_tx(|tx| {
            let matched = tx.execute(
                &sql,
                rusqlite::named_params! { ":scope": scope_id, ":actor": actor_id },
            )?;
            if matched == 0 {
                return Err(if scope_missing(tx, kind, &scope_id)? {
                    Error::NotFound(kind.as_str())
                } else {
                    Error::Authorization
                });
            }
            debug!("{} {scope_id}: deactivated by {actor_id}", kind.as_str());
            Ok(())
        })
    }
}

/// Guard fragment for add: the scope must be live and the target must be a
/// real active user; channel adds also demand an admin actor and a target on
/// the owning group's roster.
fn add_guards(kind: ScopeKind) -> String {
    let target_active = "EXISTS (SELECT 1 FROM users WHERE id = :target AND active = 1)";
    match kind {
        ScopeKind::Group => format!(
            "{} AND {target_active}",
            scope_active_sql(ScopeKind::Group, ":scope"),
        ),
        ScopeKind::Channel => format!(
            "EXISTS (SELECT 1 FROM channels c JOIN groups g ON g.id = c.group_id \
              WHERE c.id = :scope AND c.name IS NOT NULL AND c.active = 1 AND g.active = 1) \
             AND {actor_admin} \
             AND EXISTS (SELECT 1 FROM channels c \
                   JOIN memberships m ON m.scope_kind = 'group' AND m.scope_id = c.group_id \
                  WHERE c.id = :scope AND m.user_id = :target AND m.active = 1) \
             AND {target_active}",
            actor_admin =
                MemberFilter::ActiveAdmin.exists_sql(ScopeKind::Channel, ":scope", ":actor"),
        ),
    }
}

fn classify_add(
    conn: &Connection,
    kind: ScopeKind,
    scope_id: &str,
    target_id: &str,
) -> Error {
    match explain_add(conn, kind, scope_id, target_id) {
        Ok(err) => err,
        Err(e) => e,
    }
}

fn explain_add(
    conn: &Connection,
    kind: ScopeKind,
    scope_id: &str,
    target_id: &str,
) -> Result<Error> {
    if scope_missing(conn, kind, scope_id)? {
        return Ok(Error::NotFound(kind.as_str()));
    }
    let target_live = queries::user_by_id(conn, target_id)?.is_some_and(|u| u.active);
    if !target_live {
        return Ok(Error::NotFound("user"));
    }
    let already = queries::memberships_for(conn, kind, scope_id)?
        .iter()
        .any(|m| m.user_id == target_id && m.active);
    if already {
        return Ok(Error::Conflict("already an active member".into()));
    }
    Ok(Error::Authorization)
}

fn classify_remove(
    conn: &Connection,
    kind: ScopeKind,
    scope_id: &str,
    target_id: &str,
) -> Error {
    let explain = || -> Result<Error> {
        if scope_missing(conn, kind, scope_id)? {
            return Ok(Error::NotFound(kind.as_str()));
        }
        let on_roster = queries::memberships_for(conn, kind, scope_id)?
            .iter()
            .any(|m| m.user_id == target_id && m.active);
        if !on_roster {
            return Ok(Error::NotFound("user"));
        }
        Ok(Error::Authorization)
    };
    match explain() {
        Ok(err) => err,
        Err(e) => e,
    }
}

/// True when the scope row is absent or soft-deleted. Default channels count
/// as missing for member operations since they carry no roster.
fn scope_missing(conn: &Connection, kind: ScopeKind, scope_id: &str) -> Result<bool> {
    Ok(match kind {
        ScopeKind::Group => !queries::group_by_id(conn, scope_id)?.is_some_and(|g| g.active),
        ScopeKind::Channel => !queries::channel_by_id(conn, scope_id)?
            .is_some_and(|c| c.active && c.name.is_some()),
    })
}

pub(crate) fn insert_membership(
    conn: &Connection,
    kind: ScopeKind,
    scope_id: &str,
    user_id: &str,
    admin: bool,
) -> Result<()> {
    conn.execute(
        "INSERT INTO memberships (scope_kind, scope_id, user_id, admin) \
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![kind.as_str(), scope_id, user_id, admin],
    )?;
    Ok(())
}

pub(crate) fn membership_from_row(row: &huddle_db::models::MembershipRow) -> Membership {
    Membership {
        user_id: crate::parse_uuid("member user id", &row.user_id),
        active: row.active,
        admin: row.admin,
    }
}

pub(crate) fn load_memberships(
    conn: &Connection,
    kind: ScopeKind,
    scope_id: &str,
) -> Result<Vec<Membership>> {
    Ok(queries::memberships_for(conn, kind, scope_id)?
        .iter()
        .map(membership_from_row)
        .collect())
}
