use huddle_db::filter::ScopeKind;
use huddle_db::queries;
use huddle_types::models::{Channel, NewMember, Role, RosterEntry, Visibility};
use huddle_types::{Error, Result};
use rusqlite::{Connection, named_params};
use tracing::info;
use uuid::Uuid;

use crate::members::{insert_membership, load_memberships};
use crate::users::parse_pub_key;
use crate::{Engine, messages};

impl Engine {
    /// Create a named channel inside a group. The actor must be on the
    /// group's active roster and becomes the channel's first admin; initial
    /// members must be on that roster too. The new log opens with a creation
    /// notice. Channel names are unique within a group, and a soft-deleted
    /// channel keeps its name reserved.
    pub fn create_channel(
        &self,
        actor: Uuid,
        group: Uuid,
        name: &str,
        initial_members: &[NewMember],
    ) -> Result<Channel> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("channel name required".into()));
        }
        let actor_id = actor.to_string();
        let gid = group.to_string();

        self.store().with_tx(|tx| {
            let creator = queries::user_by_id(tx, &actor_id)?
                .filter(|u| u.active)
                .ok_or(Error::NotFound("user"))?;
            queries::group_by_id(tx, &gid)?
                .filter(|g| g.active)
                .ok_or(Error::NotFound("group"))?;

            let group_roster: Vec<String> = queries::memberships_for(tx, ScopeKind::Group, &gid)?
                .into_iter()
                .filter(|m| m.active)
                .map(|m| m.user_id)
                .collect();
            if !group_roster.iter().any(|id| id == &actor_id) {
                return Err(Error::Authorization);
            }

            let channel_id = Uuid::new_v4().to_string();
            match tx.execute(
                "INSERT INTO channels (id, group_id, name) VALUES (:id, :group, :name)",
                named_params! { ":id": channel_id, ":group": gid, ":name": name },
            ) {
                Ok(_) => {}
                Err(e) if queries::is_unique_violation(&e) => {
                    return Err(Error::Conflict(format!(
                        "the group already has a channel named '{name}'"
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            insert_membership(tx, ScopeKind::Channel, &channel_id, &actor_id, true)?;
            let mut seen = vec![actor];
            for member in initial_members {
                if seen.contains(&member.user_id) {
                    continue;
                }
                seen.push(member.user_id);
                let member_id = member.user_id.to_string();
                if !group_roster.iter().any(|id| id == &member_id) {
                    return Err(Error::Authorization);
                }
                insert_membership(tx, ScopeKind::Channel, &channel_id, &member_id, member.admin)?;
            }

            messages::push_system_message(
                tx,
                &channel_id,
                &actor_id,
                &creator.username,
                &format!("New channel created by '{}': {name}", creator.username),
            )?;

            info!("channel {channel_id} created in group {gid} by {actor_id}");
            load_channel(tx, &channel_id)
        })
    }

    /// Gated read: the requester must be on the channel's effective roster.
    pub fn channel_info(&self, requester: Uuid, channel: Uuid) -> Result<Channel> {
        let cid = channel.to_string();
        self.store().with_conn(|conn| {
            let visibility = resolve_visibility(conn, requester, &cid)?;
            if visibility.role == Role::Absent {
                return Err(Error::Authorization);
            }
            load_channel(conn, &cid)
        })
    }

    /// Resolve the requester's role and the channel's effective active
    /// roster. A default channel (no name) answers with the owning group's
    /// roster; a named channel answers with its own.
    pub fn visibility(&self, requester: Uuid, channel: Uuid) -> Result<Visibility> {
        let cid = channel.to_string();
        self.store()
            .with_conn(|conn| resolve_visibility(conn, requester, &cid))
    }
}

pub(crate) fn resolve_visibility(
    conn: &Connection,
    requester: Uuid,
    channel_id: &str,
) -> Result<Visibility> {
    let channel = queries::channel_by_id(conn, channel_id)?
        .filter(|c| c.active)
        .ok_or(Error::NotFound("channel"))?;
    queries::group_by_id(conn, &channel.group_id)?
        .filter(|g| g.active)
        .ok_or(Error::NotFound("group"))?;

    let (kind, scope_id) = if channel.name.is_none() {
        (ScopeKind::Group, channel.group_id.as_str())
    } else {
        (ScopeKind::Channel, channel.id.as_str())
    };

    let roster: Vec<RosterEntry> = queries::roster_for(conn, kind, scope_id)?
        .into_iter()
        .map(|row| RosterEntry {
            user_id: crate::parse_uuid("roster user id", &row.user_id),
            username: row.username,
            admin: row.admin,
            pub_key: row.pub_key.as_deref().and_then(parse_pub_key),
        })
        .collect();

    let role = roster
        .iter()
        .find(|entry| entry.user_id == requester)
        .map_or(Role::Absent, |entry| {
            if entry.admin { Role::Admin } else { Role::Member }
        });

    Ok(Visibility { role, roster })
}

pub(crate) fn load_channel(conn: &Connection, id: &str) -> Result<Channel> {
    let row = queries::channel_by_id(conn, id)?.ok_or(Error::NotFound("channel"))?;
    // Default channel: roster inherited, none of its own.
    let members = if row.name.is_some() {
        Some(load_memberships(conn, ScopeKind::Channel, id)?)
    } else {
        None
    };
    Ok(Channel {
        id: crate::parse_uuid("channel id", &row.id),
        group_id: crate::parse_uuid("group id", &row.group_id),
        name: row.name,
        active: row.active,
        members,
        created_at: crate::parse_timestamp("created_at", &row.created_at),
    })
}
