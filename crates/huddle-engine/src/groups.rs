use huddle_db::filter::ScopeKind;
use huddle_db::queries;
use huddle_types::models::{Group, NewMember};
use huddle_types::{Error, Result};
use rusqlite::{Connection, named_params};
use tracing::info;
use uuid::Uuid;

use crate::members::{insert_membership, membership_from_row};
use crate::{Engine, messages};

impl Engine {
    /// Create a group with the actor force-included as its active admin,
    /// plus de-duplicated `initial_members`. The group's default channel
    /// (name = NULL, roster inherited) is created in the same transaction
    /// and opens its log with a creation notice.
    pub fn create_group(
        &self,
        actor: Uuid,
        name: &str,
        initial_members: &[NewMember],
        is_private: bool,
        is_friend: bool,
    ) -> Result<Group> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("group name required".into()));
        }
        let actor_id = actor.to_string();

        self.store().with_tx(|tx| {
            let creator = queries::user_by_id(tx, &actor_id)?
                .filter(|u| u.active)
                .ok_or(Error::NotFound("user"))?;

            let group_id = Uuid::new_v4().to_string();
            match tx.execute(
                "INSERT INTO groups (id, name, public, friend) \
                 VALUES (:id, :name, :public, :friend)",
                named_params! {
                    ":id": group_id,
                    ":name": name,
                    ":public": !is_private,
                    ":friend": is_friend,
                },
            ) {
                Ok(_) => {}
                Err(e) if queries::is_unique_violation(&e) => {
                    return Err(Error::Conflict(format!(
                        "a group already exists with the name '{name}'"
                    )));
                }
                Err(e) => return Err(e.into()),
            }

            // Actor first, then initial members minus duplicates.
            insert_membership(tx, ScopeKind::Group, &group_id, &actor_id, true)?;
            let mut seen = vec![actor];
            for member in initial_members {
                if seen.contains(&member.user_id) {
                    continue;
                }
                seen.push(member.user_id);
                let member_id = member.user_id.to_string();
                queries::user_by_id(tx, &member_id)?
                    .filter(|u| u.active)
                    .ok_or(Error::NotFound("user"))?;
                insert_membership(tx, ScopeKind::Group, &group_id, &member_id, member.admin)?;
            }

            // Default channel: no name, no roster of its own.
            let channel_id = Uuid::new_v4().to_string();
            tx.execute(
                "INSERT INTO channels (id, group_id, name) VALUES (:id, :group, NULL)",
                named_params! { ":id": channel_id, ":group": group_id },
            )?;

            let notice = if is_friend {
                format!("New friend group created by '{}'", creator.username)
            } else {
                format!("New group created by '{}': {name}", creator.username)
            };
            messages::push_system_message(tx, &channel_id, &actor_id, &creator.username, &notice)?;

            info!("group {group_id} created by {actor_id}");
            load_group(tx, &group_id)
        })
    }

    /// Gated read: the actor must be an active member of the group.
    pub fn group_info(&self, actor: Uuid, group: Uuid) -> Result<Group> {
        let gid = group.to_string();
        self.store().with_conn(|conn| {
            let loaded = load_group(conn, &gid)?;
            if !loaded.active {
                return Err(Error::NotFound("group"));
            }
            let on_roster = loaded
                .members
                .iter()
                .any(|m| m.active && m.user_id == actor);
            if !on_roster {
                return Err(Error::Authorization);
            }
            Ok(loaded)
        })
    }

    /// A soft-deleted friend pairing can be revived by a fresh invite; one
    /// conditional update keyed on the friend flag.
    pub fn reactivate_friend_group(&self, group: Uuid) -> Result<()> {
        let gid = group.to_string();
        let matched = self.store().conditional_update(
            "UPDATE groups SET active = 1 WHERE id = :id AND friend = 1 AND active = 0",
            &[(":id", &gid)],
        )?;
        if matched == 0 {
            return Err(Error::NotFound("group"));
        }
        Ok(())
    }
}

pub(crate) fn load_group(conn: &Connection, id: &str) -> Result<Group> {
    let row = queries::group_by_id(conn, id)?.ok_or(Error::NotFound("group"))?;
    let members = queries::memberships_for(conn, ScopeKind::Group, id)?
        .iter()
        .map(membership_from_row)
        .collect();
    let channels = queries::channel_ids_of_group(conn, id)?
        .iter()
        .map(|c| crate::parse_uuid("channel id", c))
        .collect();
    Ok(Group {
        id: crate::parse_uuid("group id", &row.id),
        name: row.name,
        active: row.active,
        public: row.public,
        friend: row.friend,
        members,
        channels,
        created_at: crate::parse_timestamp("created_at", &row.created_at),
    })
}
