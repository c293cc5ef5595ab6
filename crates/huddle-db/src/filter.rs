//! Typed membership filters, compiled internally to the store's native
//! filter syntax (SQL fragments over named parameters). The engine composes
//! these into single guarded statements instead of passing loose predicate
//! documents around.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Group,
    Channel,
}

impl ScopeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeKind::Group => "group",
            ScopeKind::Channel => "channel",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            ScopeKind::Group => "groups",
            ScopeKind::Channel => "channels",
        }
    }
}

/// A membership scope: a Group or a named Channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Group(Uuid),
    Channel(Uuid),
}

impl Scope {
    pub fn kind(self) -> ScopeKind {
        match self {
            Scope::Group(_) => ScopeKind::Group,
            Scope::Channel(_) => ScopeKind::Channel,
        }
    }

    pub fn id(self) -> Uuid {
        match self {
            Scope::Group(id) | Scope::Channel(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberFilter {
    ActiveMember,
    ActiveAdmin,
    ActiveNonAdmin,
}

impl MemberFilter {
    /// EXISTS fragment matching one membership row. `scope_param` and
    /// `user_param` are named-parameter placeholders bound by the caller.
    pub fn exists_sql(self, kind: ScopeKind, scope_param: &str, user_param: &str) -> String {
        let role = match self {
            MemberFilter::ActiveMember => "",
            MemberFilter::ActiveAdmin => " AND admin = 1",
            MemberFilter::ActiveNonAdmin => " AND admin = 0",
        };
        format!(
            "EXISTS (SELECT 1 FROM memberships \
             WHERE scope_kind = '{kind}' AND scope_id = {scope_param} \
               AND user_id = {user_param} AND active = 1{role})",
            kind = kind.as_str(),
        )
    }
}

/// Removal rule: the actor is the target themself, or holds an active admin
/// membership of the scope.
pub fn self_or_admin_sql(
    kind: ScopeKind,
    scope_param: &str,
    actor_param: &str,
    target_param: &str,
) -> String {
    format!(
        "({actor_param} = {target_param} OR {admin})",
        admin = MemberFilter::ActiveAdmin.exists_sql(kind, scope_param, actor_param),
    )
}

/// EXISTS fragment: the scope row itself is present and active.
pub fn scope_active_sql(kind: ScopeKind, scope_param: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM {table} WHERE id = {scope_param} AND active = 1)",
        table = kind.table(),
    )
}

/// EXISTS fragment: the user is on a channel's *effective* active roster.
/// A default channel (name IS NULL) inherits the owning group's rows; a
/// named channel carries its own. Also requires channel and group active.
pub fn effective_roster_sql(channel_param: &str, user_param: &str) -> String {
    format!(
        "EXISTS (SELECT 1 FROM channels c \
           JOIN groups g ON g.id = c.group_id \
           JOIN memberships m ON \
             ((c.name IS NULL AND m.scope_kind = 'group' AND m.scope_id = g.id) OR \
              (c.name IS NOT NULL AND m.scope_kind = 'channel' AND m.scope_id = c.id)) \
          WHERE c.id = {channel_param} AND c.active = 1 AND g.active = 1 \
            AND m.user_id = {user_param} AND m.active = 1)"
    )
}
