/// Membership and authorization scenarios: group/channel creation, the
/// tri-state membership lifecycle, and the guarded mutations that enforce
/// who may change what.
mod common;

use common::{default_channel, engine, group_with, member, register};
use huddle_engine::Scope;
use huddle_types::Error;
use huddle_types::models::{MessageBody, Role};

#[test]
fn group_creation_seeds_admin_roster_and_default_channel() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");

    // Duplicate initial member collapses to one row; the creator's own
    // entry wins over a non-admin duplicate of themself.
    let group = engine
        .create_group(alice, "book club", &[member(bobby), member(bobby), member(alice)], false, false)
        .unwrap();

    assert_eq!(group.members.len(), 2);
    let creator = group.members.iter().find(|m| m.user_id == alice).unwrap();
    assert!(creator.admin && creator.active);
    let other = group.members.iter().find(|m| m.user_id == bobby).unwrap();
    assert!(!other.admin && other.active);
    assert_eq!(group.channels.len(), 1);

    let log = engine.messages(default_channel(&group), alice, None).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(
        log[0].body,
        MessageBody::Plain("New group created by 'alice': book club".into())
    );
}

#[test]
fn duplicate_active_group_name_conflicts() {
    let engine = engine();
    let alice = register(&engine, "alice");
    engine.create_group(alice, "book club", &[], false, false).unwrap();
    let err = engine
        .create_group(alice, "book club", &[], false, false)
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[test]
fn removal_then_re_add_reactivates_the_same_row() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let group = group_with(&engine, alice, &[bobby]);
    let scope = Scope::Group(group.id);

    engine.remove_member(scope, alice, bobby).unwrap();
    let members = engine.group_info(alice, group.id).unwrap().members;
    let row = members.iter().find(|m| m.user_id == bobby).unwrap();
    assert!(!row.active);

    let members = engine.add_member(scope, alice, bobby, false).unwrap();
    assert_eq!(members.iter().filter(|m| m.user_id == bobby).count(), 1);
    assert!(members.iter().find(|m| m.user_id == bobby).unwrap().active);
}

#[test]
fn adding_an_active_member_again_conflicts() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let group = group_with(&engine, alice, &[bobby]);

    let err = engine
        .add_member(Scope::Group(group.id), alice, bobby, false)
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[test]
fn admins_are_never_removable() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let group = group_with(&engine, alice, &[bobby]);
    let scope = Scope::Group(group.id);

    // Not even by themself.
    assert!(matches!(
        engine.remove_member(scope, alice, alice).unwrap_err(),
        Error::Authorization
    ));
    // And a plain member cannot remove anyone but themself.
    let carol = register(&engine, "carol");
    engine.add_member(scope, alice, carol, false).unwrap();
    assert!(matches!(
        engine.remove_member(scope, bobby, carol).unwrap_err(),
        Error::Authorization
    ));
    // Self-removal of a non-admin is fine.
    engine.remove_member(scope, bobby, bobby).unwrap();
}

#[test]
fn join_and_leave_write_system_messages() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let group = group_with(&engine, alice, &[]);
    let scope = Scope::Group(group.id);

    engine.add_member(scope, alice, bobby, false).unwrap();
    engine.remove_member(scope, bobby, bobby).unwrap();

    let log = engine.messages(default_channel(&group), alice, None).unwrap();
    let texts: Vec<_> = log
        .iter()
        .filter_map(|m| match &m.body {
            MessageBody::Plain(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();
    assert!(texts.contains(&"'bobby' has accepted the invitation to join the group!"));
    assert!(texts.contains(&"'bobby' has left the group!"));
}

#[test]
fn channel_roster_is_scoped_to_the_group_roster() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let carol = register(&engine, "carol");
    let group = group_with(&engine, alice, &[bobby]);

    let channel = engine.create_channel(alice, group.id, "plans", &[]).unwrap();
    let scope = Scope::Channel(channel.id);

    // carol is not on the group roster.
    assert!(matches!(
        engine.add_member(scope, alice, carol, false).unwrap_err(),
        Error::Authorization
    ));
    // bobby is, but bobby is not a channel admin and cannot add.
    engine.add_member(scope, alice, bobby, false).unwrap();
    let dave = register(&engine, "david");
    engine.add_member(Scope::Group(group.id), alice, dave, false).unwrap();
    assert!(matches!(
        engine.add_member(scope, bobby, dave, false).unwrap_err(),
        Error::Authorization
    ));
}

#[test]
fn default_channel_cannot_take_explicit_members() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let group = group_with(&engine, alice, &[bobby]);

    let err = engine
        .add_member(Scope::Channel(default_channel(&group)), alice, bobby, false)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound("channel")));
}

#[test]
fn inactive_channel_keeps_its_name_reserved() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let group = group_with(&engine, alice, &[]);

    let channel = engine.create_channel(alice, group.id, "plans", &[]).unwrap();
    engine.deactivate(Scope::Channel(channel.id), alice).unwrap();

    let err = engine.create_channel(alice, group.id, "plans", &[]).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[test]
fn deactivation_requires_an_admin_of_that_scope() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let group = group_with(&engine, alice, &[bobby]);

    assert!(matches!(
        engine.deactivate(Scope::Group(group.id), bobby).unwrap_err(),
        Error::Authorization
    ));
    engine.deactivate(Scope::Group(group.id), alice).unwrap();

    // The group is dark: its default channel no longer answers.
    let err = engine
        .messages(default_channel(&group), alice, None)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound("group")));
}

#[test]
fn visibility_reports_effective_roster_and_role() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let carol = register(&engine, "carol");
    let group = group_with(&engine, alice, &[bobby]);

    // Default channel inherits the group roster.
    let vis = engine.visibility(bobby, default_channel(&group)).unwrap();
    assert_eq!(vis.role, Role::Member);
    assert_eq!(vis.roster.len(), 2);

    let vis = engine.visibility(carol, default_channel(&group)).unwrap();
    assert_eq!(vis.role, Role::Absent);

    // A named channel carries its own, smaller roster.
    let channel = engine.create_channel(alice, group.id, "plans", &[]).unwrap();
    let vis = engine.visibility(alice, channel.id).unwrap();
    assert_eq!(vis.role, Role::Admin);
    assert_eq!(vis.roster.len(), 1);
    assert_eq!(engine.visibility(bobby, channel.id).unwrap().role, Role::Absent);
}

#[test]
fn friend_group_reactivation_is_one_conditional_update() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let group = engine
        .create_group(alice, "FRIEND$alice/bobby", &[member(bobby)], true, true)
        .unwrap();

    engine.deactivate(Scope::Group(group.id), alice).unwrap();
    engine.reactivate_friend_group(group.id).unwrap();
    assert!(engine.group_info(alice, group.id).unwrap().active);

    // Already active: nothing matches.
    assert!(matches!(
        engine.reactivate_friend_group(group.id).unwrap_err(),
        Error::NotFound("group")
    ));
}

#[test]
fn profile_updates_keep_uniqueness() {
    let engine = engine();
    let _alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");

    let err = engine
        .update_profile(
            bobby,
            huddle_engine::users::ProfileUpdate {
                username: Some("ALICE".into()),
                ..Default::default()
            },
        )
        .unwrap_err();
    // Case-insensitive collision.
    assert!(matches!(err, Error::Conflict(_)));

    let updated = engine
        .update_profile(
            bobby,
            huddle_engine::users::ProfileUpdate {
                email: Some("Bobby@New.Example.com".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.email, "bobby@new.example.com");
}

#[test]
fn user_groups_tracks_active_memberships_only() {
    let engine = engine();
    let alice = register(&engine, "alice");
    let bobby = register(&engine, "bobby");
    let group = group_with(&engine, alice, &[bobby]);

    assert_eq!(engine.user_groups(bobby).unwrap(), vec![group.id]);
    engine.remove_member(Scope::Group(group.id), bobby, bobby).unwrap();
    assert!(engine.user_groups(bobby).unwrap().is_empty());
}
