use huddle_db::Store;
use huddle_engine::Engine;
use huddle_engine::users::NewUser;
use huddle_types::models::{Group, NewMember};
use uuid::Uuid;

pub fn engine() -> Engine {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Engine::new(Store::open_in_memory().unwrap())
}

pub fn register(engine: &Engine, name: &str) -> Uuid {
    engine
        .register_user(NewUser {
            username: name.into(),
            email: format!("{name}@example.com"),
            public: true,
        })
        .unwrap()
        .id
}

pub fn member(user_id: Uuid) -> NewMember {
    NewMember {
        user_id,
        admin: false,
    }
}

/// A group created by `admin` with `others` as plain members.
pub fn group_with(engine: &Engine, admin: Uuid, others: &[Uuid]) -> Group {
    let members: Vec<NewMember> = others.iter().copied().map(member).collect();
    engine
        .create_group(admin, "general chat", &members, false, false)
        .unwrap()
}

pub fn default_channel(group: &Group) -> Uuid {
    // The default channel is created first.
    group.channels[0]
}
