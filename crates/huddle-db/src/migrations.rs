use huddle_types::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email       TEXT NOT NULL UNIQUE,
            active      INTEGER NOT NULL DEFAULT 1,
            public      INTEGER NOT NULL DEFAULT 1,
            pub_key     TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS groups (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL,
            active      INTEGER NOT NULL DEFAULT 1,
            public      INTEGER NOT NULL DEFAULT 1,
            friend      INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Group names are unique only while the group is active
        CREATE UNIQUE INDEX IF NOT EXISTS idx_groups_active_name
            ON groups(name) WHERE active = 1;

        CREATE TABLE IF NOT EXISTS channels (
            id          TEXT PRIMARY KEY,
            group_id    TEXT NOT NULL REFERENCES groups(id),
            name        TEXT,       -- NULL marks the group's default channel
            active      INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Inactive channels still reserve their name within the group
        CREATE UNIQUE INDEX IF NOT EXISTS idx_channels_group_name
            ON channels(group_id, name) WHERE name IS NOT NULL;

        -- At most one default channel per group
        CREATE UNIQUE INDEX IF NOT EXISTS idx_channels_default
            ON channels(group_id) WHERE name IS NULL;

        -- Rows exist only for groups and explicit-roster (named) channels;
        -- a default channel inherits its group's rows. Soft-removal flips
        -- active, the row itself is never deleted.
        CREATE TABLE IF NOT EXISTS memberships (
            scope_kind  TEXT NOT NULL CHECK (scope_kind IN ('group', 'channel')),
            scope_id    TEXT NOT NULL,
            user_id     TEXT NOT NULL REFERENCES users(id),
            active      INTEGER NOT NULL DEFAULT 1,
            admin       INTEGER NOT NULL DEFAULT 0,
            joined_at   TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_kind, scope_id, user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_memberships_user
            ON memberships(user_id, scope_kind);

        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            channel_id      TEXT NOT NULL REFERENCES channels(id),
            active          INTEGER NOT NULL DEFAULT 1,
            author_id       TEXT NOT NULL,
            author_username TEXT NOT NULL,
            body            TEXT NOT NULL,      -- JSON: envelope or legacy string
            reactions       TEXT NOT NULL DEFAULT '[]',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_channel
            ON messages(channel_id, created_at);
        ",
    )?;

    info!("Store migrations complete");
    Ok(())
}
