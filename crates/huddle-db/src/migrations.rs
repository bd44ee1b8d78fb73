use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // No REFERENCES clauses: cascades are performed by the handlers, and
        // thread replies may outlive their parent message.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          BLOB PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                image       TEXT,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE workspaces (
                id              BLOB PRIMARY KEY,
                name            TEXT NOT NULL,
                owner_user_id   BLOB NOT NULL,
                join_code       TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE TABLE members (
                id              BLOB PRIMARY KEY,
                user_id         BLOB NOT NULL,
                workspace_id    BLOB NOT NULL,
                role            TEXT NOT NULL CHECK (role IN ('admin', 'member')),
                name            TEXT NOT NULL,
                image           TEXT,
                created_at      INTEGER NOT NULL,
                UNIQUE(workspace_id, user_id)
            );

            CREATE INDEX idx_members_user ON members(user_id);

            CREATE TABLE channels (
                id              BLOB PRIMARY KEY,
                name            TEXT NOT NULL,
                workspace_id    BLOB NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE INDEX idx_channels_workspace ON channels(workspace_id);

            CREATE TABLE conversations (
                id              BLOB PRIMARY KEY,
                workspace_id    BLOB NOT NULL,
                member_one_id   BLOB NOT NULL,
                member_two_id   BLOB NOT NULL,
                created_at      INTEGER NOT NULL
            );

            -- One conversation per unordered member pair per workspace
            CREATE UNIQUE INDEX idx_conversations_pair ON conversations(
                workspace_id,
                min(member_one_id, member_two_id),
                max(member_one_id, member_two_id)
            );
            CREATE INDEX idx_conversations_member_one ON conversations(member_one_id);
            CREATE INDEX idx_conversations_member_two ON conversations(member_two_id);

            CREATE TABLE messages (
                id                  BLOB PRIMARY KEY,
                body                TEXT NOT NULL,
                member_id           BLOB NOT NULL,
                workspace_id        BLOB NOT NULL,
                image               BLOB,
                channel_id          BLOB,
                conversation_id     BLOB,
                parent_message_id   BLOB,
                forwarded_from      TEXT,
                created_at          INTEGER NOT NULL,
                updated_at          INTEGER
            );

            CREATE INDEX idx_messages_workspace ON messages(workspace_id);
            CREATE INDEX idx_messages_member ON messages(member_id);
            CREATE INDEX idx_messages_parent ON messages(parent_message_id);
            CREATE INDEX idx_messages_location
                ON messages(channel_id, parent_message_id, conversation_id, created_at);

            CREATE TABLE reactions (
                id              BLOB PRIMARY KEY,
                workspace_id    BLOB NOT NULL,
                message_id      BLOB NOT NULL,
                member_id       BLOB NOT NULL,
                value           TEXT NOT NULL,
                created_at      INTEGER NOT NULL,
                UNIQUE(message_id, member_id, value)
            );

            CREATE INDEX idx_reactions_workspace ON reactions(workspace_id);
            CREATE INDEX idx_reactions_member ON reactions(member_id);

            CREATE TABLE files (
                id              BLOB PRIMARY KEY,
                uploader_id     BLOB NOT NULL,
                size            INTEGER NOT NULL,
                sha256          TEXT NOT NULL,
                content_type    TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
