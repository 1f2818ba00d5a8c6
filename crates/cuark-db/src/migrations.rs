use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Timestamps are RFC 3339 UTC with millisecond precision so that text
/// ordering matches chronological ordering.
pub const NOW_SQL: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id            TEXT PRIMARY KEY,
                username      TEXT NOT NULL UNIQUE,
                password      TEXT NOT NULL,
                email         TEXT NOT NULL UNIQUE,
                name          TEXT NOT NULL,
                bio           TEXT,
                avatar        TEXT,
                banner_image  TEXT,
                location      TEXT,
                website       TEXT,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE cuarks (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                content      TEXT NOT NULL,
                author_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                image_url    TEXT,
                reply_to_id  INTEGER REFERENCES cuarks(id) ON DELETE SET NULL,
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_cuarks_created ON cuarks(created_at);
            CREATE INDEX idx_cuarks_author ON cuarks(author_id, created_at);
            CREATE INDEX idx_cuarks_reply_to ON cuarks(reply_to_id);

            CREATE TABLE likes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                cuark_id    INTEGER NOT NULL REFERENCES cuarks(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, cuark_id)
            );

            CREATE INDEX idx_likes_cuark ON likes(cuark_id);

            CREATE TABLE reposts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                cuark_id    INTEGER NOT NULL REFERENCES cuarks(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(user_id, cuark_id)
            );

            CREATE INDEX idx_reposts_cuark ON reposts(cuark_id);

            CREATE TABLE follows (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                follower_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                following_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(follower_id, following_id),
                CHECK(follower_id <> following_id)
            );

            CREATE INDEX idx_follows_following ON follows(following_id);

            CREATE TABLE notifications (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                type        TEXT NOT NULL CHECK(type IN ('like', 'repost', 'follow')),
                actor_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                cuark_id    INTEGER REFERENCES cuarks(id) ON DELETE CASCADE,
                read        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            CREATE TABLE sessions (
                token_hash  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                expires_at  TEXT NOT NULL
            );

            CREATE INDEX idx_sessions_user ON sessions(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
