use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::{AppError, Result};

pub type DbPool = r2d2::Pool<SqliteConnectionManager>;

/// SQL expression for "now" with millisecond precision, so ordering by
/// timestamp survives several writes within the same second.
pub const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

/// Opens a pool for `database_url`. `:memory:` gets a single shared
/// connection, since every in-memory connection is its own database.
pub fn open_pool(database_url: &str) -> Result<DbPool> {
    let pool = if database_url == ":memory:" {
        let manager = SqliteConnectionManager::memory().with_init(init_connection);
        r2d2::Pool::builder().max_size(1).build(manager)?
    } else {
        let manager = SqliteConnectionManager::file(database_url).with_init(init_connection);
        r2d2::Pool::new(manager)?
    };
    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<()> {
    let conn = pool.get()?;
    migrate(&conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
            created_at  TEXT NOT NULL DEFAULT ({NOW})
        );

        CREATE TABLE IF NOT EXISTS threads (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            category         TEXT NOT NULL,
            user_id          INTEGER NOT NULL REFERENCES users(id),
            title            TEXT NOT NULL,
            content          TEXT NOT NULL,
            next_floor       INTEGER NOT NULL DEFAULT 2,
            created_at       TEXT NOT NULL DEFAULT ({NOW}),
            last_activity_at TEXT NOT NULL DEFAULT ({NOW})
        );
        CREATE INDEX IF NOT EXISTS idx_threads_cat ON threads(category);
        CREATE INDEX IF NOT EXISTS idx_threads_activity ON threads(last_activity_at);

        -- Floors have a floor number and no parent; sub-replies have a
        -- parent floor and no floor number.
        CREATE TABLE IF NOT EXISTS replies (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id   INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
            parent_id   INTEGER REFERENCES replies(id) ON DELETE CASCADE,
            reply_to_id INTEGER REFERENCES replies(id) ON DELETE SET NULL,
            floor       INTEGER,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT ({NOW}),
            UNIQUE(thread_id, floor)
        );
        CREATE INDEX IF NOT EXISTS idx_replies_thread ON replies(thread_id, floor);
        CREATE INDEX IF NOT EXISTS idx_replies_parent ON replies(parent_id);

        -- No foreign keys on thread/reply: notifications outlive the
        -- content that triggered them.
        CREATE TABLE IF NOT EXISTS notifications (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id      INTEGER NOT NULL REFERENCES users(id),
            kind         TEXT NOT NULL,
            thread_id    INTEGER NOT NULL,
            thread_title TEXT NOT NULL,
            reply_id     INTEGER NOT NULL,
            from_user_id INTEGER NOT NULL REFERENCES users(id),
            content      TEXT NOT NULL,
            is_read      INTEGER NOT NULL DEFAULT 0,
            created_at   TEXT NOT NULL DEFAULT ({NOW})
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read);
        "
    ))?;

    Ok(())
}

/// Runs `f` against a pooled connection on the blocking thread pool.
pub async fn run<T, F>(pool: &DbPool, f: F) -> Result<T>
where
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await
    .map_err(AppError::from)?
}

#[cfg(test)]
pub(crate) fn test_conn() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    init_connection(&mut conn).unwrap();
    migrate(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = test_conn();
        migrate(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('users', 'threads', 'replies', 'notifications')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = test_conn();
        let err = conn.execute(
            "INSERT INTO threads (category, user_id, title, content) VALUES ('chat', 999, 'hi', 'hello')",
            [],
        );
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn memory_pool_shares_one_database() {
        let pool = open_pool(":memory:").unwrap();
        run_migrations(&pool).unwrap();
        run(&pool, |conn| {
            conn.execute("INSERT INTO users (username) VALUES ('alice')", [])?;
            Ok(())
        })
        .await
        .unwrap();
        let count: i64 = run(&pool, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?)
        })
        .await
        .unwrap();
        assert_eq!(count, 1);
    }
}
