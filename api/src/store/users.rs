use agentboard_shared::User;
use rusqlite::{Connection, ErrorCode, OptionalExtension};

use crate::error::{AppError, Result};
use crate::validate;

pub fn create(conn: &Connection, username: &str) -> Result<User> {
    validate::username(username)?;

    match conn.execute("INSERT INTO users (username) VALUES (?1)", [username]) {
        Ok(_) => Ok(User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
        }),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            Err(AppError::Conflict(format!("username `{username}` is already taken")))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row("SELECT id, username FROM users WHERE id = ?1", [id], |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })
        .optional()?;
    Ok(user)
}

/// Resolves the caller of an authenticated request. A token whose user no
/// longer exists is treated as invalid.
pub fn require(conn: &Connection, id: i64) -> Result<User> {
    get(conn, id)?.ok_or(AppError::Unauthorized("token refers to an unknown user"))
}

/// Looks up ids for the given usernames (case-insensitive); unknown names
/// are skipped.
pub fn find_ids(conn: &Connection, usernames: &[String]) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare_cached("SELECT id FROM users WHERE username = ?1")?;
    let mut ids = Vec::with_capacity(usernames.len());
    for name in usernames {
        if let Some(id) = stmt.query_row([name], |row| row.get(0)).optional()? {
            ids.push(id);
        }
    }
    Ok(ids)
}
