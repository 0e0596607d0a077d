use agentboard_shared::{NotificationKind, Paginated, Reply, SubReply, User};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};

use super::notifications::{self, Delivery, Recipients, Trigger};
use super::{users, PageRequest};
use crate::config::ForumSettings;
use crate::db::NOW;
use crate::error::{AppError, Result};
use crate::{mentions, validate};

const FLOOR_SELECT: &str = "
    SELECT r.id, r.thread_id, r.floor, r.content, r.created_at,
           u.id, u.username,
           (SELECT COUNT(*) FROM replies s WHERE s.parent_id = r.id)
    FROM replies r
    JOIN users u ON r.user_id = u.id";

const SUB_REPLY_SELECT: &str = "
    SELECT s.id, s.parent_id, s.thread_id, s.content, s.reply_to_id, s.created_at,
           u.id, u.username, tu.username
    FROM replies s
    JOIN users u ON s.user_id = u.id
    LEFT JOIN replies target ON s.reply_to_id = target.id
    LEFT JOIN users tu ON target.user_id = tu.id";

fn floor_from_row(row: &Row<'_>) -> rusqlite::Result<Reply> {
    Ok(Reply {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        floor: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        user: User {
            id: row.get(5)?,
            username: row.get(6)?,
        },
        sub_reply_count: row.get(7)?,
    })
}

fn sub_reply_from_row(row: &Row<'_>) -> rusqlite::Result<SubReply> {
    Ok(SubReply {
        id: row.get(0)?,
        reply_id: row.get(1)?,
        thread_id: row.get(2)?,
        content: row.get(3)?,
        reply_to_id: row.get(4)?,
        created_at: row.get(5)?,
        user: User {
            id: row.get(6)?,
            username: row.get(7)?,
        },
        reply_to_username: row.get(8)?,
    })
}

/// Where a reply id sits in the tree.
struct Placement {
    thread_id: i64,
    parent_id: Option<i64>,
    author_id: i64,
}

fn placement(conn: &Connection, id: i64) -> Result<Option<Placement>> {
    let found = conn
        .query_row(
            "SELECT thread_id, parent_id, user_id FROM replies WHERE id = ?1",
            [id],
            |row| {
                Ok(Placement {
                    thread_id: row.get(0)?,
                    parent_id: row.get(1)?,
                    author_id: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(found)
}

/// Looks up `reply_id` and insists it is a floor rather than a sub-reply.
fn require_floor(conn: &Connection, reply_id: i64) -> Result<Placement> {
    let floor = placement(conn, reply_id)?.ok_or(AppError::not_found("reply", reply_id))?;
    if let Some(parent) = floor.parent_id {
        return Err(AppError::validation(format!(
            "reply {reply_id} is a sub-reply of floor {parent}; sub-replies do not nest, \
             address it with reply_to_id on floor {parent} instead"
        )));
    }
    Ok(floor)
}

fn mention_recipients(
    conn: &Connection,
    settings: &ForumSettings,
    content: &str,
    recipients: &mut Recipients,
) -> Result<()> {
    if !settings.notify_mentions {
        return Ok(());
    }
    let names = mentions::extract(content);
    if names.is_empty() {
        return Ok(());
    }
    for id in users::find_ids(conn, &names)? {
        recipients.add(id, NotificationKind::Mention);
    }
    Ok(())
}

fn touch_thread(conn: &Connection, thread_id: i64) -> Result<()> {
    conn.execute(
        &format!("UPDATE threads SET last_activity_at = {NOW} WHERE id = ?1"),
        [thread_id],
    )?;
    Ok(())
}

/// Adds the next floor to a thread.
///
/// The floor number comes from the thread's own counter, read and bumped
/// inside an IMMEDIATE transaction: concurrent replies queue on the write
/// lock, so numbers are gap-free and never reused after a deletion.
pub fn create_floor(
    conn: &mut Connection,
    settings: &ForumSettings,
    author: &User,
    thread_id: i64,
    content: &str,
) -> Result<(Reply, Vec<Delivery>)> {
    validate::reply_content(content, settings)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let (title, thread_author, floor): (String, i64, i64) = tx
        .query_row(
            "SELECT title, user_id, next_floor FROM threads WHERE id = ?1",
            [thread_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?
        .ok_or(AppError::not_found("thread", thread_id))?;

    tx.execute(
        "INSERT INTO replies (thread_id, floor, user_id, content) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![thread_id, floor, author.id, content],
    )?;
    let id = tx.last_insert_rowid();
    tx.execute(
        "UPDATE threads SET next_floor = next_floor + 1 WHERE id = ?1",
        [thread_id],
    )?;
    touch_thread(&tx, thread_id)?;

    let mut recipients = Recipients::new(author.id);
    if settings.notify_thread_author {
        recipients.add(thread_author, NotificationKind::Reply);
    }
    mention_recipients(&tx, settings, content, &mut recipients)?;

    let trigger = Trigger {
        thread_id,
        thread_title: &title,
        reply_id: id,
        from: author,
        content,
    };
    let deliveries = notifications::insert_all(&tx, &trigger, recipients)?;

    let reply = get_floor(&tx, id)?;
    tx.commit()?;
    Ok((reply, deliveries))
}

/// Adds a sub-reply under floor `reply_id`, optionally addressed to a
/// sibling sub-reply.
pub fn create_sub_reply(
    conn: &mut Connection,
    settings: &ForumSettings,
    author: &User,
    reply_id: i64,
    content: &str,
    reply_to_id: Option<i64>,
) -> Result<(SubReply, Vec<Delivery>)> {
    validate::reply_content(content, settings)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let floor = require_floor(&tx, reply_id)?;

    let target_author = match reply_to_id {
        None => None,
        Some(target_id) => {
            let target =
                placement(&tx, target_id)?.ok_or(AppError::not_found("sub-reply", target_id))?;
            if target.parent_id != Some(reply_id) {
                return Err(AppError::validation(format!(
                    "reply_to_id {target_id} is not a sub-reply of floor {reply_id}"
                )));
            }
            Some(target.author_id)
        }
    };

    let title: String = tx.query_row(
        "SELECT title FROM threads WHERE id = ?1",
        [floor.thread_id],
        |row| row.get(0),
    )?;

    tx.execute(
        "INSERT INTO replies (thread_id, parent_id, reply_to_id, user_id, content)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![floor.thread_id, reply_id, reply_to_id, author.id, content],
    )?;
    let id = tx.last_insert_rowid();
    touch_thread(&tx, floor.thread_id)?;

    let mut recipients = Recipients::new(author.id);
    if let Some(target_author) = target_author {
        recipients.add(target_author, NotificationKind::SubReply);
    }
    if settings.notify_floor_author {
        recipients.add(floor.author_id, NotificationKind::SubReply);
    }
    mention_recipients(&tx, settings, content, &mut recipients)?;

    let trigger = Trigger {
        thread_id: floor.thread_id,
        thread_title: &title,
        reply_id: id,
        from: author,
        content,
    };
    let deliveries = notifications::insert_all(&tx, &trigger, recipients)?;

    let sub_reply = get_sub_reply(&tx, id)?;
    tx.commit()?;
    Ok((sub_reply, deliveries))
}

pub fn get_floor(conn: &Connection, id: i64) -> Result<Reply> {
    conn.query_row(
        &format!("{FLOOR_SELECT} WHERE r.id = ?1 AND r.parent_id IS NULL"),
        [id],
        floor_from_row,
    )
    .optional()?
    .ok_or(AppError::not_found("reply", id))
}

pub fn get_sub_reply(conn: &Connection, id: i64) -> Result<SubReply> {
    conn.query_row(
        &format!("{SUB_REPLY_SELECT} WHERE s.id = ?1 AND s.parent_id IS NOT NULL"),
        [id],
        sub_reply_from_row,
    )
    .optional()?
    .ok_or(AppError::not_found("sub-reply", id))
}

/// Floors of a thread in floor order. The caller checks the thread exists.
pub fn list_floors(
    conn: &Connection,
    thread_id: i64,
    page: PageRequest,
) -> Result<Paginated<Reply>> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM replies WHERE thread_id = ?1 AND parent_id IS NULL",
        [thread_id],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{FLOOR_SELECT}
         WHERE r.thread_id = ?1 AND r.parent_id IS NULL
         ORDER BY r.floor ASC
         LIMIT ?2 OFFSET ?3"
    ))?;
    let items = stmt
        .query_map(
            rusqlite::params![thread_id, page.per_page, page.offset()],
            floor_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(page.wrap(items, total))
}

/// Sub-replies under a floor in creation order.
pub fn list_sub_replies(
    conn: &Connection,
    reply_id: i64,
    page: PageRequest,
) -> Result<Paginated<SubReply>> {
    require_floor(conn, reply_id)?;

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM replies WHERE parent_id = ?1",
        [reply_id],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{SUB_REPLY_SELECT}
         WHERE s.parent_id = ?1
         ORDER BY s.id ASC
         LIMIT ?2 OFFSET ?3"
    ))?;
    let items = stmt
        .query_map(
            rusqlite::params![reply_id, page.per_page, page.offset()],
            sub_reply_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(page.wrap(items, total))
}

/// Deletes a floor (with its sub-replies) or a single sub-reply. Only the
/// author may do this.
pub fn delete(conn: &mut Connection, caller_id: i64, reply_id: i64) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let target = placement(&tx, reply_id)?.ok_or(AppError::not_found("reply", reply_id))?;
    if target.author_id != caller_id {
        return Err(AppError::Forbidden(format!(
            "only the author may delete reply {reply_id}"
        )));
    }

    tx.execute("DELETE FROM replies WHERE id = ?1", [reply_id])?;
    tx.commit()?;
    Ok(())
}
