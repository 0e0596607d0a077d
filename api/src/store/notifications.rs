use agentboard_shared::{Notification, NotificationKind, Paginated, User};
use rusqlite::{types::Type, Connection, Row};

use super::PageRequest;
use crate::error::Result;

/// Longest content excerpt stored on a notification, in characters.
pub const EXCERPT_CHARS: usize = 200;

const NOTIFICATION_SELECT: &str = "
    SELECT n.id, n.kind, n.thread_id, n.thread_title, n.reply_id, n.content,
           n.is_read, n.created_at, u.id, u.username
    FROM notifications n
    JOIN users u ON n.from_user_id = u.id";

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(1)?;
    let kind = kind.parse::<NotificationKind>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, e.into())
    })?;

    Ok(Notification {
        id: row.get(0)?,
        kind,
        thread_id: row.get(2)?,
        thread_title: row.get(3)?,
        reply_id: row.get(4)?,
        content: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
        from_user: User {
            id: row.get(8)?,
            username: row.get(9)?,
        },
    })
}

/// The reply or sub-reply a batch of notifications is about.
#[derive(Debug, Clone)]
pub struct Trigger<'a> {
    pub thread_id: i64,
    pub thread_title: &'a str,
    pub reply_id: i64,
    pub from: &'a User,
    pub content: &'a str,
}

/// Who gets notified for one trigger. The actor is never a recipient and
/// each user appears once; the first kind added for a user wins.
#[derive(Debug)]
pub struct Recipients {
    actor: i64,
    entries: Vec<(i64, NotificationKind)>,
}

impl Recipients {
    pub fn new(actor: i64) -> Self {
        Self {
            actor,
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, user_id: i64, kind: NotificationKind) {
        if user_id != self.actor && !self.entries.iter().any(|(id, _)| *id == user_id) {
            self.entries.push((user_id, kind));
        }
    }
}

/// A stored notification together with the user it was addressed to.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub recipient: i64,
    pub notification: Notification,
}

pub fn insert_all(
    conn: &Connection,
    trigger: &Trigger<'_>,
    recipients: Recipients,
) -> Result<Vec<Delivery>> {
    let excerpt: String = trigger.content.chars().take(EXCERPT_CHARS).collect();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO notifications
             (user_id, kind, thread_id, thread_title, reply_id, from_user_id, content)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;

    let mut out = Vec::with_capacity(recipients.entries.len());
    for (recipient, kind) in recipients.entries {
        stmt.execute(rusqlite::params![
            recipient,
            kind.as_str(),
            trigger.thread_id,
            trigger.thread_title,
            trigger.reply_id,
            trigger.from.id,
            excerpt,
        ])?;
        let id = conn.last_insert_rowid();
        let notification = conn.query_row(
            &format!("{NOTIFICATION_SELECT} WHERE n.id = ?1"),
            [id],
            notification_from_row,
        )?;
        out.push(Delivery {
            recipient,
            notification,
        });
    }
    Ok(out)
}

pub fn unread_count(conn: &Connection, user_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Newest first.
pub fn list(
    conn: &Connection,
    user_id: i64,
    unread_only: bool,
    page: PageRequest,
) -> Result<Paginated<Notification>> {
    let filter = "n.user_id = ?1 AND (?2 = 0 OR n.is_read = 0)";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM notifications n WHERE {filter}"),
        rusqlite::params![user_id, unread_only],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{NOTIFICATION_SELECT}
         WHERE {filter}
         ORDER BY n.id DESC
         LIMIT ?3 OFFSET ?4"
    ))?;
    let items = stmt
        .query_map(
            rusqlite::params![user_id, unread_only, page.per_page, page.offset()],
            notification_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(page.wrap(items, total))
}

/// Marks every unread notification of `user_id` as read and returns how
/// many changed. Calling it again changes nothing.
pub fn mark_all_read(conn: &Connection, user_id: i64) -> Result<i64> {
    let updated = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        [user_id],
    )?;
    Ok(updated as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;
    use crate::store::fixtures;

    #[test]
    fn recipients_skip_actor_and_duplicates() {
        let mut r = Recipients::new(1);
        r.add(1, NotificationKind::Reply);
        r.add(2, NotificationKind::SubReply);
        r.add(2, NotificationKind::Mention);
        r.add(3, NotificationKind::Mention);
        assert_eq!(
            r.entries,
            vec![(2, NotificationKind::SubReply), (3, NotificationKind::Mention)]
        );
    }

    #[test]
    fn insert_list_and_mark_read() {
        let conn = test_conn();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");

        let long = "x".repeat(EXCERPT_CHARS + 50);
        let trigger = Trigger {
            thread_id: 1,
            thread_title: "hello",
            reply_id: 10,
            from: &bob,
            content: &long,
        };
        let mut recipients = Recipients::new(bob.id);
        recipients.add(alice.id, NotificationKind::Mention);
        let delivered = insert_all(&conn, &trigger, recipients).unwrap();

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].recipient, alice.id);
        let n = &delivered[0].notification;
        assert_eq!(n.kind, NotificationKind::Mention);
        assert_eq!(n.from_user, bob);
        assert_eq!(n.content.chars().count(), EXCERPT_CHARS);
        assert!(!n.is_read);

        let page = PageRequest::new(None, None, 20, 50);
        assert_eq!(unread_count(&conn, alice.id).unwrap(), 1);
        assert_eq!(unread_count(&conn, bob.id).unwrap(), 0);
        assert_eq!(list(&conn, alice.id, true, page).unwrap().total, 1);

        assert_eq!(mark_all_read(&conn, alice.id).unwrap(), 1);
        assert_eq!(mark_all_read(&conn, alice.id).unwrap(), 0);
        assert_eq!(unread_count(&conn, alice.id).unwrap(), 0);
        assert!(list(&conn, alice.id, true, page).unwrap().items.is_empty());

        let all = list(&conn, alice.id, false, page).unwrap();
        assert_eq!(all.total, 1);
        assert!(all.items[0].is_read);
    }
}
