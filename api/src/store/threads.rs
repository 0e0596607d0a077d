use agentboard_shared::{Category, Paginated, Thread, User};
use rusqlite::{types::Type, Connection, OptionalExtension, Row, TransactionBehavior};

use super::{like_pattern, PageRequest};
use crate::config::{BrowseOrder, ForumSettings};
use crate::error::{AppError, Result};
use crate::validate;

const THREAD_SELECT: &str = "
    SELECT t.id, t.category, t.title, t.content, t.created_at, t.last_activity_at,
           u.id, u.username,
           (SELECT COUNT(*) FROM replies r WHERE r.thread_id = t.id AND r.parent_id IS NULL)
    FROM threads t
    JOIN users u ON t.user_id = u.id";

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<Thread> {
    let category: String = row.get(1)?;
    let category = category
        .parse::<Category>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

    Ok(Thread {
        id: row.get(0)?,
        category,
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        last_activity_at: row.get(5)?,
        user: User {
            id: row.get(6)?,
            username: row.get(7)?,
        },
        reply_count: row.get(8)?,
    })
}

pub fn create(
    conn: &mut Connection,
    settings: &ForumSettings,
    author_id: i64,
    title: &str,
    content: &str,
    category: Option<Category>,
) -> Result<Thread> {
    validate::title(title)?;
    validate::thread_content(content, settings)?;
    let category = category.unwrap_or_default();

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO threads (category, user_id, title, content) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![category.as_str(), author_id, title, content],
    )?;
    let id = tx.last_insert_rowid();
    let thread = get(&tx, id)?;
    tx.commit()?;

    Ok(thread)
}

pub fn get(conn: &Connection, id: i64) -> Result<Thread> {
    conn.query_row(&format!("{THREAD_SELECT} WHERE t.id = ?1"), [id], thread_from_row)
        .optional()?
        .ok_or(AppError::not_found("thread", id))
}

pub fn browse(
    conn: &Connection,
    category: Option<Category>,
    order: BrowseOrder,
    page: PageRequest,
) -> Result<Paginated<Thread>> {
    let category = category.map(Category::as_str);

    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM threads t WHERE (?1 IS NULL OR t.category = ?1)",
        [category],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{THREAD_SELECT}
         WHERE (?1 IS NULL OR t.category = ?1)
         ORDER BY {}
         LIMIT ?2 OFFSET ?3",
        order.order_by()
    ))?;
    let threads = stmt
        .query_map(
            rusqlite::params![category, page.per_page, page.offset()],
            thread_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(page.wrap(threads, total))
}

/// Case-insensitive substring search over title and content.
pub fn search(
    conn: &Connection,
    keyword: &str,
    category: Option<Category>,
    order: BrowseOrder,
    page: PageRequest,
) -> Result<Paginated<Thread>> {
    let category = category.map(Category::as_str);
    let pattern = like_pattern(keyword);
    let filter = r"(?1 IS NULL OR t.category = ?1)
         AND (t.title LIKE ?2 ESCAPE '\' OR t.content LIKE ?2 ESCAPE '\')";

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM threads t WHERE {filter}"),
        rusqlite::params![category, pattern],
        |row| row.get(0),
    )?;

    let mut stmt = conn.prepare(&format!(
        "{THREAD_SELECT}
         WHERE {filter}
         ORDER BY {}
         LIMIT ?3 OFFSET ?4",
        order.order_by()
    ))?;
    let threads = stmt
        .query_map(
            rusqlite::params![category, pattern, page.per_page, page.offset()],
            thread_from_row,
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(page.wrap(threads, total))
}

/// Deletes a thread with its floors and sub-replies. Only the author may
/// do this.
pub fn delete(conn: &mut Connection, caller_id: i64, thread_id: i64) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let owner: i64 = tx
        .query_row("SELECT user_id FROM threads WHERE id = ?1", [thread_id], |row| row.get(0))
        .optional()?
        .ok_or(AppError::not_found("thread", thread_id))?;

    if owner != caller_id {
        return Err(AppError::Forbidden(format!(
            "only the author may delete thread {thread_id}"
        )));
    }

    tx.execute("DELETE FROM threads WHERE id = ?1", [thread_id])?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;
    use crate::store::fixtures;

    fn page(n: i64, size: i64) -> PageRequest {
        PageRequest::new(Some(n), Some(size), 10, 50)
    }

    #[test]
    fn create_then_get_round_trips() {
        let mut conn = test_conn();
        let alice = fixtures::user(&conn, "alice");
        let settings = ForumSettings::default();

        let created =
            create(&mut conn, &settings, alice.id, "Hi", "hello <b>world</b> 100%", None).unwrap();
        let fetched = get(&conn, created.id).unwrap();
        assert_eq!(fetched.title, "Hi");
        assert_eq!(fetched.content, "hello <b>world</b> 100%");
        assert_eq!(fetched.category, Category::Chat);
        assert_eq!(fetched.user, alice);
        assert_eq!(fetched.reply_count, 0);
    }

    #[test]
    fn create_validates_before_writing() {
        let mut conn = test_conn();
        let alice = fixtures::user(&conn, "alice");
        let settings = ForumSettings::default();

        let long_title = "t".repeat(101);
        let cases = [("x", "valid body"), (long_title.as_str(), "valid body"), ("ok", "four")];
        for (title, content) in cases {
            let err = create(&mut conn, &settings, alice.id, title, content, None).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{title:?} / {content:?}");
        }
        assert!(create(&mut conn, &settings, alice.id, &"t".repeat(100), "fives", None).is_ok());

        let count: i64 = conn.query_row("SELECT COUNT(*) FROM threads", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn browse_filters_by_category_newest_first() {
        let mut conn = test_conn();
        let alice = fixtures::user(&conn, "alice");
        let a = fixtures::thread(&mut conn, &alice, "first tech", Category::Tech);
        fixtures::thread(&mut conn, &alice, "some chat", Category::Chat);
        let c = fixtures::thread(&mut conn, &alice, "second tech", Category::Tech);

        let result =
            browse(&conn, Some(Category::Tech), BrowseOrder::Created, page(1, 10)).unwrap();
        assert_eq!(result.total, 2);
        let ids: Vec<i64> = result.items.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![c.id, a.id]);

        let all = browse(&conn, None, BrowseOrder::Created, page(1, 10)).unwrap();
        assert_eq!(all.total, 3);
    }

    #[test]
    fn browse_out_of_range_page_is_empty() {
        let mut conn = test_conn();
        let alice = fixtures::user(&conn, "alice");
        for i in 0..3 {
            fixtures::thread(&mut conn, &alice, &format!("thread {i}"), Category::Misc);
        }

        let result = browse(&conn, None, BrowseOrder::Created, page(2, 2)).unwrap();
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.total_pages, 2);

        let result = browse(&conn, None, BrowseOrder::Created, page(9, 2)).unwrap();
        assert!(result.items.is_empty());
        assert_eq!(result.total, 3);
    }

    #[test]
    fn search_matches_title_or_content_literally() {
        let mut conn = test_conn();
        let alice = fixtures::user(&conn, "alice");
        let settings = ForumSettings::default();
        let mut post = |title: &str, content: &str, category: Category| {
            create(&mut conn, &settings, alice.id, title, content, Some(category)).unwrap()
        };
        let rust = post("Rust tips", "borrowck notes", Category::Tech);
        let sale = post("Big sale", "50% off RUST books", Category::Deals);
        post("Other", "500 apples", Category::Misc);

        let hits = search(&conn, "rust", None, BrowseOrder::Created, page(1, 10)).unwrap();
        let ids: Vec<i64> = hits.items.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![sale.id, rust.id]);

        let hits =
            search(&conn, "rust", Some(Category::Tech), BrowseOrder::Created, page(1, 10)).unwrap();
        assert_eq!(hits.total, 1);

        // `%` must not act as a wildcard.
        let hits = search(&conn, "0%", None, BrowseOrder::Created, page(1, 10)).unwrap();
        assert_eq!(hits.items.len(), 1);
        assert_eq!(hits.items[0].id, sale.id);
    }

    #[test]
    fn delete_is_author_scoped() {
        let mut conn = test_conn();
        let alice = fixtures::user(&conn, "alice");
        let bob = fixtures::user(&conn, "bob");
        let thread = fixtures::thread(&mut conn, &alice, "mine", Category::Chat);

        assert!(matches!(delete(&mut conn, bob.id, thread.id), Err(AppError::Forbidden(_))));
        assert_eq!(get(&conn, thread.id).unwrap().title, "mine");

        delete(&mut conn, alice.id, thread.id).unwrap();
        assert!(matches!(get(&conn, thread.id), Err(AppError::NotFound { .. })));
        assert!(matches!(delete(&mut conn, alice.id, thread.id), Err(AppError::NotFound { .. })));
    }
}
