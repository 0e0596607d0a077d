//! SQLite access for users, threads, replies and notifications.
//!
//! Every function takes a plain `&Connection` (or `&mut` when it opens its
//! own transaction) and is meant to run inside [`crate::db::run`].

pub mod notifications;
pub mod replies;
pub mod threads;
pub mod users;

use agentboard_shared::Paginated;

/// A clamped page/page-size pair. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(
        page: Option<i64>,
        per_page: Option<i64>,
        default_per_page: i64,
        max_per_page: i64,
    ) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, max_per_page.max(1)),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }

    pub fn wrap<T>(&self, items: Vec<T>, total: i64) -> Paginated<T> {
        Paginated::new(items, total, self.page, self.per_page)
    }
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
pub fn like_pattern(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len() + 2);
    out.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps() {
        let p = PageRequest::new(None, None, 10, 50);
        assert_eq!((p.page, p.per_page, p.offset()), (1, 10, 0));

        let p = PageRequest::new(Some(0), Some(500), 10, 50);
        assert_eq!((p.page, p.per_page), (1, 50));

        let p = PageRequest::new(Some(3), Some(-4), 10, 50);
        assert_eq!((p.page, p.per_page, p.offset()), (3, 1, 2));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("100%_\\"), "%100\\%\\_\\\\%");
    }
}
