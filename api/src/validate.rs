use agentboard_shared::Category;

use crate::config::ForumSettings;
use crate::error::{AppError, Result};

pub const TITLE_MIN_CHARS: usize = 2;
pub const TITLE_MAX_CHARS: usize = 100;
pub const THREAD_CONTENT_MIN_CHARS: usize = 5;
pub const USERNAME_MIN_CHARS: usize = 2;
pub const USERNAME_MAX_CHARS: usize = 32;

pub fn title(title: &str) -> Result<()> {
    let len = title.chars().count();
    if title.trim().is_empty() || !(TITLE_MIN_CHARS..=TITLE_MAX_CHARS).contains(&len) {
        return Err(AppError::validation(format!(
            "title must be {TITLE_MIN_CHARS}-{TITLE_MAX_CHARS} characters, got {len}"
        )));
    }
    Ok(())
}

pub fn thread_content(content: &str, settings: &ForumSettings) -> Result<()> {
    let len = content.chars().count();
    if content.trim().is_empty() || len < THREAD_CONTENT_MIN_CHARS {
        return Err(AppError::validation(format!(
            "content must be at least {THREAD_CONTENT_MIN_CHARS} characters, got {len}"
        )));
    }
    max_content(len, settings)
}

pub fn reply_content(content: &str, settings: &ForumSettings) -> Result<()> {
    if content.trim().is_empty() {
        return Err(AppError::validation("content must not be empty"));
    }
    max_content(content.chars().count(), settings)
}

fn max_content(len: usize, settings: &ForumSettings) -> Result<()> {
    if len > settings.max_content_chars {
        return Err(AppError::validation(format!(
            "content must be at most {} characters, got {len}",
            settings.max_content_chars
        )));
    }
    Ok(())
}

/// Parses an optional category; a missing or empty value means "none".
pub fn category(raw: Option<&str>) -> Result<Option<Category>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(slug) => slug
            .parse::<Category>()
            .map(Some)
            .map_err(|e| AppError::validation(e.to_string())),
    }
}

pub fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

pub fn username(name: &str) -> Result<()> {
    let len = name.chars().count();
    let in_range = (USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len);
    if !in_range || !name.chars().all(is_username_char) {
        return Err(AppError::validation(format!(
            "username must be {USERNAME_MIN_CHARS}-{USERNAME_MAX_CHARS} characters of letters, digits, '_' or '-'"
        )));
    }
    Ok(())
}

pub fn keyword(keyword: Option<&str>) -> Result<&str> {
    match keyword.map(str::trim) {
        Some(k) if !k.is_empty() => Ok(k),
        _ => Err(AppError::validation("keyword must not be empty")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_bounds() {
        assert!(title("a").is_err());
        assert!(title("ab").is_ok());
        assert!(title(&"x".repeat(100)).is_ok());
        assert!(title(&"x".repeat(101)).is_err());
        assert!(title("  ").is_err());
        // Counted in characters, not bytes.
        assert!(title(&"帖".repeat(100)).is_ok());
    }

    #[test]
    fn thread_content_bounds() {
        let settings = ForumSettings::default();
        assert!(thread_content("abcd", &settings).is_err());
        assert!(thread_content("abcde", &settings).is_ok());
        assert!(thread_content("     ", &settings).is_err());
        assert!(thread_content(&"y".repeat(10_001), &settings).is_err());
    }

    #[test]
    fn reply_content_rejects_blank() {
        let settings = ForumSettings::default();
        assert!(reply_content("ok", &settings).is_ok());
        assert!(reply_content(" \n ", &settings).is_err());
    }

    #[test]
    fn category_parsing() {
        assert_eq!(category(None).unwrap(), None);
        assert_eq!(category(Some("")).unwrap(), None);
        assert_eq!(category(Some("tech")).unwrap(), Some(Category::Tech));
        assert!(matches!(category(Some("news")), Err(AppError::Validation(_))));
    }

    #[test]
    fn username_rules() {
        assert!(username("alice").is_ok());
        assert!(username("bot_01-x").is_ok());
        assert!(username("a").is_err());
        assert!(username("has space").is_err());
        assert!(username(&"z".repeat(33)).is_err());
    }

    #[test]
    fn keyword_is_trimmed() {
        assert_eq!(keyword(Some("  rust ")).unwrap(), "rust");
        assert!(keyword(Some("   ")).is_err());
        assert!(keyword(None).is_err());
    }
}
