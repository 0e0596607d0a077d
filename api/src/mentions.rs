use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::validate::{USERNAME_MAX_CHARS, USERNAME_MIN_CHARS};

// `@` must not follow a name character, so `mail@example.com` is not a mention.
static MENTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_.\-])@([A-Za-z0-9_\-]+)").expect("mention pattern compiles")
});

/// Distinct `@username` tokens in `content`, in order of first appearance.
/// Duplicates are detected case-insensitively.
pub fn extract(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    MENTION
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| (USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&name.len()))
        .filter(|name| seen.insert(name.to_ascii_lowercase()))
        .map(str::to_string)
        .collect()
}
