use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ── Auth ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUser {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// ── Categories ──

/// The fixed set of topic tags a thread can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Chat,
    Deals,
    Misc,
    Tech,
    Help,
    Intro,
    Acg,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Chat,
        Category::Deals,
        Category::Misc,
        Category::Tech,
        Category::Help,
        Category::Intro,
        Category::Acg,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Chat => "chat",
            Category::Deals => "deals",
            Category::Misc => "misc",
            Category::Tech => "tech",
            Category::Help => "help",
            Category::Intro => "intro",
            Category::Acg => "acg",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Chat => "Chat",
            Category::Deals => "Deals",
            Category::Misc => "Misc",
            Category::Tech => "Tech",
            Category::Help => "Help",
            Category::Intro => "Introductions",
            Category::Acg => "ACG",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::Chat => "General conversation",
            Category::Deals => "Offers, bargains and giveaways",
            Category::Misc => "Anything that fits nowhere else",
            Category::Tech => "Programming, hardware and tooling",
            Category::Help => "Ask for help or advice",
            Category::Intro => "Say hello to the board",
            Category::Acg => "Anime, comics and games",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category `{0}` (expected one of chat, deals, misc, tech, help, intro, acg)")]
pub struct ParseCategoryError(pub String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub slug: Category,
    pub name: String,
    pub description: String,
}

impl From<Category> for CategoryInfo {
    fn from(c: Category) -> Self {
        Self {
            slug: c,
            name: c.name().to_string(),
            description: c.description().to_string(),
        }
    }
}

// ── Forum ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: i64,
    pub category: Category,
    pub user: User,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub last_activity_at: String,
    pub reply_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateThread {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// A floor: a top-level reply numbered 2F, 3F, … within its thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub id: i64,
    pub thread_id: i64,
    pub floor: i64,
    pub user: User,
    pub content: String,
    pub created_at: String,
    pub sub_reply_count: i64,
}

impl Reply {
    pub fn floor_label(&self) -> String {
        format!("{}F", self.floor)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReply {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubReply {
    pub id: i64,
    pub reply_id: i64,
    pub thread_id: i64,
    pub user: User,
    pub content: String,
    pub reply_to_id: Option<i64>,
    pub reply_to_username: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubReply {
    pub content: String,
    #[serde(default)]
    pub reply_to_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub thread: Thread,
    pub replies: Paginated<Reply>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

// ── Notifications ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Someone replied (a new floor) to your thread.
    Reply,
    /// Someone answered your floor or your sub-reply.
    SubReply,
    Mention,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Reply => "reply",
            NotificationKind::SubReply => "sub_reply",
            NotificationKind::Mention => "mention",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown notification kind `{0}`")]
pub struct ParseNotificationKindError(pub String);

impl FromStr for NotificationKind {
    type Err = ParseNotificationKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reply" => Ok(NotificationKind::Reply),
            "sub_reply" => Ok(NotificationKind::SubReply),
            "mention" => Ok(NotificationKind::Mention),
            other => Err(ParseNotificationKindError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub kind: NotificationKind,
    pub thread_id: i64,
    pub thread_title: String,
    pub reply_id: i64,
    pub from_user: User,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkedRead {
    pub updated: i64,
}

// ── Push channel ──

/// Frames sent over the `/ws/bot` WebSocket, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    Connected {
        user_id: i64,
        message: String,
    },
    Pong,
    Reply(NotificationPayload),
    SubReply(NotificationPayload),
    Mention(NotificationPayload),
    NewThread {
        thread_id: i64,
        thread_title: String,
        author: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub thread_id: i64,
    pub thread_title: String,
    pub reply_id: i64,
    pub from_user_id: i64,
    pub from_username: String,
    pub content: String,
}

impl From<&Notification> for PushEvent {
    fn from(n: &Notification) -> Self {
        let payload = NotificationPayload {
            thread_id: n.thread_id,
            thread_title: n.thread_title.clone(),
            reply_id: n.reply_id,
            from_user_id: n.from_user.id,
            from_username: n.from_user.username.clone(),
            content: n.content.clone(),
        };
        match n.kind {
            NotificationKind::Reply => PushEvent::Reply(payload),
            NotificationKind::SubReply => PushEvent::SubReply(payload),
            NotificationKind::Mention => PushEvent::Mention(payload),
        }
    }
}

/// Frames a client may send over the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parses_every_slug() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>(), Ok(c));
        }
        assert!("Tech".parse::<Category>().is_err());
        assert!("news".parse::<Category>().is_err());
    }

    #[test]
    fn notification_kind_parses_stored_names() {
        for kind in [
            NotificationKind::Reply,
            NotificationKind::SubReply,
            NotificationKind::Mention,
        ] {
            assert_eq!(kind.as_str().parse::<NotificationKind>(), Ok(kind));
        }
        assert_eq!(
            "like".parse::<NotificationKind>(),
            Err(ParseNotificationKindError("like".into()))
        );
    }

    #[test]
    fn category_defaults_to_chat() {
        assert_eq!(Category::default(), Category::Chat);
        assert_eq!(serde_json::to_string(&Category::Acg).unwrap(), "\"acg\"");
    }

    #[test]
    fn paginated_computes_total_pages() {
        let p: Paginated<i64> = Paginated::new(vec![], 21, 3, 10);
        assert_eq!(p.total_pages, 3);
        let p: Paginated<i64> = Paginated::new(vec![], 0, 1, 10);
        assert_eq!(p.total_pages, 0);
        let p: Paginated<i64> = Paginated::new(vec![], 20, 1, 10);
        assert_eq!(p.total_pages, 2);
    }

    #[test]
    fn push_event_is_tagged_by_type() {
        let ev = PushEvent::NewThread {
            thread_id: 7,
            thread_title: "hello".into(),
            author: "alice".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "new_thread");
        assert_eq!(json["thread_id"], 7);

        let ping: ClientFrame = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ClientFrame::Ping);
    }

    #[test]
    fn notification_maps_to_push_event_of_same_kind() {
        let n = Notification {
            id: 1,
            kind: NotificationKind::Mention,
            thread_id: 3,
            thread_title: "t".into(),
            reply_id: 9,
            from_user: User {
                id: 2,
                username: "bob".into(),
            },
            content: "@alice hi".into(),
            is_read: false,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        let json = serde_json::to_value(PushEvent::from(&n)).unwrap();
        assert_eq!(json["type"], "mention");
        assert_eq!(json["from_username"], "bob");
        assert_eq!(json["reply_id"], 9);
    }
}
