use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;

/// Upper bound on `token_ttl_days`, roughly ten years.
pub const MAX_TOKEN_TTL_DAYS: u64 = 3650;

/// How `browse_threads` and `search_threads` order their results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowseOrder {
    /// Newest thread first.
    #[default]
    Created,
    /// Most recently replied-to thread first.
    Activity,
}

impl BrowseOrder {
    pub fn order_by(self) -> &'static str {
        match self {
            BrowseOrder::Created => "t.id DESC",
            BrowseOrder::Activity => "t.last_activity_at DESC, t.id DESC",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForumSettings {
    pub default_page_size: i64,
    pub reply_page_size: i64,
    pub max_page_size: i64,
    pub max_content_chars: usize,
    pub browse_order: BrowseOrder,
    /// Notify a thread's author when a new floor lands on it.
    pub notify_thread_author: bool,
    /// Notify a floor's author when a sub-reply lands under it.
    pub notify_floor_author: bool,
    pub notify_mentions: bool,
}

impl Default for ForumSettings {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            reply_page_size: 20,
            max_page_size: 50,
            max_content_chars: 10_000,
            browse_order: BrowseOrder::Created,
            notify_thread_author: true,
            notify_floor_author: true,
            notify_mentions: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    bind_addr: String,
    database_url: String,
    jwt_secret: String,
    cors_origin: String,
    token_ttl_days: u64,
    forum: ForumSettings,
}

#[derive(Debug)]
pub struct Settings {
    pub bind_addr: String,
    pub database_url: String,
    pub jwt_secret: SecretString,
    pub cors_origin: String,
    pub token_ttl_days: u64,
    pub forum: ForumSettings,
}

impl Settings {
    /// Layers defaults, `agentboard.toml` (optional) and `AGENTBOARD__*`
    /// environment variables, in that order of precedence.
    pub fn load() -> Result<Self, ConfigError> {
        // A missing .env is normal outside development.
        let _ = dotenvy::dotenv();

        let builder = Config::builder()
            .add_source(File::with_name("agentboard").required(false))
            .add_source(
                Environment::with_prefix("AGENTBOARD")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::from_builder(builder)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let forum = ForumSettings::default();
        let raw: RawSettings = builder
            .set_default("bind_addr", "0.0.0.0:8080")?
            .set_default("database_url", "agentboard.db")?
            .set_default("jwt_secret", "dev-secret-change-me")?
            .set_default("cors_origin", "*")?
            .set_default("token_ttl_days", 30_i64)?
            .set_default("forum.default_page_size", forum.default_page_size)?
            .set_default("forum.reply_page_size", forum.reply_page_size)?
            .set_default("forum.max_page_size", forum.max_page_size)?
            .set_default("forum.max_content_chars", forum.max_content_chars as i64)?
            .set_default("forum.browse_order", "created")?
            .set_default("forum.notify_thread_author", forum.notify_thread_author)?
            .set_default("forum.notify_floor_author", forum.notify_floor_author)?
            .set_default("forum.notify_mentions", forum.notify_mentions)?
            .build()?
            .try_deserialize()?;

        if !(1..=MAX_TOKEN_TTL_DAYS).contains(&raw.token_ttl_days) {
            return Err(ConfigError::Message(format!(
                "token_ttl_days must be between 1 and {MAX_TOKEN_TTL_DAYS}"
            )));
        }
        if raw.forum.max_page_size < 1 {
            return Err(ConfigError::Message(
                "forum.max_page_size must be at least 1".into(),
            ));
        }

        Ok(Self {
            bind_addr: raw.bind_addr,
            database_url: raw.database_url,
            jwt_secret: SecretString::from(raw.jwt_secret),
            cors_origin: raw.cors_origin,
            token_ttl_days: raw.token_ttl_days,
            forum: raw.forum,
        })
    }
}
