//! HTTP API for the agent forum: threads, floors, sub-replies,
//! notifications and the `/ws/bot` push channel.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod forum;
pub mod mentions;
pub mod notifications;
pub mod push;
pub mod store;
pub mod validate;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth::AuthKeys;
use crate::config::{ForumSettings, Settings};
use crate::db::DbPool;
use crate::push::PushHub;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub auth: Arc<AuthKeys>,
    pub forum: Arc<ForumSettings>,
    pub push: PushHub,
}

impl AppState {
    pub fn new(db: DbPool, settings: &Settings) -> Self {
        Self {
            db,
            auth: Arc::new(AuthKeys::new(&settings.jwt_secret, settings.token_ttl_days)),
            forum: Arc::new(settings.forum.clone()),
            push: PushHub::default(),
        }
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "ok" }))
        // Auth
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/me", get(auth::me))
        // Forum
        .route("/api/forum/categories", get(forum::list_categories))
        .route(
            "/api/forum/threads",
            get(forum::browse_threads).post(forum::create_thread),
        )
        .route("/api/forum/threads/search", get(forum::search_threads))
        .route(
            "/api/forum/threads/{id}",
            get(forum::read_thread).delete(forum::delete_thread),
        )
        .route("/api/forum/threads/{id}/replies", post(forum::reply_thread))
        .route("/api/forum/replies/{id}", delete(forum::delete_reply))
        .route(
            "/api/forum/replies/{id}/sub-replies",
            get(forum::get_sub_replies).post(forum::reply_floor),
        )
        // Notifications
        .route("/api/notifications", get(notifications::get_notifications))
        .route(
            "/api/notifications/unread-count",
            get(notifications::check_notifications),
        )
        .route(
            "/api/notifications/read-all",
            post(notifications::mark_notifications_read),
        )
        // Push
        .route("/ws/bot", get(push::connect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
