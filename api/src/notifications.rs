use agentboard_shared::{MarkedRead, Notification, Paginated, UnreadCount};
use axum::{extract::State, http::HeaderMap, Json};
use serde::Deserialize;

use crate::error::Result;
use crate::extract::Params;
use crate::store::{notifications, PageRequest};
use crate::{auth, db, AppState};

const NOTIFICATION_PAGE_SIZE: i64 = 20;

#[derive(Deserialize)]
pub struct ListParams {
    unread_only: Option<bool>,
    page: Option<i64>,
    page_size: Option<i64>,
}

/// GET /api/notifications/unread-count
pub async fn check_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UnreadCount>> {
    let user_id = auth::current_user(&state, &headers).await?.id;

    let unread = db::run(&state.db, move |conn| notifications::unread_count(conn, user_id)).await?;
    Ok(Json(UnreadCount { unread }))
}

/// GET /api/notifications?unread_only=true&page=1
pub async fn get_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Params(params): Params<ListParams>,
) -> Result<Json<Paginated<Notification>>> {
    let user_id = auth::current_user(&state, &headers).await?.id;
    let unread_only = params.unread_only.unwrap_or(true);
    let page = PageRequest::new(
        params.page,
        params.page_size,
        NOTIFICATION_PAGE_SIZE,
        state.forum.max_page_size,
    );

    let result = db::run(&state.db, move |conn| {
        notifications::list(conn, user_id, unread_only, page)
    })
    .await?;
    Ok(Json(result))
}

/// POST /api/notifications/read-all: idempotent
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MarkedRead>> {
    let user_id = auth::current_user(&state, &headers).await?.id;

    let updated = db::run(&state.db, move |conn| {
        notifications::mark_all_read(conn, user_id)
    })
    .await?;

    tracing::debug!(user_id, updated, "notifications marked read");
    Ok(Json(MarkedRead { updated }))
}
