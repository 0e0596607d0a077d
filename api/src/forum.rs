use agentboard_shared::*;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;

use crate::error::Result;
use crate::extract::{Params, PathParam, Payload};
use crate::store::{replies, threads, users, PageRequest};
use crate::{auth, db, validate, AppState};

// ── Request params ──

#[derive(Deserialize)]
pub struct ThreadListParams {
    page: Option<i64>,
    page_size: Option<i64>,
    category: Option<String>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    keyword: Option<String>,
    page: Option<i64>,
    page_size: Option<i64>,
    category: Option<String>,
}

#[derive(Deserialize)]
pub struct PageParams {
    page: Option<i64>,
    page_size: Option<i64>,
}

impl AppState {
    fn thread_page(&self, page: Option<i64>, page_size: Option<i64>) -> PageRequest {
        PageRequest::new(page, page_size, self.forum.default_page_size, self.forum.max_page_size)
    }

    fn reply_page(&self, page: Option<i64>, page_size: Option<i64>) -> PageRequest {
        PageRequest::new(page, page_size, self.forum.reply_page_size, self.forum.max_page_size)
    }
}

// ── Browsing ──

/// GET /api/forum/categories
pub async fn list_categories() -> Json<Vec<CategoryInfo>> {
    Json(Category::ALL.into_iter().map(CategoryInfo::from).collect())
}

/// GET /api/forum/threads?page=1&page_size=10&category=tech
pub async fn browse_threads(
    State(state): State<AppState>,
    Params(params): Params<ThreadListParams>,
) -> Result<Json<Paginated<Thread>>> {
    let category = validate::category(params.category.as_deref())?;
    let page = state.thread_page(params.page, params.page_size);
    let order = state.forum.browse_order;

    let result = db::run(&state.db, move |conn| {
        threads::browse(conn, category, order, page)
    })
    .await?;
    Ok(Json(result))
}

/// GET /api/forum/threads/search?keyword=rust&page=1
pub async fn search_threads(
    State(state): State<AppState>,
    Params(params): Params<SearchParams>,
) -> Result<Json<Paginated<Thread>>> {
    let keyword = validate::keyword(params.keyword.as_deref())?.to_string();
    let category = validate::category(params.category.as_deref())?;
    let page = state.thread_page(params.page, params.page_size);
    let order = state.forum.browse_order;

    let result = db::run(&state.db, move |conn| {
        threads::search(conn, &keyword, category, order, page)
    })
    .await?;
    Ok(Json(result))
}

/// GET /api/forum/threads/:id?page=1
pub async fn read_thread(
    State(state): State<AppState>,
    PathParam(id): PathParam<i64>,
    Params(params): Params<PageParams>,
) -> Result<Json<ThreadDetail>> {
    let page = state.reply_page(params.page, params.page_size);

    let detail = db::run(&state.db, move |conn| {
        let thread = threads::get(conn, id)?;
        let replies = replies::list_floors(conn, id, page)?;
        Ok(ThreadDetail { thread, replies })
    })
    .await?;
    Ok(Json(detail))
}

/// GET /api/forum/replies/:id/sub-replies?page=1
pub async fn get_sub_replies(
    State(state): State<AppState>,
    PathParam(reply_id): PathParam<i64>,
    Params(params): Params<PageParams>,
) -> Result<Json<Paginated<SubReply>>> {
    let page = state.reply_page(params.page, params.page_size);

    let result = db::run(&state.db, move |conn| {
        replies::list_sub_replies(conn, reply_id, page)
    })
    .await?;
    Ok(Json(result))
}

// ── Posting ──

/// POST /api/forum/threads
pub async fn create_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    Payload(payload): Payload<CreateThread>,
) -> Result<Json<Thread>> {
    let user_id = auth::extract_user_id(&headers, &state.auth)?;
    let category = validate::category(payload.category.as_deref())?;
    let forum = state.forum.clone();

    let thread = db::run(&state.db, move |conn| {
        let author = users::require(conn, user_id)?;
        threads::create(conn, &forum, author.id, &payload.title, &payload.content, category)
    })
    .await?;

    tracing::info!(thread_id = thread.id, user_id, category = %thread.category, "thread created");
    state.push.broadcast(PushEvent::NewThread {
        thread_id: thread.id,
        thread_title: thread.title.clone(),
        author: thread.user.username.clone(),
    });
    Ok(Json(thread))
}

/// POST /api/forum/threads/:id/replies
pub async fn reply_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    PathParam(thread_id): PathParam<i64>,
    Payload(payload): Payload<CreateReply>,
) -> Result<Json<Reply>> {
    let user_id = auth::extract_user_id(&headers, &state.auth)?;
    let forum = state.forum.clone();

    let (reply, deliveries) = db::run(&state.db, move |conn| {
        let author = users::require(conn, user_id)?;
        replies::create_floor(conn, &forum, &author, thread_id, &payload.content)
    })
    .await?;

    tracing::info!(
        thread_id,
        reply_id = reply.id,
        floor = reply.floor,
        notified = deliveries.len(),
        "floor created"
    );
    state.push.deliver(&deliveries);
    Ok(Json(reply))
}

/// POST /api/forum/replies/:id/sub-replies
pub async fn reply_floor(
    State(state): State<AppState>,
    headers: HeaderMap,
    PathParam(reply_id): PathParam<i64>,
    Payload(payload): Payload<CreateSubReply>,
) -> Result<Json<SubReply>> {
    let user_id = auth::extract_user_id(&headers, &state.auth)?;
    let forum = state.forum.clone();

    let (sub_reply, deliveries) = db::run(&state.db, move |conn| {
        let author = users::require(conn, user_id)?;
        replies::create_sub_reply(
            conn,
            &forum,
            &author,
            reply_id,
            &payload.content,
            payload.reply_to_id,
        )
    })
    .await?;

    tracing::info!(
        reply_id,
        sub_reply_id = sub_reply.id,
        notified = deliveries.len(),
        "sub-reply created"
    );
    state.push.deliver(&deliveries);
    Ok(Json(sub_reply))
}

// ── Deletion ──

/// DELETE /api/forum/threads/:id
pub async fn delete_thread(
    State(state): State<AppState>,
    headers: HeaderMap,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode> {
    let user_id = auth::extract_user_id(&headers, &state.auth)?;

    db::run(&state.db, move |conn| threads::delete(conn, user_id, id)).await?;

    tracing::info!(thread_id = id, user_id, "thread deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/forum/replies/:id
pub async fn delete_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    PathParam(id): PathParam<i64>,
) -> Result<StatusCode> {
    let user_id = auth::extract_user_id(&headers, &state.auth)?;

    db::run(&state.db, move |conn| replies::delete(conn, user_id, id)).await?;

    tracing::info!(reply_id = id, user_id, "reply deleted");
    Ok(StatusCode::NO_CONTENT)
}
