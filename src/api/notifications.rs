use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;
use crate::auth::{AdminUser, AuthUser, Role};
use crate::db::NotificationRow;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use super::{ListParams, Message};

#[derive(Debug, Serialize)]
pub struct NotificationFeed {
    pub data: Vec<NotificationRow>,
    pub unread: i64,
}

/// `user_id = None` reads the admin feed.
async fn feed(s: &AppState, user_id: Option<Uuid>, p: &ListParams) -> ApiResult<NotificationFeed> {
    let (_, per_page, offset) = p.bounds();
    let data = sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE user_id IS NOT DISTINCT FROM $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(user_id).bind(i64::from(per_page)).bind(offset).fetch_all(&s.db).await?;
    let unread: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications WHERE user_id IS NOT DISTINCT FROM $1 AND NOT is_read")
        .bind(user_id).fetch_one(&s.db).await?;
    Ok(NotificationFeed { data, unread: unread.0 })
}

async fn my_notifications(State(s): State<AppState>, user: AuthUser, Query(p): Query<ListParams>) -> ApiResult<Json<NotificationFeed>> {
    Ok(Json(feed(&s, Some(user.id), &p).await?))
}

async fn admin_notifications(State(s): State<AppState>, _admin: AdminUser, Query(p): Query<ListParams>) -> ApiResult<Json<NotificationFeed>> {
    Ok(Json(feed(&s, None, &p).await?))
}

/// Admins may also mark entries of the shared admin feed.
async fn mark_read(State(s): State<AppState>, user: AuthUser, Path(id): Path<Uuid>) -> ApiResult<Json<NotificationRow>> {
    let is_admin = user.role == Role::Admin;
    sqlx::query_as::<_, NotificationRow>("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND (user_id = $2 OR (user_id IS NULL AND $3)) RETURNING *")
        .bind(id).bind(user.id).bind(is_admin)
        .fetch_optional(&s.db).await?
        .map(Json)
        .ok_or(ApiError::NotFound("Notification"))
}

async fn mark_all_read(State(s): State<AppState>, user: AuthUser) -> ApiResult<Json<Message>> {
    let done = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read").bind(user.id).execute(&s.db).await?;
    Ok(Message::ok(format!("{} notifications marked as read", done.rows_affected())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(my_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:id/read", patch(mark_read))
        .route("/admin/notifications", get(admin_notifications))
}
