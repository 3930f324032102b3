use axum::{extract::State, routing::patch, Json, Router};
use serde::Deserialize;
use validator::Validate;
use crate::auth::AuthUser;
use crate::db::UserRow;
use crate::domain::aggregates::ShippingAddress;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 60, message = "Name must be 2-60 characters"))]
    pub name: Option<String>,
    pub default_address: Option<ShippingAddress>,
}

async fn update_profile(State(s): State<AppState>, user: AuthUser, Json(r): Json<UpdateProfileRequest>) -> ApiResult<Json<UserRow>> {
    r.validate()?;
    let address = r.default_address.map(|a| a.normalized()).transpose()?;
    let updated = sqlx::query_as::<_, UserRow>("UPDATE users SET name = COALESCE($2, name), default_address = COALESCE($3, default_address), updated_at = NOW() WHERE id = $1 RETURNING *")
        .bind(user.id).bind(r.name.as_deref().map(str::trim)).bind(address.map(sqlx::types::Json))
        .fetch_optional(&s.db).await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(updated))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/users/me", patch(update_profile))
}
