use axum::{extract::State, routing::post, Json, Router};
use chrono::Utc;
use serde::Deserialize;
use crate::auth::AdminUser;
use crate::error::{ApiError, ApiResult};
use crate::integrations::cloudinary::SignedUpload;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SignatureRequest { pub folder: Option<String> }

/// The browser uploads straight to Cloudinary with these parameters.
async fn upload_signature(State(s): State<AppState>, AdminUser(admin): AdminUser, body: Option<Json<SignatureRequest>>) -> ApiResult<Json<SignedUpload>> {
    let signer = s.cloudinary.as_ref().ok_or(ApiError::Unavailable("Image uploads"))?;
    let folder = body.and_then(|Json(r)| r.folder);
    if folder.as_deref().is_some_and(|f| f.contains("..") || !f.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))) {
        return Err(ApiError::BadRequest("Folder may only contain letters, digits, '-', '_' and '/'".to_string()));
    }
    let signed = signer.sign(folder.as_deref(), Utc::now().timestamp());
    tracing::debug!(admin_id = %admin.id, folder = %signed.folder, "upload signature issued");
    Ok(Json(signed))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/uploads/signature", post(upload_signature))
}
