use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;

use crate::{
    error::Result,
    models::{cv::{CvDocument, NewCv}, session::AuthSession},
    state::AppState,
};

#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub profession: String,
}

/// Handles "make CV". The owner is the authenticated caller.
#[axum::debug_handler]
pub async fn create_cv(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Json(payload): Json<NewCv>,
) -> Result<Response> {
    let cv = state.profiles.create(session.user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(cv)).into_response())
}

/// Lists the caller's CVs.
pub async fn list_cvs(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
) -> Result<Json<Vec<CvDocument>>> {
    let cvs = state.profiles.list_owned(session.user_id).await?;
    tracing::debug!("📄 Listing {} CV(s) for user {}", cvs.len(), session.user_id);
    Ok(Json(cvs))
}

/// Returns one of the caller's CVs.
pub async fn get_cv(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(profession): Path<String>,
) -> Result<Json<CvDocument>> {
    Ok(Json(state.profiles.get_one(session.user_id, &profession).await?))
}

/// Deletes one of the caller's CVs.
#[axum::debug_handler]
pub async fn delete_cv(
    State(state): State<AppState>,
    Extension(session): Extension<AuthSession>,
    Path(profession): Path<String>,
) -> Result<Response> {
    let removed = state.profiles.delete(session.user_id, &profession).await?;

    let response = DeleteResponse {
        success: true,
        profession: removed.profession,
    };
    Ok((StatusCode::OK, Json(response)).into_response())
}
