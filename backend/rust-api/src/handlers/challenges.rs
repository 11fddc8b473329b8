use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use mongodb::bson::oid::ObjectId;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::{
    errors::{ApiError, ApiResponse},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::Language,
    services::{judge_service::JudgeService, AppState},
};

use super::users::{user_id_from_claims, SubmissionView};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubmissionRequest {
    pub language: Language,

    #[validate(length(min = 1, message = "Source code must not be empty"))]
    pub source_code: String,
}

/// POST /challenges/{challengeId}/submissions - run code through the external
/// judge and record the terminal result
pub async fn create_submission(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(challenge_id): Path<String>,
    AppJson(req): AppJson<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let user_id = user_id_from_claims(&claims)?;
    let challenge_id = ObjectId::parse_str(&challenge_id)
        .map_err(|_| ApiError::validation("Invalid challenge id"))?;

    let service = JudgeService::new(
        state.mongo.clone(),
        state.config.judge_api_url.clone(),
        state.config.judge_timeout_secs,
    );
    let submission = service
        .run_challenge(user_id, challenge_id, req.language, req.source_code)
        .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::new(SubmissionView::from(submission)),
    ))
}
