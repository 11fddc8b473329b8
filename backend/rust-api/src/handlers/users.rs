use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::{
    errors::{ApiError, ApiResponse},
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::Submission,
    services::{
        dashboard_service::DashboardService, enrollment_service::EnrollmentService,
        judge_service::JudgeService, ledger_service::LedgerService, AppState,
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgressRequest {
    pub is_completed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEnrollmentRequest {
    pub course_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionsQuery {
    pub challenge_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub id: String,
    pub challenge_id: String,
    pub language: String,
    pub status: String,
    pub stdout: String,
    pub stderr: String,
    pub metrics: serde_json::Value,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
}

impl From<Submission> for SubmissionView {
    fn from(submission: Submission) -> Self {
        SubmissionView {
            id: submission.id.map(|id| id.to_hex()).unwrap_or_default(),
            challenge_id: submission.challenge_id.to_hex(),
            language: submission.language.as_str().to_string(),
            status: submission.status.as_str().to_string(),
            stdout: submission.stdout,
            stderr: submission.stderr,
            metrics: serde_json::to_value(&submission.metrics).unwrap_or(serde_json::Value::Null),
            submitted_at: submission.submitted_at,
        }
    }
}

pub(crate) fn user_id_from_claims(claims: &JwtClaims) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(&claims.sub)
        .map_err(|_| ApiError::unauthorized("Token subject is not a valid user id"))
}

/// PUT /users/progress/{lessonId} - upsert lesson progress, awarding XP at
/// most once per completion transition
pub async fn update_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(lesson_id): Path<String>,
    AppJson(req): AppJson<UpdateProgressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id_from_claims(&claims)?;
    let lesson_id = ObjectId::parse_str(&lesson_id)
        .map_err(|_| ApiError::validation("Invalid lesson id"))?;

    let ledger = LedgerService::new(state.mongo.clone());
    let progress_id = ledger
        .record_lesson_completion(user_id, lesson_id, req.is_completed)
        .await?;

    Ok(ApiResponse::new(json!({
        "progress": progress_id.to_hex()
    })))
}

/// GET /users/dashboard - stats snapshot + quick resume
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id_from_claims(&claims)?;

    let service = DashboardService::new(state.mongo.clone());
    let view = service.compose(user_id).await?;

    Ok(ApiResponse::new(view))
}

/// GET /users/enrollments - enrollment list with per-course lesson counts
pub async fn list_enrollments(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id_from_claims(&claims)?;

    let service = EnrollmentService::new(state.mongo.clone());
    let enrollments = service.list_enrollments(user_id).await?;

    Ok(ApiResponse::new(json!({ "enrollments": enrollments })))
}

/// POST /users/enrollments - enroll in a course; 409 on duplicate
pub async fn create_enrollment(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id_from_claims(&claims)?;
    let course_id = ObjectId::parse_str(&req.course_id)
        .map_err(|_| ApiError::validation("Invalid course id"))?;

    let service = EnrollmentService::new(state.mongo.clone());
    let enrollment_id = service.enroll(user_id, course_id).await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::new(json!({
            "enrollmentId": enrollment_id.to_hex()
        })),
    ))
}

/// GET /users/submissions?challengeId= - submission history, newest first
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Query(query): Query<SubmissionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = user_id_from_claims(&claims)?;
    let challenge_id = query
        .challenge_id
        .map(|id| {
            ObjectId::parse_str(&id).map_err(|_| ApiError::validation("Invalid challenge id"))
        })
        .transpose()?;

    let service = JudgeService::new(
        state.mongo.clone(),
        state.config.judge_api_url.clone(),
        state.config.judge_timeout_secs,
    );
    let submissions = service.list_submissions(user_id, challenge_id).await?;
    let views: Vec<SubmissionView> = submissions.into_iter().map(SubmissionView::from).collect();

    Ok(ApiResponse::new(json!({ "submissions": views })))
}
