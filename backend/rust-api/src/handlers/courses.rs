use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension,
};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
    Database,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    errors::{ApiError, ApiResponse},
    middlewares::auth::JwtClaims,
    models::{Course, Lesson, LessonProgress},
    services::{
        enrollment_service::{CourseSummary, EnrollmentService},
        progress_engine::{self, LessonStatus},
        AppState,
    },
};

use super::users::user_id_from_claims;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyllabusResponse {
    pub course: CourseSummary,
    pub lessons: Vec<SyllabusLesson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_progress: Option<UserProgressSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyllabusLesson {
    pub id: String,
    pub title: String,
    pub order_index: i32,
    pub status: LessonStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgressSummary {
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub percent: i32,
}

/// GET /courses/{courseId}/syllabus - ordered lessons with per-lesson unlock
/// status. Anonymous callers get the degraded view (first lesson unlocked,
/// rest locked) and no userProgress.
pub async fn syllabus(
    State(state): State<Arc<AppState>>,
    claims: Option<Extension<JwtClaims>>,
    Path(course_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let course_id = ObjectId::parse_str(&course_id)
        .map_err(|_| ApiError::validation("Invalid course id"))?;

    let courses = state.mongo.collection::<Course>("courses");
    let course = courses
        .find_one(doc! { "_id": course_id })
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))?;

    let lessons = load_ordered_lessons(&state.mongo, course_id).await?;

    let (states, user_progress) = match &claims {
        Some(Extension(claims)) => {
            let user_id = user_id_from_claims(claims)?;
            let progress = load_progress(&state.mongo, user_id, &lessons).await?;

            let states = progress_engine::compute_syllabus(&lessons, &progress, false);
            let completed = progress_engine::completed_count(&states);
            let summary = UserProgressSummary {
                completed_lessons: completed,
                total_lessons: states.len(),
                percent: progress_engine::completion_percent(completed, states.len()),
            };

            // Viewing the syllabus counts as course access
            EnrollmentService::new(state.mongo.clone())
                .touch_access(user_id, course_id, Utc::now())
                .await;

            (states, Some(summary))
        }
        None => {
            let states = progress_engine::compute_syllabus(&lessons, &HashMap::new(), true);
            (states, None)
        }
    };

    // compute_syllabus walks lessons in order_index order, matching the
    // sorted fetch, so states and lessons zip positionally
    let lessons_view = lessons
        .iter()
        .zip(states.iter())
        .map(|(lesson, state)| SyllabusLesson {
            id: lesson.id.to_hex(),
            title: lesson.title.clone(),
            order_index: lesson.order_index,
            status: state.status,
        })
        .collect();

    Ok(ApiResponse::new(SyllabusResponse {
        course: CourseSummary::from(&course),
        lessons: lessons_view,
        user_progress,
    }))
}

async fn load_ordered_lessons(
    mongo: &Database,
    course_id: ObjectId,
) -> Result<Vec<Lesson>, ApiError> {
    let lessons = mongo.collection::<Lesson>("lessons");
    let mut cursor = lessons
        .find(doc! { "course_id": course_id })
        .with_options(FindOptions::builder().sort(doc! { "order_index": 1 }).build())
        .await?;

    let mut result = Vec::new();
    while let Some(lesson) = cursor.try_next().await? {
        result.push(lesson);
    }
    Ok(result)
}

async fn load_progress(
    mongo: &Database,
    user_id: ObjectId,
    lessons: &[Lesson],
) -> Result<HashMap<ObjectId, LessonProgress>, ApiError> {
    if lessons.is_empty() {
        return Ok(HashMap::new());
    }

    let lesson_ids: Vec<ObjectId> = lessons.iter().map(|l| l.id).collect();
    let progress = mongo.collection::<LessonProgress>("lesson_progress");
    let mut cursor = progress
        .find(doc! { "user_id": user_id, "lesson_id": { "$in": lesson_ids } })
        .await?;

    let mut map = HashMap::new();
    while let Some(record) = cursor.try_next().await? {
        map.insert(record.lesson_id, record);
    }
    Ok(map)
}
