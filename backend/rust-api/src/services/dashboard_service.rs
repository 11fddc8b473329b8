use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{FindOneOptions, FindOptions},
    Database,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::errors::ApiError;
use crate::models::{Course, Enrollment, Lesson, LessonProgress, User};
use crate::models::user::UserStatsView;
use crate::services::enrollment_service::CourseSummary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub stats: UserStatsView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quick_resume: Option<QuickResume>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickResume {
    pub course: CourseSummary,
    /// First lesson not yet completed; absent when the course is finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lesson: Option<LessonRef>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonRef {
    pub id: String,
    pub title: String,
    pub order_index: i32,
}

/// Read-only composition of the "continue where you left off" view.
/// Reads from every store, writes to none.
pub struct DashboardService {
    mongo: Database,
}

impl DashboardService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    pub async fn compose(&self, user_id: ObjectId) -> Result<DashboardView, ApiError> {
        let users = self.mongo.collection::<User>("users");
        let user = users
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        // Stats are surfaced verbatim from the user document; the ledger is
        // the only writer, so no recomputation happens here.
        let stats = UserStatsView::from(user.stats);

        let quick_resume = self.quick_resume(user_id).await?;

        Ok(DashboardView {
            stats,
            quick_resume,
        })
    }

    /// Most recently accessed enrollment, tie-broken by _id for determinism,
    /// then the first lesson in order_index order without a completed record.
    async fn quick_resume(&self, user_id: ObjectId) -> Result<Option<QuickResume>, ApiError> {
        let enrollments = self.mongo.collection::<Enrollment>("enrollments");
        let latest = enrollments
            .find_one(doc! { "user_id": user_id })
            .with_options(
                FindOneOptions::builder()
                    .sort(doc! { "last_accessed_at": -1, "_id": -1 })
                    .build(),
            )
            .await?;

        let Some(enrollment) = latest else {
            // Zero enrollments is a valid state, not an error
            return Ok(None);
        };

        let courses = self.mongo.collection::<Course>("courses");
        let Some(course) = courses
            .find_one(doc! { "_id": enrollment.course_id })
            .await?
        else {
            tracing::warn!(
                "quick_resume: enrollment references missing course {}",
                enrollment.course_id.to_hex()
            );
            return Ok(None);
        };

        let lessons = self.load_ordered_lessons(enrollment.course_id).await?;
        let progress = self
            .load_progress(user_id, lessons.iter().map(|l| l.id).collect())
            .await?;

        let next_lesson = lessons
            .iter()
            .find(|lesson| {
                progress
                    .get(&lesson.id)
                    .map(|p| !p.is_completed)
                    .unwrap_or(true)
            })
            .map(|lesson| LessonRef {
                id: lesson.id.to_hex(),
                title: lesson.title.clone(),
                order_index: lesson.order_index,
            });

        Ok(Some(QuickResume {
            course: CourseSummary::from(&course),
            lesson: next_lesson,
        }))
    }

    async fn load_ordered_lessons(&self, course_id: ObjectId) -> Result<Vec<Lesson>, ApiError> {
        let lessons = self.mongo.collection::<Lesson>("lessons");
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
        &self,
        user_id: ObjectId,
        lesson_ids: Vec<ObjectId>,
    ) -> Result<HashMap<ObjectId, LessonProgress>, ApiError> {
        if lesson_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let progress = self
            .mongo
            .collection::<LessonProgress>("lesson_progress");
        let mut cursor = progress
            .find(doc! { "user_id": user_id, "lesson_id": { "$in": lesson_ids } })
            .await?;

        let mut map = HashMap::new();
        while let Some(record) = cursor.try_next().await? {
            map.insert(record.lesson_id, record);
        }
        Ok(map)
    }
}
