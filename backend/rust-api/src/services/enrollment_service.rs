use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    Database,
};
use serde::Serialize;
use std::collections::HashMap;

use crate::errors::{is_duplicate_key_error, ApiError};
use crate::metrics::ENROLLMENTS_TOTAL;
use crate::models::{Course, Enrollment, Lesson};
use crate::utils::time::chrono_to_bson;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentSummary {
    pub course: CourseSummary,
    pub total_lessons: u64,
    pub completed_lessons: u64,
    pub enrolled_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub difficulty: Option<String>,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        CourseSummary {
            id: course.id.to_hex(),
            title: course.title.clone(),
            slug: course.slug.clone(),
            description: course.description.clone(),
            difficulty: course.difficulty.clone(),
        }
    }
}

pub struct EnrollmentService {
    mongo: Database,
}

impl EnrollmentService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Create an enrollment for (user, course). The unique index on
    /// (user_id, course_id) turns a concurrent duplicate into a single winner;
    /// the loser gets a duplicate-key error mapped to Conflict. Never a
    /// read-then-write check.
    pub async fn enroll(
        &self,
        user_id: ObjectId,
        course_id: ObjectId,
    ) -> Result<ObjectId, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        courses
            .find_one(doc! { "_id": course_id })
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))?;

        let now = Utc::now();
        let enrollment = Enrollment {
            id: None,
            user_id,
            course_id,
            enrolled_at: now,
            last_accessed_at: now,
        };

        let enrollments = self.mongo.collection::<Enrollment>("enrollments");
        let result = enrollments.insert_one(&enrollment).await.map_err(|e| {
            if is_duplicate_key_error(&e) {
                ApiError::conflict("User is already enrolled in this course")
            } else {
                e.into()
            }
        })?;

        let enrollment_id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ApiError::internal("Enrollment insert returned no ObjectId"))?;

        ENROLLMENTS_TOTAL.inc();
        tracing::info!(
            "User {} enrolled in course {} (enrollment {})",
            user_id.to_hex(),
            course_id.to_hex(),
            enrollment_id.to_hex()
        );

        Ok(enrollment_id)
    }

    /// Best-effort bump of last_accessed_at. Called implicitly on lesson view,
    /// so a missing enrollment or a store hiccup is logged, never surfaced.
    pub async fn touch_access(&self, user_id: ObjectId, course_id: ObjectId, ts: DateTime<Utc>) {
        let enrollments = self.mongo.collection::<Enrollment>("enrollments");
        let result = enrollments
            .update_one(
                doc! { "user_id": user_id, "course_id": course_id },
                doc! { "$set": { "last_accessed_at": chrono_to_bson(ts) } },
            )
            .await;

        match result {
            Ok(update) if update.matched_count == 0 => {
                tracing::debug!(
                    "touch_access: no enrollment for user {} course {}",
                    user_id.to_hex(),
                    course_id.to_hex()
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("touch_access failed: {}", e);
            }
        }
    }

    /// List the user's enrollments with per-course lesson counts, in
    /// find (insertion) order.
    pub async fn list_enrollments(
        &self,
        user_id: ObjectId,
    ) -> Result<Vec<EnrollmentSummary>, ApiError> {
        let enrollments = self.mongo.collection::<Enrollment>("enrollments");
        let mut cursor = enrollments.find(doc! { "user_id": user_id }).await?;

        let mut records = Vec::new();
        while let Some(enrollment) = cursor.try_next().await? {
            records.push(enrollment);
        }
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let course_ids: Vec<ObjectId> = records.iter().map(|e| e.course_id).collect();
        let courses_map = self.load_courses(&course_ids).await?;

        let mut summaries = Vec::with_capacity(records.len());
        for enrollment in &records {
            let Some(course) = courses_map.get(&enrollment.course_id) else {
                // Course deleted after enrollment; skip rather than fail the list
                tracing::warn!(
                    "Enrollment {} references missing course {}",
                    enrollment.id.map(|id| id.to_hex()).unwrap_or_default(),
                    enrollment.course_id.to_hex()
                );
                continue;
            };

            let lesson_ids = self.load_lesson_ids(enrollment.course_id).await?;
            let completed_lessons = if lesson_ids.is_empty() {
                0
            } else {
                self.mongo
                    .collection::<crate::models::LessonProgress>("lesson_progress")
                    .count_documents(doc! {
                        "user_id": user_id,
                        "lesson_id": { "$in": lesson_ids.clone() },
                        "is_completed": true,
                    })
                    .await?
            };

            summaries.push(EnrollmentSummary {
                course: CourseSummary::from(course),
                total_lessons: lesson_ids.len() as u64,
                completed_lessons,
                enrolled_at: enrollment.enrolled_at,
                last_accessed_at: enrollment.last_accessed_at,
            });
        }

        Ok(summaries)
    }

    async fn load_courses(
        &self,
        course_ids: &[ObjectId],
    ) -> Result<HashMap<ObjectId, Course>, ApiError> {
        let courses = self.mongo.collection::<Course>("courses");
        let mut cursor = courses
            .find(doc! { "_id": { "$in": course_ids.to_vec() } })
            .await?;

        let mut map = HashMap::new();
        while let Some(course) = cursor.try_next().await? {
            map.insert(course.id, course);
        }
        Ok(map)
    }

    async fn load_lesson_ids(&self, course_id: ObjectId) -> Result<Vec<ObjectId>, ApiError> {
        let lessons = self.mongo.collection::<Lesson>("lessons");
        let mut cursor = lessons.find(doc! { "course_id": course_id }).await?;

        let mut ids = Vec::new();
        while let Some(lesson) = cursor.try_next().await? {
            ids.push(lesson.id);
        }
        Ok(ids)
    }
}
