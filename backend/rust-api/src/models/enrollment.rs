use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Enrollment stored in MongoDB "enrollments" collection.
///
/// Unique per (user_id, course_id); the compound unique index created at
/// startup is the enforcement point, so a concurrent duplicate insert loses
/// with error 11000 rather than creating a second record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub course_id: ObjectId,
    /// Immutable, set once at creation
    #[serde(with = "bson_datetime_as_chrono")]
    pub enrolled_at: DateTime<Utc>,
    /// Updated best-effort on lesson view
    #[serde(with = "bson_datetime_as_chrono")]
    pub last_accessed_at: DateTime<Utc>,
}

/// Per-user per-lesson completion state, "lesson_progress" collection.
///
/// Unique per (user_id, lesson_id). Absence of a record means NOT_STARTED;
/// `is_completed = false` is IN_PROGRESS; `is_completed = true` is COMPLETED.
/// COMPLETED -> IN_PROGRESS is allowed and never de-awards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonProgress {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub lesson_id: ObjectId,
    pub is_completed: bool,
    #[serde(default, with = "bson_datetime_as_chrono_option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}
