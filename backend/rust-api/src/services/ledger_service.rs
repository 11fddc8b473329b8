use chrono::Utc;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};

use crate::errors::ApiError;
use crate::metrics::{PROGRESS_UPDATES_TOTAL, XP_AWARDS_TOTAL};
use crate::models::{Enrollment, Lesson, LessonProgress};
use crate::utils::retry::{retry_with_config, RetryConfig};
use crate::utils::time::chrono_to_bson;

/// Fixed reward for a not-completed -> completed transition
pub const LESSON_XP_REWARD: i64 = 50;

/// The single authority over `User.stats`. Nothing else writes to that field.
pub struct LedgerService {
    mongo: Database,
}

/// The award fires exactly on the not-completed -> completed transition.
/// Re-completion and un-completion are stat no-ops.
fn should_award(was_completed: bool, target_completed: bool) -> bool {
    target_completed && !was_completed
}

impl LedgerService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Upsert the (user, lesson) progress record and award XP at most once.
    ///
    /// The upsert is a single findOneAndUpdate returning the pre-image, so
    /// `was_completed` comes from the same server-side step as the write:
    /// of any number of concurrent completions, exactly one observes the
    /// false -> true transition. A crash between the upsert and the award
    /// means the retry sees `is_completed = true` and skips the award, so a
    /// retry can under-award but never double-award.
    pub async fn record_lesson_completion(
        &self,
        user_id: ObjectId,
        lesson_id: ObjectId,
        target_completed: bool,
    ) -> Result<ObjectId, ApiError> {
        let lessons = self.mongo.collection::<Lesson>("lessons");
        let lesson = lessons
            .find_one(doc! { "_id": lesson_id })
            .await?
            .ok_or_else(|| ApiError::not_found("Lesson not found"))?;

        // Progress only exists inside an enrollment
        let enrollments = self.mongo.collection::<Enrollment>("enrollments");
        enrollments
            .find_one(doc! { "user_id": user_id, "course_id": lesson.course_id })
            .await?
            .ok_or_else(|| ApiError::forbidden("Not enrolled in this course"))?;

        let progress = self
            .mongo
            .collection::<LessonProgress>("lesson_progress");

        // Step 1: atomically upsert the progress record and capture its
        // pre-image. Reading the old state in the same operation as the
        // write is what makes the unique (user_id, lesson_id) index the
        // serialization point: a separate read-then-write would let two
        // concurrent completions both see "not completed".
        let now = Utc::now();
        let completed_at = if target_completed {
            Bson::DateTime(chrono_to_bson(now))
        } else {
            Bson::Null
        };
        let insert_id = ObjectId::new();
        let update = doc! {
            "$set": {
                "is_completed": target_completed,
                "completed_at": completed_at,
                "updated_at": chrono_to_bson(now),
            },
            "$setOnInsert": {
                "_id": insert_id,
                "user_id": user_id,
                "lesson_id": lesson_id,
            },
        };

        let retry_cfg = RetryConfig::default();
        let before = retry_with_config(retry_cfg.clone(), || {
            let progress = progress.clone();
            let update = update.clone();
            async move {
                progress
                    .find_one_and_update(
                        doc! { "user_id": user_id, "lesson_id": lesson_id },
                        update,
                    )
                    .with_options(
                        FindOneAndUpdateOptions::builder()
                            .upsert(true)
                            .return_document(ReturnDocument::Before)
                            .build(),
                    )
                    .await
            }
        })
        .await?;

        // No pre-image means this call inserted the record
        let was_completed = before.as_ref().map(|p| p.is_completed).unwrap_or(false);
        let progress_id = before.as_ref().and_then(|p| p.id).unwrap_or(insert_id);

        // Step 2: award iff this call made the not-completed -> completed
        // transition. Any failure above has already aborted before this point.
        if should_award(was_completed, target_completed) {
            let users = self.mongo.collection::<crate::models::User>("users");
            retry_with_config(retry_cfg, || {
                let users = users.clone();
                async move {
                    users
                        .update_one(
                            doc! { "_id": user_id },
                            doc! {
                                "$inc": {
                                    "stats.total_xp": LESSON_XP_REWARD,
                                    "stats.lessons_completed": 1,
                                },
                                "$set": { "updatedAt": chrono_to_bson(now) },
                            },
                        )
                        .await
                }
            })
            .await?;

            XP_AWARDS_TOTAL.inc();
            PROGRESS_UPDATES_TOTAL.with_label_values(&["awarded"]).inc();
            tracing::info!(
                "Awarded {} XP to user {} for lesson {}",
                LESSON_XP_REWARD,
                user_id.to_hex(),
                lesson_id.to_hex()
            );
        } else {
            let transition = if target_completed {
                "noop"
            } else {
                "uncompleted"
            };
            PROGRESS_UPDATES_TOTAL
                .with_label_values(&[transition])
                .inc();
            tracing::debug!(
                "Progress update without award: user {} lesson {} was_completed={} target={}",
                user_id.to_hex(),
                lesson_id.to_hex(),
                was_completed,
                target_completed
            );
        }

        Ok(progress_id)
    }
}
