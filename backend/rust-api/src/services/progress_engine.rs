use mongodb::bson::oid::ObjectId;
use serde::Serialize;
use std::collections::HashMap;

use crate::models::{Lesson, LessonProgress};

/// Unlock/completion status of one lesson in a syllabus
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LessonStatus {
    Locked,
    Unlocked,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonState {
    pub lesson_id: ObjectId,
    pub status: LessonStatus,
}

/// Compute per-lesson unlock status for a course.
///
/// Lessons are walked in ascending `order_index` (stable sort; duplicate
/// indexes are unspecified behavior). A lesson unlocks when it is first or
/// when the lesson immediately before it in that walk has a completed
/// progress record. Skip-ahead via out-of-band progress records is allowed
/// by this rule and deliberately not prevented.
///
/// Pure and deterministic: no I/O, identical inputs produce identical output.
pub fn compute_syllabus(
    lessons: &[Lesson],
    progress: &HashMap<ObjectId, LessonProgress>,
    anonymous: bool,
) -> Vec<LessonState> {
    let mut ordered: Vec<&Lesson> = lessons.iter().collect();
    ordered.sort_by_key(|lesson| lesson.order_index);

    if anonymous {
        return ordered
            .iter()
            .enumerate()
            .map(|(i, lesson)| LessonState {
                lesson_id: lesson.id,
                status: if i == 0 {
                    LessonStatus::Unlocked
                } else {
                    LessonStatus::Locked
                },
            })
            .collect();
    }

    let mut states = Vec::with_capacity(ordered.len());
    let mut previous_completed = true; // first lesson is always reachable

    for lesson in ordered {
        let record = progress.get(&lesson.id);
        let completed = record.map(|p| p.is_completed).unwrap_or(false);

        let status = if completed {
            LessonStatus::Completed
        } else if previous_completed {
            if record.is_some() {
                LessonStatus::InProgress
            } else {
                LessonStatus::Unlocked
            }
        } else {
            LessonStatus::Locked
        };

        states.push(LessonState {
            lesson_id: lesson.id,
            status,
        });
        previous_completed = completed;
    }

    states
}

/// Aggregate completion percentage: round(100 * completed / total), 0 for an
/// empty course.
pub fn completion_percent(completed: usize, total: usize) -> i32 {
    if total == 0 {
        return 0;
    }
    ((100.0 * completed as f64) / total as f64).round() as i32
}

/// Count of completed lessons among the given states
pub fn completed_count(states: &[LessonState]) -> usize {
    states
        .iter()
        .filter(|s| s.status == LessonStatus::Completed)
        .count()
}
