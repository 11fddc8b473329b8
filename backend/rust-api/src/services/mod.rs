use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Database, IndexModel,
};

use crate::config::Config;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
}

impl AppState {
    pub fn new(config: Config, mongo_client: MongoClient) -> Self {
        let mongo = mongo_client.database(&config.mongo_database);
        Self { config, mongo }
    }

    /// Create the unique compound indexes that enforce the two hard
    /// uniqueness invariants. Concurrent duplicate writes resolve to a single
    /// winner and a duplicate-key error (11000) for the loser, which the
    /// services surface as Conflict.
    pub async fn ensure_indexes(&self) -> anyhow::Result<()> {
        let enrollments = self
            .mongo
            .collection::<crate::models::Enrollment>("enrollments");
        enrollments
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "course_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("uniq_user_course".to_string())
                            .build(),
                    )
                    .build(),
            )
            .await?;

        let progress = self
            .mongo
            .collection::<crate::models::LessonProgress>("lesson_progress");
        progress
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "lesson_id": 1 })
                    .options(
                        IndexOptions::builder()
                            .unique(true)
                            .name("uniq_user_lesson".to_string())
                            .build(),
                    )
                    .build(),
            )
            .await?;

        tracing::info!("Unique indexes ensured on enrollments and lesson_progress");
        Ok(())
    }
}

pub mod dashboard_service;
pub mod enrollment_service;
pub mod judge_service;
pub mod ledger_service;
pub mod progress_engine;
