use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, Document};
use serde::{Deserialize, Serialize};

use super::bson_datetime_as_chrono;

/// User model stored in MongoDB "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub email: String,
    /// Opaque credential hash. Issued and verified by the auth service, never
    /// read by this API.
    pub password_hash: String,
    pub name: String,
    pub role: UserRole,
    /// Free-form profile attributes (avatar, bio, links)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Document>,
    /// Gamification aggregate. Mutated exclusively by the XP ledger via $inc;
    /// everything else reads it as a snapshot.
    #[serde(default)]
    pub stats: UserStats,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt", with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserStats {
    #[serde(default)]
    pub streak_days: i32,
    #[serde(default)]
    pub total_xp: i64,
    #[serde(default)]
    pub lessons_completed: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Instructor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::Student => "student",
            UserRole::Instructor => "instructor",
            UserRole::Admin => "admin",
        }
    }
}

/// Stats projection returned to the client (read-only view of the ledger)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatsView {
    pub streak_days: i32,
    pub total_xp: i64,
    pub lessons_completed: i32,
}

impl From<UserStats> for UserStatsView {
    fn from(stats: UserStats) -> Self {
        UserStatsView {
            streak_days: stats.streak_days,
            total_xp: stats.total_xp,
            lessons_completed: stats.lessons_completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_default_to_zero() {
        let stats = UserStats::default();
        assert_eq!(stats.streak_days, 0);
        assert_eq!(stats.total_xp, 0);
        assert_eq!(stats.lessons_completed, 0);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(UserRole::Instructor).unwrap(),
            serde_json::json!("instructor")
        );
        assert_eq!(UserRole::Student.as_str(), "student");
    }
}
