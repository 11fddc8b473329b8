use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::bson_datetime_as_chrono;

/// Course catalog entry stored in MongoDB "courses" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

/// Lesson stored in MongoDB "lessons" collection.
///
/// `order_index` is the sole ordering key within a course. Uniqueness is not
/// enforced; duplicate or gapped values are unspecified behavior (the sort is
/// stable on the stored value and nothing more is promised).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub course_id: ObjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub order_index: i32,
    #[serde(default)]
    pub challenge_ids: Vec<ObjectId>,
}

/// Closed set of languages a challenge can carry code for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Typescript,
    Rust,
    Go,
    Java,
    Cpp,
}

impl Language {
    pub fn as_str(&self) -> &str {
        match self {
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Rust => "rust",
            Language::Go => "go",
            Language::Java => "java",
            Language::Cpp => "cpp",
        }
    }
}

/// Per-language source map. Construction enforces the "at least one entry"
/// invariant so an empty map can never reach storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "HashMap<Language, String>")]
pub struct LanguageMap(HashMap<Language, String>);

impl LanguageMap {
    pub fn new(map: HashMap<Language, String>) -> Result<Self, &'static str> {
        if map.is_empty() {
            return Err("at least one language entry is required");
        }
        Ok(LanguageMap(map))
    }

    pub fn get(&self, language: Language) -> Option<&str> {
        self.0.get(&language).map(String::as_str)
    }

    pub fn contains(&self, language: Language) -> bool {
        self.0.contains_key(&language)
    }

    pub fn languages(&self) -> impl Iterator<Item = Language> + '_ {
        self.0.keys().copied()
    }
}

impl TryFrom<HashMap<Language, String>> for LanguageMap {
    type Error = String;

    fn try_from(map: HashMap<Language, String>) -> Result<Self, Self::Error> {
        LanguageMap::new(map).map_err(|e| e.to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Hidden cases run on the judge but are never echoed back to clients
    #[serde(default)]
    pub hidden: bool,
}

/// Coding challenge stored in MongoDB "challenges" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub lesson_id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub prompt: String,
    pub starter_code: LanguageMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_code: Option<LanguageMap>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}
