// Judge client tests against a live MongoDB instance.
//
// These tests are marked with #[ignore]; run them with a reachable database:
//   MONGO_URI=mongodb://127.0.0.1:27017 cargo test -- --ignored

use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;
use std::collections::HashMap;

use codecampus_api::models::{Challenge, Language, LanguageMap, Submission, TestCase};
use codecampus_api::services::judge_service::JudgeService;
use codecampus_api::services::AppState;
use codecampus_api::Config;

async fn test_db() -> Database {
    let mongo_uri = std::env::var("MONGO_URI")
        .unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());

    let config = Config {
        mongo_uri: mongo_uri.clone(),
        mongo_database: "codecampus_test".to_string(),
        jwt_secret: "test-secret-for-integration-tests".to_string(),
        judge_api_url: "http://127.0.0.1:2358".to_string(),
        judge_timeout_secs: 1,
        bind_addr: "127.0.0.1:0".to_string(),
    };

    let client = mongodb::Client::with_uri_str(&mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    let state = AppState::new(config, client);
    state
        .ensure_indexes()
        .await
        .expect("Failed to create test indexes");
    state.mongo
}

async fn seed_challenge(db: &Database) -> ObjectId {
    let mut starter = HashMap::new();
    starter.insert(Language::Python, "def solve():\n    pass\n".to_string());

    let challenge = Challenge {
        id: ObjectId::new(),
        lesson_id: ObjectId::new(),
        title: "Sum Two Numbers".to_string(),
        prompt: String::new(),
        starter_code: LanguageMap::new(starter).unwrap(),
        solution_code: None,
        test_cases: vec![TestCase {
            input: "1 2".to_string(),
            expected_output: "3".to_string(),
            hidden: false,
        }],
    };
    db.collection::<Challenge>("challenges")
        .insert_one(&challenge)
        .await
        .unwrap();
    challenge.id
}

/// Accepts connections and holds them open without ever responding, so the
/// client's request runs into its own timeout.
async fn unresponsive_listener() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            if let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let _socket = socket;
                    tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                });
            }
        }
    });
    format!("http://{}", addr)
}

#[tokio::test]
#[ignore]
async fn judge_timeout_persists_no_submission() {
    let db = test_db().await;
    let challenge_id = seed_challenge(&db).await;
    let judge_url = unresponsive_listener().await;

    let judge = JudgeService::new(db.clone(), judge_url, 1);
    let result = judge
        .run_challenge(
            ObjectId::new(),
            challenge_id,
            Language::Python,
            "def solve():\n    return 3\n".to_string(),
        )
        .await;

    assert!(result.is_err());

    let stored = db
        .collection::<Submission>("submissions")
        .count_documents(doc! { "challenge_id": challenge_id })
        .await
        .unwrap();
    assert_eq!(stored, 0);
}

#[tokio::test]
#[ignore]
async fn unsupported_language_persists_no_submission() {
    let db = test_db().await;
    let challenge_id = seed_challenge(&db).await;
    let judge_url = unresponsive_listener().await;

    let judge = JudgeService::new(db.clone(), judge_url, 1);
    let result = judge
        .run_challenge(
            ObjectId::new(),
            challenge_id,
            Language::Rust,
            "fn main() {}".to_string(),
        )
        .await;

    assert!(result.is_err());

    let stored = db
        .collection::<Submission>("submissions")
        .count_documents(doc! { "challenge_id": challenge_id })
        .await
        .unwrap();
    assert_eq!(stored, 0);
}
