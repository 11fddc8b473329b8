use axum::Router;
use std::sync::Arc;

use codecampus_api::{config::Config, create_router, services::AppState};

pub const TEST_JWT_SECRET: &str = "test-secret-for-integration-tests";

/// Build the real router against a lazily-connecting MongoDB client. The
/// driver opens no connection until the first operation, so tests that are
/// rejected before any store access (auth, payload validation) run without a
/// live database.
pub async fn create_test_app() -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config {
        mongo_uri: "mongodb://127.0.0.1:27017".to_string(),
        mongo_database: "codecampus_test".to_string(),
        jwt_secret: TEST_JWT_SECRET.to_string(),
        judge_api_url: "http://127.0.0.1:2358".to_string(),
        judge_timeout_secs: 1,
        bind_addr: "127.0.0.1:0".to_string(),
    };

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to create test MongoDB client");

    let app_state = Arc::new(AppState::new(config, mongo_client));

    create_router(app_state)
}

pub fn bearer_token_for(user_id: &str) -> String {
    use codecampus_api::middlewares::auth::{JwtClaims, JwtService};

    let service = JwtService::new(TEST_JWT_SECRET);
    let claims = JwtClaims {
        sub: user_id.to_string(),
        role: "student".to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        iat: chrono::Utc::now().timestamp() as usize,
    };
    service.generate_token(claims).unwrap()
}
