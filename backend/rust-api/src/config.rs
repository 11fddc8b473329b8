use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo_uri: String,
    pub mongo_database: String,
    pub jwt_secret: String,
    pub judge_api_url: String,
    pub judge_timeout_secs: u64,
    pub bind_addr: String,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let config_builder = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            // Override with environment variables (prefix: APP_)
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        let settings = config_builder.build()?;

        let mongo_uri = settings
            .get_string("database.mongo_uri")
            .or_else(|_| env::var("MONGO_URI"))
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());

        let mongo_database = settings
            .get_string("database.mongo_database")
            .or_else(|_| env::var("MONGO_DATABASE"))
            .unwrap_or_else(|_| "codecampus".to_string());

        let jwt_secret = settings
            .get_string("auth.jwt_secret")
            .or_else(|_| env::var("JWT_SECRET"))
            .unwrap_or_else(|_| {
                if env == "prod" {
                    panic!("FATAL: JWT_SECRET must be set in production!");
                }
                eprintln!("WARNING: Using default JWT_SECRET (dev mode only!)");
                "dev-secret-only-for-local-testing".to_string()
            });

        let judge_api_url = settings
            .get_string("judge.url")
            .or_else(|_| env::var("JUDGE_API_URL"))
            .unwrap_or_else(|_| "http://localhost:2358".to_string());

        let judge_timeout_secs = settings
            .get_int("judge.timeout_secs")
            .ok()
            .and_then(positive_timeout)
            .or_else(|| {
                env::var("JUDGE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .and_then(positive_timeout)
            })
            .unwrap_or(10);

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        Ok(Config {
            mongo_uri,
            mongo_database,
            jwt_secret,
            judge_api_url,
            judge_timeout_secs,
            bind_addr,
        })
    }
}

/// TOML integers arrive as i64; reject non-positive values before the u64
/// cast so a negative setting falls back to the default instead of wrapping.
fn positive_timeout(v: i64) -> Option<u64> {
    if v > 0 {
        Some(v as u64)
    } else {
        None
    }
}
