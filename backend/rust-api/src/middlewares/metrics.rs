use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Middleware recording HTTP request count and latency
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Normalize URL path to avoid cardinality explosion.
/// Replaces dynamic segments (ObjectIds, UUIDs, numeric ids) with placeholders.
fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut normalized = Vec::new();

    for segment in segments {
        if is_object_id_like(segment) || is_uuid_like(segment) || is_numeric_id(segment) {
            normalized.push("{id}");
        } else {
            normalized.push(segment);
        }
    }

    normalized.join("/")
}

/// MongoDB ObjectId hex: exactly 24 hex characters
fn is_object_id_like(s: &str) -> bool {
    s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// UUID format: 8-4-4-4-12 hex characters
fn is_uuid_like(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.chars().all(|c| c.is_ascii_hexdigit() || c == '-')
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_object_ids() {
        assert_eq!(
            normalize_path("/courses/64b7a1f0c2a4e3d5b6f7a8c9/syllabus"),
            "/courses/{id}/syllabus"
        );
    }

    #[test]
    fn normalizes_uuids_and_numeric_ids() {
        assert_eq!(
            normalize_path("/users/progress/550e8400-e29b-41d4-a716-446655440000"),
            "/users/progress/{id}"
        );
        assert_eq!(normalize_path("/lessons/42"), "/lessons/{id}");
    }

    #[test]
    fn leaves_static_paths_alone() {
        assert_eq!(normalize_path("/users/dashboard"), "/users/dashboard");
        assert_eq!(normalize_path("/health"), "/health");
    }
}
