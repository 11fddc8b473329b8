use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
    Database,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ApiError;
use crate::metrics::{JUDGE_REQUESTS_TOTAL, SUBMISSIONS_TOTAL};
use crate::models::{Challenge, Language, Submission, SubmissionStatus};

#[derive(Debug, Serialize)]
struct JudgeRequest {
    language: String,
    source_code: String,
    test_cases: Vec<JudgeTestCase>,
}

#[derive(Debug, Serialize)]
struct JudgeTestCase {
    input: String,
    expected_output: String,
}

#[derive(Debug, Deserialize)]
struct JudgeResponse {
    results: Vec<CaseResult>,
}

#[derive(Debug, Deserialize)]
pub struct CaseResult {
    pub passed: bool,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub time_ms: f64,
    #[serde(default)]
    pub memory_kb: i64,
}

/// Client for the external judging service. Code is never executed here; this
/// service sends source + test cases out, aggregates the verdicts and records
/// the result.
pub struct JudgeService {
    mongo: Database,
    http_client: Client,
    judge_api_url: String,
    timeout: Duration,
}

impl JudgeService {
    pub fn new(mongo: Database, judge_api_url: String, timeout_secs: u64) -> Self {
        Self {
            mongo,
            http_client: Client::new(),
            judge_api_url,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run a challenge submission through the judge and persist the outcome.
    ///
    /// The submission record is written once with a terminal status. A judge
    /// timeout or transport failure persists nothing and is surfaced as an
    /// execution failure, never retried silently.
    pub async fn run_challenge(
        &self,
        user_id: ObjectId,
        challenge_id: ObjectId,
        language: Language,
        source_code: String,
    ) -> Result<Submission, ApiError> {
        let challenges = self.mongo.collection::<Challenge>("challenges");
        let challenge = challenges
            .find_one(doc! { "_id": challenge_id })
            .await?
            .ok_or_else(|| ApiError::not_found("Challenge not found"))?;

        if !challenge.starter_code.contains(language) {
            return Err(ApiError::validation(format!(
                "Challenge does not support language '{}'",
                language.as_str()
            )));
        }

        let results = self.execute(&challenge, language, &source_code).await?;

        let status = aggregate_verdict(&results);
        let (stdout, stderr) = combine_output(&results);
        let metrics = execution_metrics(&results);

        let submission = Submission {
            id: None,
            user_id,
            challenge_id,
            language,
            source_code,
            stdout,
            stderr,
            status,
            metrics,
            submitted_at: Utc::now(),
        };

        let submissions = self.mongo.collection::<Submission>("submissions");
        let inserted = submissions.insert_one(&submission).await?;
        let submission_id = inserted
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ApiError::internal("Submission insert returned no ObjectId"))?;

        SUBMISSIONS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
        tracing::info!(
            "Submission {} recorded: user {} challenge {} status {}",
            submission_id.to_hex(),
            user_id.to_hex(),
            challenge_id.to_hex(),
            status.as_str()
        );

        Ok(Submission {
            id: Some(submission_id),
            ..submission
        })
    }

    /// Submission history, newest first
    pub async fn list_submissions(
        &self,
        user_id: ObjectId,
        challenge_id: Option<ObjectId>,
    ) -> Result<Vec<Submission>, ApiError> {
        let mut filter = doc! { "user_id": user_id };
        if let Some(challenge_id) = challenge_id {
            filter.insert("challenge_id", challenge_id);
        }

        let submissions = self.mongo.collection::<Submission>("submissions");
        let mut cursor = submissions
            .find(filter)
            .with_options(
                FindOptions::builder()
                    .sort(doc! { "submitted_at": -1 })
                    .limit(50)
                    .build(),
            )
            .await?;

        let mut result = Vec::new();
        while let Some(submission) = cursor.try_next().await? {
            result.push(submission);
        }
        Ok(result)
    }

    async fn execute(
        &self,
        challenge: &Challenge,
        language: Language,
        source_code: &str,
    ) -> Result<Vec<CaseResult>, ApiError> {
        let url = format!("{}/execute", self.judge_api_url);
        let payload = JudgeRequest {
            language: language.as_str().to_string(),
            source_code: source_code.to_string(),
            test_cases: challenge
                .test_cases
                .iter()
                .map(|tc| JudgeTestCase {
                    input: tc.input.clone(),
                    expected_output: tc.expected_output.clone(),
                })
                .collect(),
        };

        tracing::debug!(
            "Calling judge at {} for challenge {} ({} test cases)",
            url,
            challenge.id.to_hex(),
            payload.test_cases.len()
        );

        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let outcome = if e.is_timeout() { "timeout" } else { "error" };
                JUDGE_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
                ApiError::internal(format!("Judging service unavailable: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            JUDGE_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
            return Err(ApiError::internal(format!(
                "Judging service returned {}: {}",
                status, error_text
            )));
        }

        let judge_response: JudgeResponse = response.json().await.map_err(|e| {
            JUDGE_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
            ApiError::internal(format!("Failed to parse judge response: {}", e))
        })?;

        JUDGE_REQUESTS_TOTAL.with_label_values(&["ok"]).inc();
        Ok(judge_response.results)
    }
}

/// PASSED iff every test case passed; an empty result set is a failure
pub fn aggregate_verdict(results: &[CaseResult]) -> SubmissionStatus {
    if !results.is_empty() && results.iter().all(|r| r.passed) {
        SubmissionStatus::Passed
    } else {
        SubmissionStatus::Failed
    }
}

fn combine_output(results: &[CaseResult]) -> (String, String) {
    let stdout = results
        .iter()
        .map(|r| r.stdout.as_str())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    let stderr = results
        .iter()
        .map(|r| r.stderr.as_str())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (stdout, stderr)
}

fn execution_metrics(results: &[CaseResult]) -> mongodb::bson::Document {
    let passed = results.iter().filter(|r| r.passed).count() as i64;
    let total_time_ms: f64 = results.iter().map(|r| r.time_ms).sum();
    let max_memory_kb = results.iter().map(|r| r.memory_kb).max().unwrap_or(0);

    doc! {
        "total_cases": results.len() as i64,
        "passed_cases": passed,
        "total_time_ms": total_time_ms,
        "max_memory_kb": max_memory_kb,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(passed: bool) -> CaseResult {
        CaseResult {
            passed,
            stdout: String::new(),
            stderr: String::new(),
            time_ms: 1.0,
            memory_kb: 1024,
        }
    }

    #[test]
    fn all_passing_cases_aggregate_to_passed() {
        assert_eq!(
            aggregate_verdict(&[case(true), case(true)]),
            SubmissionStatus::Passed
        );
    }

    #[test]
    fn one_failing_case_fails_the_submission() {
        assert_eq!(
            aggregate_verdict(&[case(true), case(false), case(true)]),
            SubmissionStatus::Failed
        );
    }

    #[test]
    fn empty_results_fail() {
        assert_eq!(aggregate_verdict(&[]), SubmissionStatus::Failed);
    }

    #[test]
    fn metrics_summarize_cases() {
        let results = vec![
            CaseResult {
                passed: true,
                stdout: "a".into(),
                stderr: String::new(),
                time_ms: 2.5,
                memory_kb: 512,
            },
            CaseResult {
                passed: false,
                stdout: String::new(),
                stderr: "boom".into(),
                time_ms: 1.5,
                memory_kb: 2048,
            },
        ];

        let metrics = execution_metrics(&results);
        assert_eq!(metrics.get_i64("total_cases").unwrap(), 2);
        assert_eq!(metrics.get_i64("passed_cases").unwrap(), 1);
        assert_eq!(metrics.get_i64("max_memory_kb").unwrap(), 2048);

        let (stdout, stderr) = combine_output(&results);
        assert_eq!(stdout, "a");
        assert_eq!(stderr, "boom");
    }
}
