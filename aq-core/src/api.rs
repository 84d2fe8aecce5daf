//! Client for the municipal open-data datastore (CKAN `datastore_search`).
//!
//! The upstream is a public, rate-limited API. Every request goes through
//! [`ApiClient::get_records`], which retries transport failures, HTTP 429
//! and 5xx answers with exponential backoff. Other failures surface
//! immediately as [`SourceError::UpstreamApiFailure`].

use crate::error::{Result, SourceError};
use crate::table::RawTable;
use crate::timestamp::{parse_timestamp, API_FILTER_FORMAT};
use chrono::NaiveDateTime;
use log::{info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// Public datastore search endpoint.
pub const DEFAULT_API_URL: &str = "https://datos.cali.gov.co/api/3/action/datastore_search";

/// Combined date-time field of the upstream datasets.
pub const TIMESTAMP_FIELD: &str = "Fecha & Hora";

/// Records requested per extraction.
pub const DEFAULT_LIMIT: usize = 32_640;

/// How often and how patiently a request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubled after each further one.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << exponent)
    }
}

#[derive(Debug, Deserialize)]
struct DatastoreResponse {
    success: bool,
    result: Option<DatastoreResult>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct DatastoreResult {
    #[serde(default)]
    records: Vec<Map<String, Value>>,
}

/// Statuses worth another attempt.
fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Async datastore client. One instance is shared by every source of a run.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Result<ApiClient> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(ApiClient {
            client,
            base_url: base_url.to_string(),
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch up to `limit` records of a resource, newest first, optionally
    /// restricted to records at or after `since`.
    pub async fn fetch_table(
        &self,
        resource_id: &str,
        limit: usize,
        since: Option<NaiveDateTime>,
    ) -> Result<RawTable> {
        let mut params = vec![
            ("resource_id", resource_id.to_string()),
            ("limit", limit.to_string()),
            ("sort", format!("{} desc", TIMESTAMP_FIELD)),
        ];
        if let Some(since) = since {
            let filter = serde_json::json!({
                TIMESTAMP_FIELD: { "$gte": since.format(API_FILTER_FORMAT).to_string() }
            });
            params.push(("filters", filter.to_string()));
            info!("Extracting {} from {}", resource_id, since);
        } else {
            info!("Extracting full history of {}", resource_id);
        }
        let records = self.get_records(&params).await?;
        info!("Received {} records for {}", records.len(), resource_id);
        Ok(RawTable::from_json_records(&records))
    }

    /// Timestamp of the freshest record upstream, or `None` when the
    /// resource is empty or its newest timestamp cannot be parsed.
    pub async fn latest_timestamp(&self, resource_id: &str) -> Result<Option<NaiveDateTime>> {
        let params = [
            ("resource_id", resource_id.to_string()),
            ("limit", "1".to_string()),
            ("sort", format!("{} desc", TIMESTAMP_FIELD)),
        ];
        let records = self.get_records(&params).await?;
        let table = RawTable::from_json_records(&records);
        Ok(table
            .timestamp_column()
            .and_then(|column| table.cell(0, column))
            .and_then(parse_timestamp))
    }

    async fn get_records(&self, params: &[(&str, String)]) -> Result<Vec<Map<String, Value>>> {
        let max_tries = self.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_tries {
            match self.client.get(&self.base_url).query(params).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body: DatastoreResponse = response.json().await?;
                        if !body.success {
                            let message = body
                                .error
                                .map(|e| e.to_string())
                                .unwrap_or_else(|| "response reported success=false".to_string());
                            return Err(SourceError::UpstreamApiFailure {
                                status: status.as_u16(),
                                message,
                            });
                        }
                        return Ok(body.result.map(|r| r.records).unwrap_or_default());
                    }

                    let failure = SourceError::UpstreamApiFailure {
                        status: status.as_u16(),
                        message: status.canonical_reason().unwrap_or("unknown").to_string(),
                    };
                    if !is_transient(status) {
                        return Err(failure);
                    }
                    warn!(
                        "Attempt {}/{}: bad response status from {}: {}",
                        attempt, max_tries, self.base_url, status
                    );
                    last_error = Some(failure);
                }
                Err(e) => {
                    warn!(
                        "Attempt {}/{}: request to {} failed: {}",
                        attempt, max_tries, self.base_url, e
                    );
                    last_error = Some(SourceError::Http(e));
                }
            }

            if attempt < max_tries {
                let delay = self.retry.backoff_after(attempt);
                info!("Sleeping for {} milliseconds before retry", delay.as_millis());
                tokio::time::sleep(delay).await;
            }
        }

        warn!("All {} attempts to {} failed", max_tries, self.base_url);
        Err(last_error.unwrap_or_else(|| SourceError::UpstreamApiFailure {
            status: 0,
            message: "no attempt was made".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_PATH: &str = "/api/3/action/datastore_search";

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
        }
    }

    fn client_for(server: &MockServer, max_attempts: u32) -> ApiClient {
        ApiClient::new(&format!("{}{}", server.uri(), SEARCH_PATH), fast_retry(max_attempts))
            .unwrap()
    }

    fn body(records: Value) -> Value {
        json!({ "success": true, "result": { "records": records } })
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(250),
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(250));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn fetch_table_sends_resource_and_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("resource_id", "abc"))
            .and(query_param("limit", "2"))
            .and(query_param("sort", "Fecha & Hora desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([
                {"_id": 1, "Fecha & Hora": "2024-01-01T01:00:00", "PM10": "40"},
                {"_id": 2, "Fecha & Hora": "2024-01-01T00:00:00", "PM10": "ND"}
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let table = client_for(&server, 3).fetch_table("abc", 2, None).await.unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.column_index("PM10").is_some());
    }

    #[tokio::test]
    async fn fetch_table_sends_gte_filter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param(
                "filters",
                r#"{"Fecha & Hora":{"$gte":"2024-01-01T05:00:00"}}"#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([]))))
            .expect(1)
            .mount(&server)
            .await;

        let since = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(5, 0, 0)
            .unwrap();
        let table = client_for(&server, 1)
            .fetch_table("abc", 10, Some(since))
            .await
            .unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([
                {"Fecha & Hora": "2024-01-01T00:00:00", "O3": 20}
            ]))))
            .expect(1)
            .mount(&server)
            .await;

        let table = client_for(&server, 3).fetch_table("abc", 1, None).await.unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let err = client_for(&server, 3)
            .fetch_table("abc", 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::UpstreamApiFailure { status: 500, .. }));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server, 3)
            .fetch_table("missing", 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::UpstreamApiFailure { status: 404, .. }));
    }

    #[tokio::test]
    async fn unsuccessful_body_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": {"message": "Not found: Resource was not found."}
            })))
            .mount(&server)
            .await;

        let err = client_for(&server, 3)
            .fetch_table("abc", 1, None)
            .await
            .unwrap_err();
        match err {
            SourceError::UpstreamApiFailure { status, message } => {
                assert_eq!(status, 200);
                assert!(message.contains("Resource was not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn latest_timestamp_reads_single_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([
                {"_id": 9, "Fecha & Hora": "2024-02-10T23:00:00", "PM2.5": "8"}
            ]))))
            .mount(&server)
            .await;

        let latest = client_for(&server, 1).latest_timestamp("abc").await.unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 2, 10)
            .unwrap()
            .and_hms_opt(23, 0, 0)
            .unwrap();
        assert_eq!(latest, Some(expected));
    }

    #[tokio::test]
    async fn latest_timestamp_of_empty_resource_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SEARCH_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body(json!([]))))
            .mount(&server)
            .await;

        let latest = client_for(&server, 1).latest_timestamp("abc").await.unwrap();
        assert_eq!(latest, None);
    }
}
