//! Remote spreadsheet gateway store.
//!
//! Each submission is one POST against the gateway's append endpoint; the
//! gateway owns row placement, so the client never reads, rewrites, or
//! re-uploads the table.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::{FeedbackError, FeedbackRecord, FeedbackStore};
use crate::http_client::{self, RetryConfig};

const MAX_RESPONSE_BYTES: usize = 256 * 1024;

const RETRY: RetryConfig = RetryConfig {
    max_attempts: 3,
    base_delay: Duration::from_millis(250),
    max_delay: Duration::from_secs(2),
};

/// Feedback store posting rows to a remote spreadsheet gateway.
pub struct SheetStore {
    endpoint: String,
    token: Option<String>,
}

impl SheetStore {
    /// Validate the endpoint URL and build a store for it.
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self, FeedbackError> {
        validate_endpoint(endpoint)?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        let mut req = http_client::agent()
            .request(method, url)
            .set("Accept", "application/json");
        if let Some(token) = &self.token {
            req = req.set("Authorization", &format!("Bearer {}", token.trim()));
        }
        req
    }
}

impl FeedbackStore for SheetStore {
    fn append(&mut self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        record.validate()?;
        let url = format!("{}/rows", self.endpoint);
        let response = http_client::retry_with_backoff(
            RETRY,
            || {
                self.request("POST", &url)
                    .set("Content-Type", "application/json")
                    .send_json(record)
            },
            |err| matches!(err, ureq::Error::Transport(_)),
        );
        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = http_client::read_body_limited(response, MAX_RESPONSE_BYTES)
                    .unwrap_or_else(|err| err.to_string());
                return Err(FeedbackError::ServerStatus { status, body });
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(FeedbackError::Transport(err.to_string()));
            }
        };
        let body = http_client::read_body_limited(response, MAX_RESPONSE_BYTES)
            .map_err(|err| FeedbackError::Json(err.to_string()))?;
        parse_append_ack(&body)
    }

    fn records(&self) -> Result<Vec<FeedbackRecord>, FeedbackError> {
        let url = format!("{}/rows", self.endpoint);
        let response = match self.request("GET", &url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = http_client::read_body_limited(response, MAX_RESPONSE_BYTES)
                    .unwrap_or_else(|err| err.to_string());
                return Err(FeedbackError::ServerStatus { status, body });
            }
            Err(ureq::Error::Transport(err)) => {
                return Err(FeedbackError::Transport(err.to_string()));
            }
        };
        let body = http_client::read_body_limited(response, MAX_RESPONSE_BYTES)
            .map_err(|err| FeedbackError::Json(err.to_string()))?;
        serde_json::from_str(&body).map_err(|err| FeedbackError::Json(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct AppendAck {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

fn parse_append_ack(body: &str) -> Result<(), FeedbackError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(FeedbackError::Json("Empty response body".to_string()));
    }
    let ack: AppendAck = serde_json::from_str(trimmed)
        .map_err(|err| FeedbackError::Json(format!("{err}: {trimmed}")))?;
    if ack.ok {
        return Ok(());
    }
    Err(FeedbackError::Json(
        ack.error.unwrap_or_else(|| trimmed.to_string()),
    ))
}

/// Require an absolute https URL with a host; plain http is allowed for
/// loopback endpoints only.
fn validate_endpoint(endpoint: &str) -> Result<(), FeedbackError> {
    let parsed = Url::parse(endpoint)
        .map_err(|err| FeedbackError::InvalidEndpoint(format!("{endpoint}: {err}")))?;
    let Some(host) = parsed.host_str() else {
        return Err(FeedbackError::InvalidEndpoint(format!(
            "{endpoint} is missing a host"
        )));
    };
    match parsed.scheme() {
        "https" => Ok(()),
        "http" if is_loopback(host) => Ok(()),
        _ => Err(FeedbackError::InvalidEndpoint(format!(
            "{endpoint} must use https"
        ))),
    }
}

fn is_loopback(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host == "[::1]" || host == "::1"
}

#[cfg(test)]
mod tests {
    use super::super::sample_record;
    use super::*;
    use crate::http_client::tests::serve_once;

    #[test]
    fn endpoint_must_be_https_or_loopback() {
        assert!(SheetStore::new("https://sheets.example.com/v1", None).is_ok());
        assert!(SheetStore::new("http://127.0.0.1:9000", None).is_ok());
        assert!(matches!(
            SheetStore::new("http://sheets.example.com/v1", None),
            Err(FeedbackError::InvalidEndpoint(_))
        ));
        assert!(matches!(
            SheetStore::new("not a url", None),
            Err(FeedbackError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn append_accepts_ok_ack() {
        let body = r#"{"ok": true}"#;
        let url = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        let mut store = SheetStore::new(&url, Some("token".to_string())).unwrap();
        store.append(&sample_record("Ada")).unwrap();
    }

    #[test]
    fn append_surfaces_server_status() {
        let url = serve_once(
            "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\n\r\nbusy".to_string(),
        );
        let mut store = SheetStore::new(&url, None).unwrap();
        let err = store.append(&sample_record("Ada")).unwrap_err();
        assert!(matches!(
            err,
            FeedbackError::ServerStatus { status: 503, .. }
        ));
    }

    #[test]
    fn append_rejects_failure_ack() {
        let body = r#"{"ok": false, "error": "sheet full"}"#;
        let url = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        let mut store = SheetStore::new(&url, None).unwrap();
        let err = store.append(&sample_record("Ada")).unwrap_err();
        assert!(matches!(err, FeedbackError::Json(message) if message == "sheet full"));
    }

    #[test]
    fn records_parses_row_array() {
        let body = serde_json::to_string(&vec![sample_record("Ada")]).unwrap();
        let url = serve_once(format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ));
        let store = SheetStore::new(&url, None).unwrap();
        let rows = store.records().unwrap();
        assert_eq!(rows, vec![sample_record("Ada")]);
    }
}
