use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::vision::VisionError;

const SERVICE_NAME: &str = "Form Recognizer";

const ANALYZE_PATH: &str = "/formrecognizer/v2.1/prebuilt/receipt/analyze";
const OPERATION_LOCATION_HEADER: &str = "Operation-Location";
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Follow-up location for a long-running analysis operation, handed back by
/// the service in the `Operation-Location` header of an accepted submission.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OperationHandle(String);

impl OperationHandle {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn location(&self) -> &str {
        &self.0
    }
}

enum OperationStatus {
    Running,
    Succeeded(Value),
    Failed(Value),
}

// Backends vary in status naming; everything non-terminal maps onto Running.
// A missing or unrecognized status is a malformed response, never a retry.
fn operation_status(payload: Value) -> Result<OperationStatus, VisionError> {
    let Some(status) = payload
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
    else {
        return Err(VisionError::MalformedResponse(
            SERVICE_NAME,
            String::from("missing status field"),
        ));
    };

    match status.as_str() {
        "notstarted" | "running" | "analyzing" => Ok(OperationStatus::Running),
        "succeeded" => Ok(OperationStatus::Succeeded(payload)),
        "failed" => Ok(OperationStatus::Failed(payload)),
        other => Err(VisionError::MalformedResponse(
            SERVICE_NAME,
            format!("unrecognized status '{other}'"),
        )),
    }
}

/// Transport half of the analysis capability: submit an image, fetch the
/// state of the resulting operation. Implementations are stateless and
/// shareable across concurrent requests.
#[async_trait]
pub trait AnalysisTransport: Send + Sync {
    async fn submit(&self, image: &[u8]) -> Result<OperationHandle, VisionError>;

    async fn fetch(&self, operation: &OperationHandle) -> Result<Value, VisionError>;
}

/// Azure Form Recognizer v2.1 prebuilt-receipt transport.
pub struct FormRecognizerTransport {
    http_client: reqwest::Client,
    endpoint: String,
    subscription_key: String,
}

impl FormRecognizerTransport {
    pub fn new(http_client: reqwest::Client, endpoint: String, subscription_key: String) -> Self {
        Self {
            http_client,
            endpoint: String::from(endpoint.trim_end_matches('/')),
            subscription_key,
        }
    }
}

#[async_trait]
impl AnalysisTransport for FormRecognizerTransport {
    async fn submit(&self, image: &[u8]) -> Result<OperationHandle, VisionError> {
        let url = format!("{}{}", self.endpoint, ANALYZE_PATH);

        let response = self
            .http_client
            .post(&url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| VisionError::Unreachable(SERVICE_NAME, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::UnexpectedStatus {
                service: SERVICE_NAME,
                status: status.as_u16(),
                body,
            });
        }

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(OperationHandle::new)
            .ok_or(VisionError::MissingOperationLocation)
    }

    async fn fetch(&self, operation: &OperationHandle) -> Result<Value, VisionError> {
        let response = self
            .http_client
            .get(operation.location())
            .header(SUBSCRIPTION_KEY_HEADER, &self.subscription_key)
            .send()
            .await
            .map_err(|e| VisionError::Unreachable(SERVICE_NAME, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::UnexpectedStatus {
                service: SERVICE_NAME,
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| VisionError::MalformedResponse(SERVICE_NAME, e.to_string()))
    }
}

/// Backoff and deadline bounds for the poll loop.
#[derive(Clone, Copy, Debug)]
pub struct PollSettings {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub deadline: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
            deadline: Duration::from_secs(60),
        }
    }
}

/// Drives a submitted analysis operation to a terminal state.
///
/// The poll interval starts at `initial_interval`, doubles per attempt, and
/// is capped at `max_interval`; the whole poll is bounded by `deadline`.
/// The loop holds no locks and suspends only in `tokio::time::sleep`, so
/// dropping the future (e.g. on client disconnect) cancels it cleanly.
pub struct AnalysisClient {
    transport: Box<dyn AnalysisTransport>,
    poll: PollSettings,
}

impl AnalysisClient {
    pub fn new(transport: Box<dyn AnalysisTransport>, poll: PollSettings) -> Self {
        Self { transport, poll }
    }

    pub async fn analyze(&self, image: &[u8]) -> Result<Value, VisionError> {
        let operation = self.transport.submit(image).await?;

        let started = Instant::now();
        let mut interval = self.poll.initial_interval;

        loop {
            let payload = self.transport.fetch(&operation).await?;

            match operation_status(payload)? {
                OperationStatus::Succeeded(payload) => return Ok(payload),
                OperationStatus::Failed(payload) => {
                    return Err(VisionError::AnalysisFailed(payload))
                }
                OperationStatus::Running => {
                    if started.elapsed() + interval > self.poll.deadline {
                        return Err(VisionError::PollTimeout(self.poll.deadline));
                    }

                    log::debug!(
                        "Analysis operation still running; next poll in {}ms",
                        interval.as_millis()
                    );

                    tokio::time::sleep(interval).await;
                    interval = (interval * 2).min(self.poll.max_interval);
                }
            }
        }
    }
}
