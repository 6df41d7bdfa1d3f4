use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub mod custom_vision;
pub mod form_recognizer;
pub mod mock;

pub use custom_vision::CustomVisionClassifier;
pub use form_recognizer::{
    AnalysisClient, AnalysisTransport, FormRecognizerTransport, OperationHandle, PollSettings,
};
pub use mock::{MockAnalysisTransport, MockClassifier};

/// Verdict from the image classification capability. `confidence` is the
/// best probability reported for the receipt tag and is carried for
/// diagnostics even when the verdict is a rejection.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Classification {
    pub is_receipt: bool,
    pub confidence: f64,
}

#[async_trait]
pub trait ClassifyImage: Send + Sync {
    async fn classify(&self, image: &[u8]) -> Result<Classification, VisionError>;
}

/// Failures from the external vision services. These are infrastructure
/// failures, distinct from a classification rejection ("service said no"),
/// which is an ordinary [`Classification`] verdict.
#[derive(Debug)]
pub enum VisionError {
    Unreachable(&'static str, String),
    UnexpectedStatus {
        service: &'static str,
        status: u16,
        body: String,
    },
    MissingOperationLocation,
    MalformedResponse(&'static str, String),
    AnalysisFailed(Value),
    PollTimeout(Duration),
}

impl std::error::Error for VisionError {}

impl fmt::Display for VisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisionError::Unreachable(service, e) => {
                write!(f, "VisionError: {service} could not be reached: {e}")
            }
            VisionError::UnexpectedStatus {
                service,
                status,
                body,
            } => {
                write!(
                    f,
                    "VisionError: {service} returned unexpected status {status}: {body}"
                )
            }
            VisionError::MissingOperationLocation => {
                write!(
                    f,
                    "VisionError: Analysis service accepted the request without an \
                     Operation-Location header"
                )
            }
            VisionError::MalformedResponse(service, detail) => {
                write!(f, "VisionError: {service} returned a malformed response: {detail}")
            }
            VisionError::AnalysisFailed(payload) => {
                write!(f, "VisionError: Analysis operation reported failure: {payload}")
            }
            VisionError::PollTimeout(deadline) => {
                write!(
                    f,
                    "VisionError: Analysis polling exceeded its deadline of {}s",
                    deadline.as_secs()
                )
            }
        }
    }
}
