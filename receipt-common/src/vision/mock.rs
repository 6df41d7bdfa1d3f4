use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::vision::form_recognizer::{AnalysisTransport, OperationHandle};
use crate::vision::{Classification, ClassifyImage, VisionError};

/// Builds a terminal "succeeded" analysis payload around the given
/// recognized-fields object.
pub fn succeeded_analysis_payload(fields: Value) -> Value {
    json!({
        "status": "succeeded",
        "analyzeResult": {
            "documentResults": [
                { "fields": fields }
            ]
        }
    })
}

/// Shared call counter handed out by the mocks so callers can observe how
/// often a capability was exercised after handing the mock away.
#[derive(Clone, Debug, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Classifier double. Stands in for the real classifier when vision is
/// disabled and scripts verdicts in tests.
#[derive(Debug)]
pub struct MockClassifier {
    verdict: Classification,
    calls: CallCounter,
}

impl MockClassifier {
    /// Accepts everything with high confidence.
    pub fn accepting() -> Self {
        Self::with_verdict(Classification {
            is_receipt: true,
            confidence: 0.99,
        })
    }

    pub fn rejecting(confidence: f64) -> Self {
        Self::with_verdict(Classification {
            is_receipt: false,
            confidence,
        })
    }

    pub fn with_verdict(verdict: Classification) -> Self {
        Self {
            verdict,
            calls: CallCounter::default(),
        }
    }

    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl ClassifyImage for MockClassifier {
    async fn classify(&self, _image: &[u8]) -> Result<Classification, VisionError> {
        self.calls.increment();
        Ok(self.verdict)
    }
}

/// Analysis transport double driven by a script of poll responses. The
/// final response repeats, so a single-entry script behaves like a backend
/// whose operations always finish the same way.
pub struct MockAnalysisTransport {
    responses: Mutex<VecDeque<Value>>,
    submits: CallCounter,
    fetches: CallCounter,
}

impl MockAnalysisTransport {
    /// Operations complete immediately with no recognized fields.
    pub fn succeeding() -> Self {
        Self::scripted(vec![succeeded_analysis_payload(json!({}))])
    }

    pub fn scripted(responses: Vec<Value>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            submits: CallCounter::default(),
            fetches: CallCounter::default(),
        }
    }

    pub fn submit_counter(&self) -> CallCounter {
        self.submits.clone()
    }

    pub fn fetch_counter(&self) -> CallCounter {
        self.fetches.clone()
    }
}

#[async_trait]
impl AnalysisTransport for MockAnalysisTransport {
    async fn submit(&self, _image: &[u8]) -> Result<OperationHandle, VisionError> {
        self.submits.increment();
        Ok(OperationHandle::new("mock://analysis-operation"))
    }

    async fn fetch(&self, _operation: &OperationHandle) -> Result<Value, VisionError> {
        self.fetches.increment();

        let mut responses = self
            .responses
            .lock()
            .expect("Mock analysis transport lock was poisoned");

        match responses.len() {
            0 => Err(VisionError::MalformedResponse(
                "Mock analysis transport",
                String::from("script exhausted"),
            )),
            1 => Ok(responses
                .front()
                .cloned()
                .unwrap_or(Value::Null)),
            _ => Ok(responses.pop_front().unwrap_or(Value::Null)),
        }
    }
}
