use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::vision::{Classification, ClassifyImage, VisionError};

const SERVICE_NAME: &str = "Custom Vision";

// Tag the classifier model was trained to emit for genuine receipts
const RECEIPT_TAG: &str = "Positive";

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(rename = "tagName")]
    tag_name: String,
    probability: f64,
}

/// Classifier backed by an Azure Custom Vision prediction endpoint.
pub struct CustomVisionClassifier {
    http_client: reqwest::Client,
    prediction_url: String,
    prediction_key: String,
    confidence_threshold: f64,
}

impl CustomVisionClassifier {
    pub fn new(
        http_client: reqwest::Client,
        prediction_url: String,
        prediction_key: String,
        confidence_threshold: f64,
    ) -> Self {
        Self {
            http_client,
            prediction_url,
            prediction_key,
            confidence_threshold,
        }
    }
}

#[async_trait]
impl ClassifyImage for CustomVisionClassifier {
    async fn classify(&self, image: &[u8]) -> Result<Classification, VisionError> {
        let response = self
            .http_client
            .post(&self.prediction_url)
            .header("Prediction-Key", &self.prediction_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image.to_vec())
            .send()
            .await
            .map_err(|e| VisionError::Unreachable(SERVICE_NAME, e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(VisionError::UnexpectedStatus {
                service: SERVICE_NAME,
                status: status.as_u16(),
                body,
            });
        }

        let prediction_response = response
            .json::<PredictionResponse>()
            .await
            .map_err(|e| VisionError::MalformedResponse(SERVICE_NAME, e.to_string()))?;

        Ok(classification_from(
            &prediction_response.predictions,
            self.confidence_threshold,
        ))
    }
}

// Acceptance requires the best receipt-tag probability to clear the
// threshold strictly; a probability exactly at the threshold is a rejection.
fn classification_from(predictions: &[Prediction], threshold: f64) -> Classification {
    let confidence = predictions
        .iter()
        .filter(|prediction| prediction.tag_name.eq_ignore_ascii_case(RECEIPT_TAG))
        .map(|prediction| prediction.probability)
        .fold(0.0_f64, f64::max);

    Classification {
        is_receipt: confidence > threshold,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(tag_name: &str, probability: f64) -> Prediction {
        Prediction {
            tag_name: String::from(tag_name),
            probability,
        }
    }

    #[test]
    fn probability_exactly_at_threshold_is_rejected() {
        let verdict = classification_from(&[prediction("Positive", 0.7)], 0.7);

        assert!(!verdict.is_receipt);
        assert_eq!(verdict.confidence, 0.7);
    }

    #[test]
    fn probability_just_above_threshold_is_accepted() {
        let verdict = classification_from(&[prediction("Positive", 0.7000001)], 0.7);

        assert!(verdict.is_receipt);
        assert_eq!(verdict.confidence, 0.7000001);
    }

    #[test]
    fn receipt_tag_match_is_case_insensitive() {
        let verdict = classification_from(&[prediction("positive", 0.95)], 0.7);

        assert!(verdict.is_receipt);
    }

    #[test]
    fn non_receipt_tags_are_ignored() {
        let predictions = [prediction("Negative", 0.99), prediction("Positive", 0.2)];

        let verdict = classification_from(&predictions, 0.7);

        assert!(!verdict.is_receipt);
        assert_eq!(verdict.confidence, 0.2);
    }

    #[test]
    fn empty_prediction_list_is_rejected_with_zero_confidence() {
        let verdict = classification_from(&[], 0.7);

        assert!(!verdict.is_receipt);
        assert_eq!(verdict.confidence, 0.0);
    }

    #[test]
    fn best_positive_probability_wins() {
        let predictions = [prediction("Positive", 0.4), prediction("Positive", 0.9)];

        let verdict = classification_from(&predictions, 0.7);

        assert!(verdict.is_receipt);
        assert_eq!(verdict.confidence, 0.9);
    }
}
