//! Google Cloud Vision label detection
//!
//! The photo is sent inline as base64 to `images:annotate`, so nothing has to be parked in
//! object storage while the service looks at it.
use crate::{
    error::{AppError, AppResult},
    models::LabelAnnotation,
    services::providers::LabelDetector,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const MAX_LABELS: u32 = 10;

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    label_annotations: Option<Vec<LabelAnnotation>>,
    #[serde(default)]
    error: Option<AnnotateError>,
}

#[derive(Debug, Deserialize)]
struct AnnotateError {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct VisionLabelDetector {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
}

impl VisionLabelDetector {
    pub fn new(api_key: String, api_url: String) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    fn parse_labels(body: &str) -> AppResult<Vec<LabelAnnotation>> {
        let response: AnnotateResponse = serde_json::from_str(body).map_err(|e| {
            AppError::ServiceUnavailable(format!("Failed to parse Vision response: {}", e))
        })?;

        let image_response = response.responses.into_iter().next().ok_or_else(|| {
            AppError::ServiceUnavailable("Vision response contained no results".to_string())
        })?;

        if let Some(error) = image_response.error {
            return Err(AppError::ServiceUnavailable(format!(
                "Vision API could not annotate image: {}",
                error.message
            )));
        }

        Ok(image_response.label_annotations.unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl LabelDetector for VisionLabelDetector {
    async fn detect_labels(&self, image: &[u8]) -> AppResult<Vec<LabelAnnotation>> {
        if image.is_empty() {
            return Err(AppError::InvalidInput("Image is empty".to_string()));
        }

        let url = format!("{}/v1/images:annotate", self.api_url);
        let body = json!({
            "requests": [{
                "image": { "content": STANDARD.encode(image) },
                "features": [{ "type": "LABEL_DETECTION", "maxResults": MAX_LABELS }]
            }]
        });

        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("Failed to reach Vision API: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ServiceUnavailable(format!(
                "Vision API returned status {}: {}",
                status, body
            )));
        }

        let text = response.text().await?;
        let labels = Self::parse_labels(&text)?;

        tracing::info!(
            labels = labels.len(),
            image_bytes = image.len(),
            provider = "vision",
            "Labels detected"
        );

        Ok(labels)
    }

    fn name(&self) -> &'static str {
        "vision"
    }
}
