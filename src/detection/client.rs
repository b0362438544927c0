use reqwest::header::{ACCEPT, USER_AGENT};
use std::time::Duration;
use tokio::sync::oneshot;

use super::error::DetectionError;
use super::types::{DetectOptions, DetectRequest, DetectionResult, ErrorBody};
use crate::config::DetectionConfig;
use crate::geometry::BoundingBox;
use crate::BoxFuture;

/// Anything that can turn a selected box into detected polygons.
///
/// Methods return boxed futures for dyn-compatibility.
pub trait DetectionService: Send + Sync {
    fn detect<'a>(
        &'a self,
        bbox: BoundingBox,
        options: &'a DetectOptions,
    ) -> BoxFuture<'a, Result<DetectionResult, DetectionError>>;
}

/// HTTP client for the `/asphalt/detect` endpoint.
pub struct DetectionClient {
    base_url: String,
    user_agent: String,
    http: reqwest::Client,
}

impl DetectionClient {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/asphalt/detect", self.base_url)
    }

    /// Runs one detection. Degenerate boxes are rejected before any request
    /// is made; the whole exchange is bounded by `options.timeout_ms`.
    pub async fn detect(
        &self,
        bbox: BoundingBox,
        options: &DetectOptions,
    ) -> Result<DetectionResult, DetectionError> {
        if bbox.is_degenerate() {
            return Err(DetectionError::InvalidSelection);
        }

        let limit = Duration::from_millis(options.timeout_ms);
        match tokio::time::timeout(limit, self.send(&bbox, options)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Detection for {:?} timed out after {:?}", bbox, limit);
                Err(DetectionError::NetworkTimeout(options.timeout_ms))
            }
        }
    }

    /// Like [`detect`](Self::detect), but gives up as soon as `cancel` fires
    /// (or its sender is dropped). The in-flight request is dropped with it.
    pub async fn detect_until(
        &self,
        bbox: BoundingBox,
        options: &DetectOptions,
        cancel: oneshot::Receiver<()>,
    ) -> Result<DetectionResult, DetectionError> {
        tokio::select! {
            result = self.detect(bbox, options) => result,
            _ = cancel => {
                log::debug!("Detection for {:?} cancelled", bbox);
                Err(DetectionError::Cancelled)
            }
        }
    }

    async fn send(
        &self,
        bbox: &BoundingBox,
        options: &DetectOptions,
    ) -> Result<DetectionResult, DetectionError> {
        let url = self.endpoint();
        log::info!("Requesting detection for {:?} from {}", bbox, url);

        let response = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
            .json(&DetectRequest::new(bbox, options))
            .send()
            .await
            .map_err(|e| transport_error(e, options.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let fallback = format!("Detection failed ({})", status.as_u16());
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(fallback);
            log::warn!("Detection service answered {}: {}", status, message);
            return Err(DetectionError::DetectionFailed(message));
        }

        let result = response.json::<DetectionResult>().await.map_err(|e| {
            if e.is_timeout() {
                DetectionError::NetworkTimeout(options.timeout_ms)
            } else {
                log::warn!("Unreadable detection response: {}", e);
                DetectionError::DetectionFailed(
                    "Invalid response format from detection service".to_string(),
                )
            }
        })?;

        log::info!("Detection returned {} polygons", result.count);
        Ok(result)
    }
}

impl DetectionService for DetectionClient {
    fn detect<'a>(
        &'a self,
        bbox: BoundingBox,
        options: &'a DetectOptions,
    ) -> BoxFuture<'a, Result<DetectionResult, DetectionError>> {
        Box::pin(DetectionClient::detect(self, bbox, options))
    }
}

fn transport_error(err: reqwest::Error, timeout_ms: u64) -> DetectionError {
    if err.is_timeout() {
        DetectionError::NetworkTimeout(timeout_ms)
    } else {
        log::warn!("Detection request failed: {}", err);
        DetectionError::DetectionFailed(format!("Detection request failed: {}", err))
    }
}
