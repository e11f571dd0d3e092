//! Gap-detection seam.
//!
//! The model that locates the puzzle gap is an opaque, non-reproducible
//! external dependency, so it is consumed strictly through the `GapDetector`
//! trait and substituted with a deterministic stub in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::core::CrawlError;

/// Bounding region reported by the detector, in natural-image pixel space.
/// `left` is the gap's left edge, the only coordinate the solver consumes.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct GapBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

#[async_trait]
pub trait GapDetector: Send + Sync {
    /// Locate the puzzle gap in the background image at `image`.
    async fn detect(&self, image: &Path) -> Result<GapBox, CrawlError>;
}

/// Production detector: posts the raw image bytes to a sidecar inference
/// service and reads the bounding box from its JSON reply.
pub struct HttpGapDetector {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpGapDetector {
    pub fn new(endpoint: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }
}

#[async_trait]
impl GapDetector for HttpGapDetector {
    async fn detect(&self, image: &Path) -> Result<GapBox, CrawlError> {
        let bytes = tokio::fs::read(image).await?;

        let resp = self
            .client
            .post(&self.endpoint)
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await
            .map_err(|e| CrawlError::Detector(format!("request to {} failed: {}", self.endpoint, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CrawlError::Detector(format!(
                "sidecar returned status {}",
                status.as_u16()
            )));
        }

        let gap: GapBox = resp
            .json()
            .await
            .map_err(|e| CrawlError::Detector(format!("invalid detector reply: {}", e)))?;

        debug!("Gap detected at left={} (box {:?})", gap.left, gap);
        Ok(gap)
    }
}
