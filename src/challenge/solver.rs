//! Challenge solver: turns the on-screen puzzle into a target drag distance.
//!
//! The background image is downloaded to a transient artifact so the detector
//! can run against the full-resolution bytes; the measured offset is then
//! scaled back into screen space because the page renders the image smaller
//! than its intrinsic size.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::CrawlError;
use crate::page::SliderPage;

use super::detector::GapDetector;

/// Anything that can turn the on-screen challenge into a target drag
/// distance. The session controller depends on this seam, not on the
/// concrete solver, so tests can script distances directly.
#[async_trait]
pub trait DistanceSolver: Send + Sync {
    async fn target_distance<P: SliderPage + ?Sized>(&self, page: &P) -> Result<f64, CrawlError>;
}

/// Transient on-disk copy of the challenge background. Removed on drop, so
/// every exit path out of `solve` cleans up.
struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    async fn write(bytes: &[u8], source_url: &str) -> Result<Self, CrawlError> {
        // Keep the source extension so the detector sidecar can sniff format.
        let ext = source_url
            .rsplit('.')
            .next()
            .filter(|e| e.len() <= 4 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("jpg");
        let path = std::env::temp_dir().join(format!("slidecrawl-bg-{}.{}", Uuid::new_v4(), ext));
        tokio::fs::write(&path, bytes).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("temp artifact {} not removed: {}", self.path.display(), e);
        }
    }
}

/// Convert a gap offset measured in natural-image pixels into a screen-space
/// drag distance.
pub fn screen_distance(gap_left: f64, calibration_offset: f64, scale_factor: f64) -> f64 {
    (gap_left + calibration_offset) * scale_factor
}

pub struct ChallengeSolver<D> {
    detector: D,
    http: reqwest::Client,
    /// Pixels added to the detector's offset; compensates a systematic bias
    /// against the puzzle piece's leading edge.
    calibration_offset: f64,
    /// Wait bound for the background image element.
    image_wait: Duration,
}

impl<D: GapDetector> ChallengeSolver<D> {
    pub fn new(
        detector: D,
        http: reqwest::Client,
        calibration_offset: f64,
        image_wait: Duration,
    ) -> Self {
        Self {
            detector,
            http,
            calibration_offset,
            image_wait,
        }
    }

    /// Compute the screen-space distance the slider handle must travel.
    ///
    /// A non-2xx image fetch surfaces as `CrawlError::ImageDownload`; a
    /// silently corrupt download would poison the scale computation, so it is
    /// never swallowed. All other failures are wrapped as solve failures and
    /// left to the session controller's retry decision.
    pub async fn solve<P: SliderPage + ?Sized>(&self, page: &P) -> Result<f64, CrawlError> {
        let bg = page.background_image(self.image_wait).await?;
        debug!("Challenge background: {} ({}px displayed)", bg.src, bg.displayed_width);

        let resp = self
            .http
            .get(&bg.src)
            .send()
            .await
            .map_err(|e| CrawlError::Solve(format!("image fetch failed: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CrawlError::ImageDownload {
                status: status.as_u16(),
                url: bg.src.clone(),
            });
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CrawlError::Solve(format!("image body read failed: {}", e)))?;

        let artifact = TempArtifact::write(&bytes, &bg.src).await?;

        let (natural_width, _) = image::image_dimensions(artifact.path())
            .map_err(|e| CrawlError::Solve(format!("cannot read image dimensions: {}", e)))?;
        if natural_width == 0 {
            return Err(CrawlError::Solve("background image has zero width".to_string()));
        }
        let scale_factor = bg.displayed_width / natural_width as f64;

        let gap = self.detector.detect(artifact.path()).await?;

        let distance = screen_distance(gap.left, self.calibration_offset, scale_factor);
        info!(
            "Solved challenge geometry: gap_left={:.1} scale={:.3} -> {:.1}px",
            gap.left, scale_factor, distance
        );
        Ok(distance)
    }
}

#[async_trait]
impl<D: GapDetector> DistanceSolver for ChallengeSolver<D> {
    async fn target_distance<P: SliderPage + ?Sized>(&self, page: &P) -> Result<f64, CrawlError> {
        self.solve(page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_distance_applies_calibration_then_scale() {
        // Detector offset 100, calibration +10, scale 0.5.
        assert_eq!(screen_distance(100.0, 10.0, 0.5), 55.0);
    }

    #[test]
    fn screen_distance_identity_scale() {
        assert_eq!(screen_distance(42.0, 10.0, 1.0), 52.0);
    }

    #[tokio::test]
    async fn temp_artifact_removed_on_drop() {
        let artifact = TempArtifact::write(b"bytes", "https://cdn.example/bg.jpg")
            .await
            .unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "jpg");
        drop(artifact);
        assert!(!path.exists());
    }
}
