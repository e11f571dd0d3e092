use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

// ---------------------------------------------------------------------------
// CrawlConfig: file-based config loader (slidecrawl.json) with env-var fallback
// ---------------------------------------------------------------------------

/// CSS selectors for the challenge widget. Defaults target the NetEase Yidun
/// slider the catalog site serves; override in `slidecrawl.json` when the
/// site swaps providers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChallengeSelectors {
    /// Background image carrying the puzzle gap.
    pub background_image: String,
    /// Draggable slider handle.
    pub slider_handle: String,
    /// "Continue" control clicked after verification passes.
    pub submit: String,
    /// Refresh affordance at the top-right of the widget; rendered with zero
    /// width when verification has passed. This is the success signal.
    pub retry_affordance: String,
}

impl Default for ChallengeSelectors {
    fn default() -> Self {
        Self {
            background_image: ".yidun_bg-img".to_string(),
            slider_handle: ".yidun_slider".to_string(),
            submit: "#submit-btn".to_string(),
            retry_affordance: ".yidun_top__right".to_string(),
        }
    }
}

/// How the drag gesture is transmitted to the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DragStyle {
    /// One cumulative horizontal offset in a single release-terminated gesture.
    Single,
    /// Replay every trajectory segment as a separate move event with an
    /// inter-step delay. Harder to distinguish from human input.
    #[default]
    Stepwise,
}

/// Raw on-disk shape of `slidecrawl.json`. All fields optional; anything
/// absent falls back to an env var, then to the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CrawlConfigFile {
    pub url_file: Option<PathBuf>,
    pub data_file: Option<PathBuf>,
    pub detector_endpoint: Option<String>,
    pub max_attempts: Option<u32>,
    pub image_wait_ms: Option<u64>,
    pub challenge_wait_ms: Option<u64>,
    pub settle_ms: Option<u64>,
    pub drag_step_delay_ms: Option<u64>,
    pub calibration_offset: Option<f64>,
    pub verification_marker: Option<String>,
    pub drag_style: Option<DragStyle>,
    pub headless: Option<bool>,
    pub selectors: Option<ChallengeSelectors>,
}

/// Resolved crawl configuration.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// JSON array of candidate URLs; list position defines the sequence number.
    pub url_file: PathBuf,
    /// Persisted output table (CSV). Read at startup by the resume tracker,
    /// appended to by the sink.
    pub data_file: PathBuf,
    /// Gap-detector sidecar endpoint receiving the background image.
    pub detector_endpoint: String,
    /// Attempt bound for one challenge session.
    pub max_attempts: u32,
    /// Wait bound for the challenge background image element.
    pub image_wait: Duration,
    /// Wait bound for the slider + submit controls during challenge check.
    pub challenge_wait: Duration,
    /// Settle delay after the drag and after the submit click.
    pub settle: Duration,
    /// Inter-step delay when replaying the trajectory stepwise.
    pub drag_step_delay: Duration,
    /// Pixels added to the detector's gap offset to compensate for its
    /// systematic bias against the piece's leading edge. Empirically tuned;
    /// do not "correct" it.
    pub calibration_offset: f64,
    /// Marker string identifying the verification interstitial in page content.
    pub verification_marker: String,
    pub drag_style: DragStyle,
    pub headless: bool,
    pub selectors: ChallengeSelectors,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfigFile::default().resolve()
    }
}

impl CrawlConfigFile {
    /// Collapse file values, env vars, and defaults into a `CrawlConfig`.
    pub fn resolve(self) -> CrawlConfig {
        CrawlConfig {
            url_file: self
                .url_file
                .or_else(|| env_path("SLIDECRAWL_URL_FILE"))
                .unwrap_or_else(|| PathBuf::from("urls.json")),
            data_file: self
                .data_file
                .or_else(|| env_path("SLIDECRAWL_DATA_FILE"))
                .unwrap_or_else(|| PathBuf::from("crawled_data/catalog.csv")),
            detector_endpoint: self
                .detector_endpoint
                .or_else(|| std::env::var("SLIDECRAWL_DETECTOR_ENDPOINT").ok())
                .unwrap_or_else(|| "http://127.0.0.1:8191/detect".to_string()),
            max_attempts: self.max_attempts.unwrap_or(3),
            image_wait: Duration::from_millis(self.image_wait_ms.unwrap_or(5_000)),
            challenge_wait: Duration::from_millis(self.challenge_wait_ms.unwrap_or(3_000)),
            settle: Duration::from_millis(self.settle_ms.unwrap_or(500)),
            drag_step_delay: Duration::from_millis(self.drag_step_delay_ms.unwrap_or(100)),
            calibration_offset: self.calibration_offset.unwrap_or(10.0),
            verification_marker: self
                .verification_marker
                .unwrap_or_else(|| crate::extract::DEFAULT_VERIFICATION_MARKER.to_string()),
            drag_style: self.drag_style.unwrap_or_default(),
            headless: self
                .headless
                .or_else(|| {
                    std::env::var("SLIDECRAWL_HEADLESS")
                        .ok()
                        .map(|v| v.trim() != "0")
                })
                .unwrap_or(true),
            selectors: self.selectors.unwrap_or_default(),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from)
}

/// Load `slidecrawl.json`.
///
/// Search order (first found wins): explicit `path` argument →
/// `SLIDECRAWL_CONFIG` env var → `./slidecrawl.json`.
///
/// Missing file → defaults (all env-var fallbacks apply).
/// Parse error → log a warning, return defaults.
pub fn load_config(path: Option<&Path>) -> CrawlConfig {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(p) = path {
        candidates.push(p.to_path_buf());
    }
    if let Ok(env_path) = std::env::var("SLIDECRAWL_CONFIG") {
        candidates.push(PathBuf::from(env_path));
    }
    candidates.push(PathBuf::from("slidecrawl.json"));

    for candidate in candidates {
        if !candidate.exists() {
            continue;
        }
        match std::fs::read_to_string(&candidate) {
            Ok(raw) => match serde_json::from_str::<CrawlConfigFile>(&raw) {
                Ok(file) => return file.resolve(),
                Err(e) => {
                    warn!("slidecrawl.json parse error in {}: {}", candidate.display(), e);
                    return CrawlConfig::default();
                }
            },
            Err(e) => {
                warn!("cannot read {}: {}", candidate.display(), e);
                return CrawlConfig::default();
            }
        }
    }

    CrawlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_tuned_constants() {
        let cfg = CrawlConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.calibration_offset, 10.0);
        assert_eq!(cfg.image_wait, Duration::from_secs(5));
        assert_eq!(cfg.challenge_wait, Duration::from_secs(3));
        assert_eq!(cfg.settle, Duration::from_millis(500));
        assert_eq!(cfg.drag_style, DragStyle::Stepwise);
    }

    #[test]
    fn file_fields_override_defaults() {
        let raw = r##"{
            "max_attempts": 5,
            "calibration_offset": 12.5,
            "drag_style": "single",
            "selectors": { "submit": "#continue" }
        }"##;
        let cfg = serde_json::from_str::<CrawlConfigFile>(raw).unwrap().resolve();
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.calibration_offset, 12.5);
        assert_eq!(cfg.drag_style, DragStyle::Single);
        assert_eq!(cfg.selectors.submit, "#continue");
        // Unspecified selector fields keep their defaults.
        assert_eq!(cfg.selectors.slider_handle, ".yidun_slider");
    }
}
