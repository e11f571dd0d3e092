pub mod browser;
pub mod challenge;
pub mod core;
pub mod crawl;
pub mod extract;
pub mod page;
pub mod resume;
pub mod session;
pub mod sink;

// --- Primary exports ---
pub use challenge::{
    ChallengeSolver, DistanceSolver, GapBox, GapDetector, HttpGapDetector, TrajectoryProfile,
};
pub use crate::core::config::{load_config, ChallengeSelectors, CrawlConfig, DragStyle};
pub use crate::core::error::CrawlError;
pub use crate::core::types::{Candidate, CatalogRecord, PageCapture, RunSummary, SessionOutcome};
pub use page::{BackgroundImage, SliderPage};
pub use session::{SessionTuning, SliderSession};
