//! Run driver: one browser, one request at a time, in sequence order.
//!
//! The resume tracker decides what this run still owes; every unresolved
//! candidate goes through a challenge session, the content gate, extraction,
//! and the sink. The browser is shut down exactly once on every exit path,
//! including Ctrl-C.

use std::future::Future;
use std::pin::Pin;

use tracing::{error, info, warn};

use crate::browser::BrowserHandle;
use crate::challenge::{ChallengeSolver, DistanceSolver, HttpGapDetector};
use crate::core::config::CrawlConfig;
use crate::core::types::{Candidate, CatalogRecord, RunSummary};
use crate::core::CrawlError;
use crate::extract;
use crate::page::{CdpSliderPage, SliderPage};
use crate::resume;
use crate::session::{SessionTuning, SliderSession};
use crate::sink::CsvSink;

/// Crawl every candidate the persisted table does not already cover.
pub async fn run(cfg: CrawlConfig) -> Result<RunSummary, CrawlError> {
    let candidates = resume::load_candidates(&cfg.url_file)?;
    let index = resume::build_resume_index(candidates.len(), &cfg.data_file)?;
    let pending = resume::pending_candidates(&candidates, &index);
    let skipped = candidates.len() - pending.len();

    if pending.is_empty() {
        info!("All {} candidates already retrieved; nothing to do", candidates.len());
        return Ok(RunSummary {
            skipped,
            ..RunSummary::default()
        });
    }
    info!(
        "Crawling {} of {} candidates ({} already retrieved)",
        pending.len(),
        candidates.len(),
        skipped
    );

    let mut browser = BrowserHandle::launch(cfg.headless).await?;

    // Everything after launch runs inside this block so the browser is
    // closed on success, failure, and interrupt alike.
    let result = async {
        let page = browser.new_page("about:blank").await?;
        let page = CdpSliderPage::new(page, cfg.selectors.clone());

        let http = reqwest::Client::new();
        let detector = HttpGapDetector::new(cfg.detector_endpoint.clone(), http.clone());
        let solver = ChallengeSolver::new(detector, http, cfg.calibration_offset, cfg.image_wait);

        let mut sink = CsvSink::new(&cfg.data_file)?;
        let shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = Box::pin(async {
            let _ = tokio::signal::ctrl_c().await;
        });

        let summary =
            process_pending(&page, &solver, &cfg, &pending, skipped, &mut sink, shutdown).await?;
        sink.close()?;
        Ok(summary)
    }
    .await;

    browser.shutdown().await;

    if let Ok(summary) = &result {
        info!(
            "Run complete: {} fetched, {} failed, {} skipped{}",
            summary.fetched.len(),
            summary.failed.len(),
            summary.skipped,
            if summary.interrupted { " (interrupted)" } else { "" }
        );
    }
    result
}

/// Sequential fetch loop over the pending candidates.
///
/// Content-level failures (the request exhausted its challenge attempts and
/// still shows the verification page) mark the sequence number failed and
/// move on; browser-level failures abort the run because the session is
/// gone. `shutdown` resolving stops the loop before the next request.
pub async fn process_pending<P: SliderPage + ?Sized, S: DistanceSolver>(
    page: &P,
    solver: &S,
    cfg: &CrawlConfig,
    pending: &[Candidate],
    skipped: usize,
    sink: &mut CsvSink,
    mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>>,
) -> Result<RunSummary, CrawlError> {
    let mut summary = RunSummary {
        skipped,
        ..RunSummary::default()
    };

    for candidate in pending {
        info!("Fetching candidate {} : {}", candidate.seq, candidate.url);

        let outcome = tokio::select! {
            biased;
            _ = &mut shutdown => {
                warn!("Shutdown signal received; stopping before candidate {}", candidate.seq);
                summary.interrupted = true;
                break;
            }
            outcome = fetch_one(page, solver, cfg, candidate) => outcome,
        };

        match outcome {
            Ok(record) => {
                sink.push(record)?;
                summary.fetched.push(candidate.seq);
            }
            Err(CrawlError::CaptchaRecognition) => {
                warn!(
                    "Candidate {} still blocked after challenge attempts; marked failed",
                    candidate.seq
                );
                summary.failed.push(candidate.seq);
            }
            Err(e @ CrawlError::Browser(_)) => {
                error!("Browser failure on candidate {}: {}; aborting run", candidate.seq, e);
                return Err(e);
            }
            Err(e) => {
                error!("Candidate {} failed: {}", candidate.seq, e);
                summary.failed.push(candidate.seq);
            }
        }
    }

    Ok(summary)
}

async fn fetch_one<P: SliderPage + ?Sized, S: DistanceSolver>(
    page: &P,
    solver: &S,
    cfg: &CrawlConfig,
    candidate: &Candidate,
) -> Result<CatalogRecord, CrawlError> {
    let session = SliderSession::new(page, solver, SessionTuning::from_config(cfg));
    let (capture, outcome) = session.resolve(&candidate.url).await?;

    if outcome.is_exhausted() {
        warn!(
            "Candidate {}: challenge exhausted, gating returned content",
            candidate.seq
        );
    }

    // The gate, not the session outcome, decides whether content is usable.
    extract::ensure_not_blocked(&capture.html, &cfg.verification_marker)?;

    Ok(extract::extract_record(&capture.html, candidate.seq, &candidate.url))
}
