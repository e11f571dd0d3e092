//! Session controller state-machine tests against a scripted page.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use slidecrawl::core::config::{CrawlConfig, DragStyle};
use slidecrawl::core::types::{PageCapture, SessionOutcome};
use slidecrawl::core::CrawlError;
use slidecrawl::page::{BackgroundImage, SliderPage};
use slidecrawl::{DistanceSolver, SessionTuning, SliderSession, TrajectoryProfile};

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Scripted solver: hands back a fixed drag distance without touching the
/// network or an image.
struct FixedSolver(f64);

#[async_trait]
impl DistanceSolver for FixedSolver {
    async fn target_distance<P: SliderPage + ?Sized>(&self, _page: &P) -> Result<f64, CrawlError> {
        Ok(self.0)
    }
}

/// Scripted page. `widths` is consumed one entry per verification check;
/// once the challenge is reported solved (submit clicked) the challenge
/// probe returns false.
#[derive(Default)]
struct MockPage {
    challenge_on_load: bool,
    widths: Mutex<VecDeque<f64>>,
    pub navigations: Mutex<Vec<String>>,
    pub drags: Mutex<Vec<usize>>,
    pub submit_clicks: Mutex<u32>,
    html: String,
}

impl MockPage {
    fn with_challenge(widths: &[f64], html: &str) -> Self {
        Self {
            challenge_on_load: true,
            widths: Mutex::new(widths.iter().copied().collect()),
            html: html.to_string(),
            ..Self::default()
        }
    }

    fn without_challenge(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SliderPage for MockPage {
    async fn navigate(&self, url: &str) -> Result<(), CrawlError> {
        self.navigations.lock().unwrap().push(url.to_string());
        Ok(())
    }

    async fn challenge_present(&self, _timeout: Duration) -> Result<bool, CrawlError> {
        let solved = *self.submit_clicks.lock().unwrap() > 0;
        Ok(self.challenge_on_load && !solved)
    }

    async fn background_image(&self, _timeout: Duration) -> Result<BackgroundImage, CrawlError> {
        Ok(BackgroundImage {
            src: "https://cdn.example/bg.jpg".to_string(),
            displayed_width: 320.0,
        })
    }

    async fn handle_center(&self) -> Result<(f64, f64), CrawlError> {
        Ok((40.0, 300.0))
    }

    async fn drag_handle(
        &self,
        _from: (f64, f64),
        trajectory: &[f64],
        _style: DragStyle,
        _step_delay: Duration,
    ) -> Result<(), CrawlError> {
        self.drags.lock().unwrap().push(trajectory.len());
        Ok(())
    }

    async fn retry_affordance_width(&self) -> Result<f64, CrawlError> {
        self.widths
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CrawlError::ElementTimeout(".yidun_top__right".to_string()))
    }

    async fn click_submit(&self) -> Result<(), CrawlError> {
        *self.submit_clicks.lock().unwrap() += 1;
        Ok(())
    }

    async fn capture(&self) -> Result<PageCapture, CrawlError> {
        Ok(PageCapture {
            html: self.html.clone(),
            current_url: "https://catalog.example/detail?id=1".to_string(),
        })
    }
}

fn fast_tuning() -> SessionTuning {
    let cfg = CrawlConfig::default();
    let mut tuning = SessionTuning::from_config(&cfg);
    tuning.settle = Duration::from_millis(1);
    tuning.challenge_wait = Duration::from_millis(1);
    tuning.trajectory = TrajectoryProfile::default();
    tuning
}

#[tokio::test]
async fn first_check_zero_width_solves_on_one_attempt() {
    init_logger();
    let page = MockPage::with_challenge(&[0.0], "<html>detail</html>");
    let solver = FixedSolver(120.0);

    let session = SliderSession::new(&page, &solver, fast_tuning());
    let (capture, outcome) = session.resolve("https://catalog.example/1").await.unwrap();

    assert_eq!(outcome, SessionOutcome::Solved { attempts: 1 });
    assert_eq!(page.drags.lock().unwrap().len(), 1);
    assert_eq!(*page.submit_clicks.lock().unwrap(), 1);
    assert!(!capture.html.is_empty());
}

#[tokio::test]
async fn persistent_nonzero_width_exhausts_but_still_returns_content() {
    init_logger();
    let page = MockPage::with_challenge(&[24.0, 24.0, 24.0], "<html>still blocked</html>");
    let solver = FixedSolver(120.0);

    let session = SliderSession::new(&page, &solver, fast_tuning());
    let (capture, outcome) = session.resolve("https://catalog.example/1").await.unwrap();

    assert_eq!(outcome, SessionOutcome::Exhausted { attempts: 3 });
    // One drag per attempt, never a submit click.
    assert_eq!(page.drags.lock().unwrap().len(), 3);
    assert_eq!(*page.submit_clicks.lock().unwrap(), 0);
    assert!(!capture.html.is_empty());
    assert!(!capture.current_url.is_empty());
}

#[tokio::test]
async fn absent_challenge_falls_through_to_content() {
    init_logger();
    let page = MockPage::without_challenge("<html>open catalog page</html>");
    let solver = FixedSolver(0.0);

    let session = SliderSession::new(&page, &solver, fast_tuning());
    let (capture, outcome) = session.resolve("https://catalog.example/2").await.unwrap();

    assert_eq!(outcome, SessionOutcome::NoChallenge);
    assert!(page.drags.lock().unwrap().is_empty());
    assert_eq!(capture.html, "<html>open catalog page</html>");
}

#[tokio::test]
async fn second_attempt_can_recover() {
    init_logger();
    // First verification rejects, second passes.
    let page = MockPage::with_challenge(&[24.0, 0.0], "<html>detail</html>");
    let solver = FixedSolver(88.5);

    let session = SliderSession::new(&page, &solver, fast_tuning());
    let (_capture, outcome) = session.resolve("https://catalog.example/1").await.unwrap();

    assert_eq!(outcome, SessionOutcome::Solved { attempts: 2 });
    assert_eq!(page.drags.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn missing_retry_affordance_counts_as_failed_attempt() {
    init_logger();
    // Width probe errors on every attempt; the session must exhaust rather
    // than crash, and still capture content.
    let page = MockPage::with_challenge(&[], "<html>still blocked</html>");
    let solver = FixedSolver(60.0);

    let session = SliderSession::new(&page, &solver, fast_tuning());
    let (capture, outcome) = session.resolve("https://catalog.example/1").await.unwrap();

    assert_eq!(outcome, SessionOutcome::Exhausted { attempts: 3 });
    assert!(!capture.html.is_empty());
}
