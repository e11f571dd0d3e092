//! Challenge session: the retry state machine driving one request.
//!
//! The machine is an explicit state value plus an attempt counter, owned by
//! `SliderSession` for exactly one navigation. Both terminal states return
//! the page capture: an exhausted challenge still yields whatever is on
//! screen, and the content-level check downstream decides whether that is a
//! failure. Transport and timeout errors inside an attempt only abort that
//! attempt.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::challenge::trajectory::TrajectoryProfile;
use crate::challenge::DistanceSolver;
use crate::core::config::{CrawlConfig, DragStyle};
use crate::core::types::{PageCapture, SessionOutcome};
use crate::core::CrawlError;
use crate::page::SliderPage;

/// Success heuristic, isolated so it can be swapped without touching the
/// state machine: the widget hides its retry affordance (renders it at zero
/// width) once verification has passed.
pub fn is_challenge_cleared(retry_affordance_width: f64) -> bool {
    retry_affordance_width == 0.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    ChallengeCheck,
    Dragging,
    Verifying,
    Retry,
    Solved,
    Exhausted,
}

/// Per-session tuning, lifted from the crawl config.
#[derive(Debug, Clone)]
pub struct SessionTuning {
    pub max_attempts: u32,
    pub challenge_wait: Duration,
    pub settle: Duration,
    pub drag_style: DragStyle,
    pub drag_step_delay: Duration,
    pub trajectory: TrajectoryProfile,
}

impl SessionTuning {
    pub fn from_config(cfg: &CrawlConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts,
            challenge_wait: cfg.challenge_wait,
            settle: cfg.settle,
            drag_style: cfg.drag_style,
            drag_step_delay: cfg.drag_step_delay,
            trajectory: TrajectoryProfile::default(),
        }
    }
}

/// State attached to one browser navigation. Created per request URL,
/// consumed by `resolve`.
pub struct SliderSession<'a, P: ?Sized, S> {
    page: &'a P,
    solver: &'a S,
    tuning: SessionTuning,
    attempts: u32,
}

impl<'a, P: SliderPage + ?Sized, S: DistanceSolver> SliderSession<'a, P, S> {
    pub fn new(page: &'a P, solver: &'a S, tuning: SessionTuning) -> Self {
        Self {
            page,
            solver,
            tuning,
            attempts: 0,
        }
    }

    /// Navigate to `url`, clear the challenge if one is presented, and return
    /// the resulting page content regardless of outcome.
    pub async fn resolve(mut self, url: &str) -> Result<(PageCapture, SessionOutcome), CrawlError> {
        self.page.navigate(url).await?;

        let mut state = SessionState::ChallengeCheck;
        loop {
            state = match state {
                SessionState::ChallengeCheck => {
                    if self.page.challenge_present(self.tuning.challenge_wait).await? {
                        debug!("Challenge present (attempt {})", self.attempts + 1);
                        SessionState::Dragging
                    } else {
                        // No slider on this load: fall through to content.
                        let outcome = if self.attempts == 0 {
                            SessionOutcome::NoChallenge
                        } else {
                            SessionOutcome::Solved {
                                attempts: self.attempts,
                            }
                        };
                        let capture = self.page.capture().await?;
                        return Ok((capture, outcome));
                    }
                }

                SessionState::Dragging => match self.drag_attempt().await {
                    Ok(()) => SessionState::Verifying,
                    Err(e) => {
                        warn!("Drag attempt failed: {}", e);
                        SessionState::Retry
                    }
                },

                SessionState::Verifying => match self.verify_attempt().await {
                    Ok(true) => SessionState::Solved,
                    Ok(false) => {
                        debug!("Verification rejected the drag");
                        SessionState::Retry
                    }
                    Err(e) => {
                        warn!("Verification check failed: {}", e);
                        SessionState::Retry
                    }
                },

                SessionState::Retry => {
                    self.attempts += 1;
                    if self.attempts >= self.tuning.max_attempts {
                        SessionState::Exhausted
                    } else {
                        SessionState::ChallengeCheck
                    }
                }

                SessionState::Solved => {
                    let attempts = self.attempts + 1;
                    info!("Challenge solved after {} attempt(s)", attempts);
                    let capture = self.page.capture().await?;
                    return Ok((capture, SessionOutcome::Solved { attempts }));
                }

                SessionState::Exhausted => {
                    warn!(
                        "Challenge attempts exhausted ({}); returning on-screen content",
                        self.attempts
                    );
                    let capture = self.page.capture().await?;
                    return Ok((
                        capture,
                        SessionOutcome::Exhausted {
                            attempts: self.attempts,
                        },
                    ));
                }
            };
        }
    }

    async fn drag_attempt(&self) -> Result<(), CrawlError> {
        let distance = self.solver.target_distance(self.page).await?;
        let trajectory = self.tuning.trajectory.generate(distance);
        if trajectory.is_empty() {
            // Zero target distance: nothing to move, go straight to verify.
            return Ok(());
        }
        let from = self.page.handle_center().await?;
        self.page
            .drag_handle(
                from,
                &trajectory,
                self.tuning.drag_style,
                self.tuning.drag_step_delay,
            )
            .await
    }

    async fn verify_attempt(&self) -> Result<bool, CrawlError> {
        tokio::time::sleep(self.tuning.settle).await;
        let width = self.page.retry_affordance_width().await?;
        if !is_challenge_cleared(width) {
            return Ok(false);
        }
        self.page.click_submit().await?;
        tokio::time::sleep(self.tuning.settle).await;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleared_predicate_is_zero_width() {
        assert!(is_challenge_cleared(0.0));
        assert!(!is_challenge_cleared(0.1));
        assert!(!is_challenge_cleared(24.0));
    }
}
