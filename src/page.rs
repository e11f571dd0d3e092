//! DOM access seam for the challenge session.
//!
//! The session state machine and the solver talk to the page exclusively
//! through `SliderPage`, so the retry logic is testable against a scripted
//! mock and the CDP plumbing stays in one place.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::core::config::{ChallengeSelectors, DragStyle};
use crate::core::types::PageCapture;
use crate::core::CrawlError;

/// Challenge background image as rendered: network source plus the on-screen
/// displayed width (which differs from the intrinsic width).
#[derive(Debug, Clone, Deserialize)]
pub struct BackgroundImage {
    pub src: String,
    pub displayed_width: f64,
}

#[async_trait]
pub trait SliderPage: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), CrawlError>;

    /// Poll for the slider handle and submit control. `false` after the
    /// timeout means "no challenge on this load", not a failure.
    async fn challenge_present(&self, timeout: Duration) -> Result<bool, CrawlError>;

    /// Wait for the challenge background image and read its source URL and
    /// displayed width.
    async fn background_image(&self, timeout: Duration) -> Result<BackgroundImage, CrawlError>;

    /// Viewport coordinates of the slider handle's center.
    async fn handle_center(&self) -> Result<(f64, f64), CrawlError>;

    /// Press the handle at `from` and drag it by the trajectory's total
    /// distance, releasing at the end.
    async fn drag_handle(
        &self,
        from: (f64, f64),
        trajectory: &[f64],
        style: DragStyle,
        step_delay: Duration,
    ) -> Result<(), CrawlError>;

    /// Rendered width of the retry affordance. Zero width is the success
    /// signal: the widget hides it once verification passes.
    async fn retry_affordance_width(&self) -> Result<f64, CrawlError>;

    async fn click_submit(&self) -> Result<(), CrawlError>;

    /// Full rendered content and current URL, valid in every session state.
    async fn capture(&self) -> Result<PageCapture, CrawlError>;
}

// --- CDP-backed implementation ---

pub struct CdpSliderPage {
    page: Page,
    selectors: ChallengeSelectors,
}

impl CdpSliderPage {
    pub fn new(page: Page, selectors: ChallengeSelectors) -> Self {
        Self { page, selectors }
    }

    async fn eval<T: DeserializeOwned>(&self, js: String) -> Result<T, CrawlError> {
        self.page
            .evaluate(js)
            .await
            .map_err(|e| CrawlError::Browser(format!("evaluate failed: {}", e)))?
            .into_value::<T>()
            .map_err(|e| CrawlError::Browser(format!("evaluate result: {}", e)))
    }

    async fn dispatch(&self, params: DispatchMouseEventParams) -> Result<(), CrawlError> {
        self.page
            .execute(params)
            .await
            .map_err(|e| CrawlError::Browser(format!("mouse dispatch failed: {}", e)))?;
        Ok(())
    }

    fn mouse_event(
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
    ) -> Result<DispatchMouseEventParams, CrawlError> {
        DispatchMouseEventParams::builder()
            .r#type(kind)
            .x(x)
            .y(y)
            .button(MouseButton::Left)
            .click_count(1)
            .build()
            .map_err(CrawlError::Browser)
    }
}

#[async_trait]
impl SliderPage for CdpSliderPage {
    async fn navigate(&self, url: &str) -> Result<(), CrawlError> {
        self.page
            .goto(url)
            .await
            .map_err(|e| CrawlError::Browser(format!("navigation to {} failed: {}", url, e)))?;
        // Best-effort settle; challenge pages sometimes never fire load.
        self.page.wait_for_navigation().await.ok();
        Ok(())
    }

    async fn challenge_present(&self, timeout: Duration) -> Result<bool, CrawlError> {
        // JS polling instead of CDP node waits: chromiumoxide has no stable
        // cross-version wait-for-selector surface.
        let js = format!(
            r#"(async () => {{
                const deadline = Date.now() + {timeout_ms};
                while (Date.now() < deadline) {{
                    const slider = document.querySelector('{slider}');
                    const submit = document.querySelector('{submit}');
                    if (slider && submit) return true;
                    await new Promise(r => setTimeout(r, 250));
                }}
                return false;
            }})()"#,
            timeout_ms = timeout.as_millis(),
            slider = self.selectors.slider_handle,
            submit = self.selectors.submit,
        );
        self.eval(js).await
    }

    async fn background_image(&self, timeout: Duration) -> Result<BackgroundImage, CrawlError> {
        let js = format!(
            r#"(async () => {{
                const deadline = Date.now() + {timeout_ms};
                while (Date.now() < deadline) {{
                    const el = document.querySelector('{bg}');
                    if (el && el.src) {{
                        const width = el.getBoundingClientRect().width;
                        if (width > 0) return {{ src: el.src, displayed_width: width }};
                    }}
                    await new Promise(r => setTimeout(r, 250));
                }}
                return null;
            }})()"#,
            timeout_ms = timeout.as_millis(),
            bg = self.selectors.background_image,
        );
        self.eval::<Option<BackgroundImage>>(js)
            .await?
            .ok_or_else(|| CrawlError::ElementTimeout(self.selectors.background_image.clone()))
    }

    async fn handle_center(&self) -> Result<(f64, f64), CrawlError> {
        #[derive(Deserialize)]
        struct Center {
            x: f64,
            y: f64,
        }
        let js = format!(
            r#"(() => {{
                const el = document.querySelector('{handle}');
                if (!el) return null;
                const r = el.getBoundingClientRect();
                return {{ x: r.x + r.width / 2, y: r.y + r.height / 2 }};
            }})()"#,
            handle = self.selectors.slider_handle,
        );
        let center = self
            .eval::<Option<Center>>(js)
            .await?
            .ok_or_else(|| CrawlError::ElementTimeout(self.selectors.slider_handle.clone()))?;
        Ok((center.x, center.y))
    }

    async fn drag_handle(
        &self,
        from: (f64, f64),
        trajectory: &[f64],
        style: DragStyle,
        step_delay: Duration,
    ) -> Result<(), CrawlError> {
        let (start_x, start_y) = from;
        let total: f64 = trajectory.iter().sum();

        self.dispatch(Self::mouse_event(DispatchMouseEventType::MouseMoved, start_x, start_y)?)
            .await?;
        self.dispatch(Self::mouse_event(DispatchMouseEventType::MousePressed, start_x, start_y)?)
            .await?;

        let mut x = start_x;
        let mut y = start_y;
        match style {
            DragStyle::Single => {
                x += total;
                self.dispatch(Self::mouse_event(DispatchMouseEventType::MouseMoved, x, y)?)
                    .await?;
            }
            DragStyle::Stepwise => {
                let delays: Vec<u64> = {
                    use rand::RngExt;
                    let mut rng = rand::rng();
                    let base = step_delay.as_millis() as u64;
                    trajectory
                        .iter()
                        .map(|_| base + rng.random_range(0..=base.max(1) / 2))
                        .collect()
                };
                let wobbles: Vec<f64> = {
                    use rand::RngExt;
                    let mut rng = rand::rng();
                    trajectory.iter().map(|_| rng.random_range(-1.0..1.0)).collect()
                };
                for ((delta, delay), wobble) in trajectory.iter().zip(delays).zip(wobbles) {
                    x += delta;
                    y = start_y + wobble;
                    self.dispatch(Self::mouse_event(DispatchMouseEventType::MouseMoved, x, y)?)
                        .await?;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }

        self.dispatch(Self::mouse_event(DispatchMouseEventType::MouseReleased, x, y)?)
            .await?;
        debug!("Drag complete: {:.1}px in {} steps", total, trajectory.len());
        Ok(())
    }

    async fn retry_affordance_width(&self) -> Result<f64, CrawlError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector('{sel}');
                return el ? el.getBoundingClientRect().width : null;
            }})()"#,
            sel = self.selectors.retry_affordance,
        );
        self.eval::<Option<f64>>(js)
            .await?
            .ok_or_else(|| CrawlError::ElementTimeout(self.selectors.retry_affordance.clone()))
    }

    async fn click_submit(&self) -> Result<(), CrawlError> {
        let js = format!(
            r#"(() => {{
                const el = document.querySelector('{sel}');
                if (!el) return false;
                el.click();
                return true;
            }})()"#,
            sel = self.selectors.submit,
        );
        let clicked: bool = self.eval(js).await?;
        if !clicked {
            return Err(CrawlError::ElementTimeout(self.selectors.submit.clone()));
        }
        Ok(())
    }

    async fn capture(&self) -> Result<PageCapture, CrawlError> {
        let html = self
            .page
            .content()
            .await
            .map_err(|e| CrawlError::Browser(format!("content capture failed: {}", e)))?;
        let current_url = self
            .page
            .url()
            .await
            .map_err(|e| CrawlError::Browser(format!("url read failed: {}", e)))?
            .ok_or_else(|| CrawlError::Browser("page has no current URL".to_string()))?;
        Ok(PageCapture { html, current_url })
    }
}
