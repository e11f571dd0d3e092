use thiserror::Error;

/// Error taxonomy for the crawl core.
///
/// Transport and element-timeout errors are recovered locally by the session
/// retry loop; `CaptchaRecognition` is the content-level failure the caller
/// sees when a request exhausts its attempts and still re-yields the
/// verification page.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("browser error: {0}")]
    Browser(String),

    #[error("challenge element `{0}` not present within timeout")]
    ElementTimeout(String),

    #[error("image download returned status {status} for {url}")]
    ImageDownload { status: u16, url: String },

    #[error("gap detector failed: {0}")]
    Detector(String),

    #[error("challenge solve failed: {0}")]
    Solve(String),

    #[error("content still shows the verification page")]
    CaptchaRecognition,

    #[error("resume table unreadable: {0}")]
    ResumeTable(String),

    #[error("candidate list invalid: {0}")]
    Candidates(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
