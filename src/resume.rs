//! Resume tracking: reconcile a run against the persisted output table so a
//! restarted crawl never re-fetches or skips a record.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::types::Candidate;
use crate::core::CrawlError;

/// The only column the tracker reads from the persisted table; every other
/// record field is ignored.
#[derive(Debug, Deserialize)]
struct SeqRow {
    seq: u64,
}

/// Build the resume index: `index[n - 1]` is true iff a record with sequence
/// number `n` exists in the persisted table at run start.
///
/// A missing table is the expected first-run state and yields an all-false
/// index. Sequence numbers outside `[1, candidate_count]` and malformed rows
/// are data-integrity conditions: they are logged and the row is ignored,
/// never allowed to abort the build.
pub fn build_resume_index(candidate_count: usize, table: &Path) -> Result<Vec<bool>, CrawlError> {
    let mut index = vec![false; candidate_count];

    if !table.exists() {
        info!(
            "No persisted table at {}; full crawl of {} candidates",
            table.display(),
            candidate_count
        );
        return Ok(index);
    }

    let mut reader = csv::Reader::from_path(table)
        .map_err(|e| CrawlError::ResumeTable(format!("{}: {}", table.display(), e)))?;

    let mut seen = 0usize;
    for row in reader.deserialize::<SeqRow>() {
        match row {
            Ok(SeqRow { seq }) if (1..=candidate_count as u64).contains(&seq) => {
                index[(seq - 1) as usize] = true;
                seen += 1;
            }
            Ok(SeqRow { seq }) => {
                warn!(
                    "Persisted table row has out-of-range sequence number {} (candidates: {}); ignoring",
                    seq, candidate_count
                );
            }
            Err(e) => {
                warn!("Persisted table row unreadable; ignoring: {}", e);
            }
        }
    }

    info!(
        "Resume index built: {} of {} candidates already retrieved",
        seen, candidate_count
    );
    Ok(index)
}

/// Load the ordered candidate URL list (a JSON array of strings); list
/// position defines the 1-based sequence number.
///
/// A malformed URL aborts the load. Skipping it instead would silently shift
/// every later sequence number and corrupt the resume index.
pub fn load_candidates(path: &Path) -> Result<Vec<Candidate>, CrawlError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CrawlError::Candidates(format!("{}: {}", path.display(), e)))?;
    let urls: Vec<String> = serde_json::from_str(&raw)
        .map_err(|e| CrawlError::Candidates(format!("{}: {}", path.display(), e)))?;
    for (i, url) in urls.iter().enumerate() {
        url::Url::parse(url)
            .map_err(|e| CrawlError::Candidates(format!("entry {} `{}`: {}", i + 1, url, e)))?;
    }
    Ok(urls
        .into_iter()
        .enumerate()
        .map(|(i, url)| Candidate {
            seq: i as u64 + 1,
            url,
        })
        .collect())
}

/// Candidates the run still has to issue, in increasing sequence order.
pub fn pending_candidates(candidates: &[Candidate], index: &[bool]) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| !index.get((c.seq - 1) as usize).copied().unwrap_or(false))
        .cloned()
        .collect()
}
