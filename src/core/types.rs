use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One catalog entry to fetch. The sequence number is 1-based and fixed at
/// URL-list construction time; it never changes across runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub seq: u64,
    pub url: String,
}

/// Final rendered page state returned for every request, solved or not.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub html: String,
    pub current_url: String,
}

/// Terminal outcome of one challenge session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// No slider was presented on this load.
    NoChallenge,
    /// Verification passed within the attempt bound.
    Solved { attempts: u32 },
    /// Attempt bound reached; the capture is whatever is still on screen.
    Exhausted { attempts: u32 },
}

impl SessionOutcome {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, SessionOutcome::Exhausted { .. })
    }
}

/// A record extracted from one catalog detail page. Serialized as one row of
/// the persisted output table; `seq` is the column the resume tracker reads.
/// Fields absent from a given detail page stay empty strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub seq: u64,
    pub source_url: String,
    pub product_id: String,
    pub batch: String,
    pub publish_date: String,
    pub company_name: String,
    pub product_trademark: String,
    pub production_address: String,
    pub vehicle_model: String,
    pub vehicle_name: String,
    pub chassis_id: String,
    pub chassis_model_and_company: String,
    pub vin: String,
    pub fuel_type: String,
    pub fuel_consumption: String,
    pub emission_standard: String,
    pub engine_manufacturer: String,
    pub engine_model: String,
    pub displacement: String,
    pub reflective_mark_company: String,
    pub other_info: String,
    pub production_end_date: String,
    pub sales_end_date: String,
    /// Absolute detail-image URLs, `;`-joined so the record stays one CSV row.
    pub image_urls: String,
    pub fetched_at: DateTime<Utc>,
}

/// Per-run accounting, logged at the end of the crawl.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub fetched: Vec<u64>,
    pub failed: Vec<u64>,
    pub skipped: usize,
    pub interrupted: bool,
}
