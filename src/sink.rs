//! Persisted output table: the CSV the next run's resume tracker reads.
//!
//! Rows are buffered and appended in batches so an interrupted run loses at
//! most one partial batch; `close` flushes the remainder.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::types::CatalogRecord;
use crate::core::CrawlError;

const BATCH_SIZE: usize = 10;

pub struct CsvSink {
    path: PathBuf,
    pending: Vec<CatalogRecord>,
    written: usize,
}

impl CsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, CrawlError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            pending: Vec::with_capacity(BATCH_SIZE),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue one record; flushes automatically every `BATCH_SIZE` rows.
    pub fn push(&mut self, record: CatalogRecord) -> Result<(), CrawlError> {
        self.pending.push(record);
        if self.pending.len() >= BATCH_SIZE {
            self.flush()?;
        }
        Ok(())
    }

    /// Append all buffered rows. The header is written only when the file is
    /// being created, so repeated runs keep appending to one table.
    pub fn flush(&mut self) -> Result<(), CrawlError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let exists = self.path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(!exists)
            .from_writer(file);

        let batch = self.pending.len();
        for record in self.pending.drain(..) {
            writer
                .serialize(record)
                .map_err(|e| CrawlError::ResumeTable(format!("write failed: {}", e)))?;
        }
        writer
            .flush()
            .map_err(|e| CrawlError::ResumeTable(format!("flush failed: {}", e)))?;

        self.written += batch;
        debug!(
            "Flushed {} record(s) to {} ({} total this run)",
            batch,
            self.path.display(),
            self.written
        );
        Ok(())
    }

    /// Flush the partial batch and report the run's row count.
    pub fn close(mut self) -> Result<usize, CrawlError> {
        self.flush()?;
        info!("Output table {}: {} record(s) written", self.path.display(), self.written);
        Ok(self.written)
    }
}
