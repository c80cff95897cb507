use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{ApplicationKey, ApplicationRecord, ApplicationStatus, CandidateId};
use super::sources::{JobBoard, SourceError};
use super::store::{StateStore, StoreError};

/// Failures that abort an ingest pass before the store is touched.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Board(#[from] SourceError),
}

/// One job-discovery request on behalf of a candidate.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub candidate_id: CandidateId,
    pub role: String,
    pub location: String,
    pub companies: Vec<String>,
    /// Opaque compliance markers stamped onto every new record (e.g. PILB).
    pub compliance_tags: Vec<String>,
}

/// What an ingest pass added and what it left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub added: Vec<ApplicationKey>,
    pub already_tracked: usize,
}

/// Converts job-discovery results into `discovered` application records,
/// deduplicating against existing keys. Never touches an existing record.
pub struct JobMatchIngestor<B> {
    board: Arc<B>,
    timeout: Duration,
}

impl<B> JobMatchIngestor<B>
where
    B: JobBoard,
{
    pub fn new(board: Arc<B>, timeout: Duration) -> Self {
        Self { board, timeout }
    }

    pub fn ingest(
        &self,
        store: &StateStore,
        request: &IngestRequest,
        now: DateTime<Utc>,
    ) -> Result<IngestReport, IngestError> {
        let _lock = store.lock()?;
        let mut records = store.load()?;

        let openings = self.board.find_openings(
            &request.role,
            &request.location,
            &request.companies,
            self.timeout,
        )?;

        let mut report = IngestReport::default();
        for opening in openings {
            let record = ApplicationRecord {
                candidate_id: request.candidate_id.clone(),
                role: opening.role,
                company: opening.company,
                application_link: opening.link,
                date_submitted: None,
                status: ApplicationStatus::Discovered,
                last_updated: now,
                notes: vec![if opening.description.is_empty() {
                    "discovered via job board".to_string()
                } else {
                    format!("discovered via job board: {}", opening.description)
                }],
                compliance_tags: request.compliance_tags.clone(),
            };
            let key = record.key();
            if records.contains(&key) {
                report.already_tracked += 1;
                continue;
            }
            // Vacant key, so the upsert cannot be rejected by the state machine.
            if records.upsert(record).is_ok() {
                report.added.push(key);
            }
        }

        if !report.added.is_empty() {
            store.persist(&records)?;
        }

        info!(
            candidate = %request.candidate_id,
            added = report.added.len(),
            already_tracked = report.already_tracked,
            "job match ingest finished"
        );
        Ok(report)
    }
}
