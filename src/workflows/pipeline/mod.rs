//! Application pipeline tracking: the durable tracker store, the keyword
//! classifier, the inbox reconciliation engine, and job-match ingestion.

pub mod classify;
pub mod domain;
pub mod ingest;
pub mod reconcile;
pub mod sources;
pub mod store;

#[cfg(test)]
mod tests;

pub use classify::{classify, ClassificationResult, MessageKind};
pub use domain::{
    ApplicationKey, ApplicationRecord, ApplicationStatus, CandidateId, MessageEvent,
};
pub use ingest::{IngestError, IngestReport, IngestRequest, JobMatchIngestor};
pub use reconcile::{
    AppliedUpdate, ReconcileError, ReconciliationEngine, RunSummary, SkippedUpdate,
    UnmatchedMessage,
};
pub use sources::{JobBoard, JobOpening, MailDropFile, MailSource, OpeningsCsvFile, SourceError};
pub use store::{InvalidTransition, RecordSet, StateStore, StoreError, StoreLock, UpsertOutcome};
