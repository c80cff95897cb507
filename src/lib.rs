//! Recruitment-pipeline tracker: a persisted application state store reconciled
//! against inbox activity through a keyword classifier.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
