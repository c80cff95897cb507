use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for managed candidates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub String);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identity of one application attempt. No two tracked records may share a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationKey {
    pub candidate_id: CandidateId,
    pub company: String,
    pub role: String,
    pub application_link: String,
}

/// Lifecycle of an application attempt. The derive order is the lifecycle order, so
/// `Ord` comparisons answer "is this transition forward?" directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Discovered,
    Drafted,
    Submitted,
    AwaitingResponse,
    InterviewRequested,
    Scheduled,
    Closed,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Discovered => "discovered",
            ApplicationStatus::Drafted => "drafted",
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::AwaitingResponse => "awaiting_response",
            ApplicationStatus::InterviewRequested => "interview_requested",
            ApplicationStatus::Scheduled => "scheduled",
            ApplicationStatus::Closed => "closed",
        }
    }

    /// Whether a record currently in this status may move to `next`.
    /// `Closed` is terminal and reachable from every state; everything else
    /// may only hold or move forward.
    pub fn accepts(self, next: ApplicationStatus) -> bool {
        next == ApplicationStatus::Closed || next >= self
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One tracked application attempt. Owned exclusively by the tracker store;
/// collaborators only ever see clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub candidate_id: CandidateId,
    pub role: String,
    pub company: String,
    pub application_link: String,
    pub date_submitted: Option<NaiveDate>,
    pub status: ApplicationStatus,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Opaque compliance markers (e.g. PILB licensing tags). Never interpreted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compliance_tags: Vec<String>,
}

impl ApplicationRecord {
    pub fn key(&self) -> ApplicationKey {
        ApplicationKey {
            candidate_id: self.candidate_id.clone(),
            company: self.company.clone(),
            role: self.role.clone(),
            application_link: self.application_link.clone(),
        }
    }

    pub fn push_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Inbound mail snapshot consumed during one reconciliation pass and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub candidate_id: CandidateId,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}
