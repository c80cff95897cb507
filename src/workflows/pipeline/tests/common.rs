use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::workflows::pipeline::domain::{
    ApplicationRecord, ApplicationStatus, CandidateId, MessageEvent,
};
use crate::workflows::pipeline::sources::{
    JobBoard, JobOpening, MailSource, SourceError,
};
use crate::workflows::pipeline::store::{RecordSet, StateStore};

pub(super) const SOURCE_TIMEOUT: Duration = Duration::from_secs(5);

pub(super) fn stamp(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn record(
    candidate: &str,
    company: &str,
    role: &str,
    link: &str,
    status: ApplicationStatus,
) -> ApplicationRecord {
    ApplicationRecord {
        candidate_id: CandidateId(candidate.to_string()),
        role: role.to_string(),
        company: company.to_string(),
        application_link: link.to_string(),
        date_submitted: match status {
            ApplicationStatus::Discovered | ApplicationStatus::Drafted => None,
            _ => NaiveDate::from_ymd_opt(2025, 9, 1),
        },
        status,
        last_updated: stamp(2025, 9, 1, 9),
        notes: Vec::new(),
        compliance_tags: Vec::new(),
    }
}

pub(super) fn mgm_security_guard(status: ApplicationStatus) -> ApplicationRecord {
    record(
        "C1",
        "MGM",
        "Security Guard",
        "https://careers.mgm.example/security-guard",
        status,
    )
}

pub(super) fn seeded_records(records: Vec<ApplicationRecord>) -> RecordSet {
    let mut set = RecordSet::default();
    for record in records {
        set.upsert(record).expect("seed records are unique");
    }
    set
}

pub(super) fn seeded_store(records: Vec<ApplicationRecord>) -> (tempfile::TempDir, StateStore) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = StateStore::new(dir.path().join("applications.json"));
    store
        .persist(&seeded_records(records))
        .expect("seed store persists");
    (dir, store)
}

pub(super) fn message(
    candidate: &str,
    sender: &str,
    subject: &str,
    body: &str,
    received_at: DateTime<Utc>,
) -> MessageEvent {
    MessageEvent {
        candidate_id: CandidateId(candidate.to_string()),
        sender: sender.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        received_at,
    }
}

/// Mail double scripted per `(candidate, company)` pair. Pairs with no script
/// return an empty batch; pairs marked failing return `Unavailable`.
#[derive(Default)]
pub(super) struct ScriptedMail {
    batches: Mutex<HashMap<(String, String), Vec<MessageEvent>>>,
    failing: Mutex<Vec<(String, String)>>,
}

impl ScriptedMail {
    pub(super) fn deliver(&self, candidate: &str, company: &str, events: Vec<MessageEvent>) {
        self.batches
            .lock()
            .expect("mail mutex poisoned")
            .insert((candidate.to_string(), company.to_string()), events);
    }

    pub(super) fn fail_for(&self, candidate: &str, company: &str) {
        self.failing
            .lock()
            .expect("mail mutex poisoned")
            .push((candidate.to_string(), company.to_string()));
    }

    pub(super) fn clear(&self) {
        self.batches.lock().expect("mail mutex poisoned").clear();
        self.failing.lock().expect("mail mutex poisoned").clear();
    }
}

impl MailSource for ScriptedMail {
    fn fetch_messages(
        &self,
        candidate: &CandidateId,
        company: &str,
        _since: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<Vec<MessageEvent>, SourceError> {
        let pair = (candidate.0.clone(), company.to_string());
        if self
            .failing
            .lock()
            .expect("mail mutex poisoned")
            .contains(&pair)
        {
            return Err(SourceError::TimedOut { timeout });
        }
        Ok(self
            .batches
            .lock()
            .expect("mail mutex poisoned")
            .get(&pair)
            .cloned()
            .unwrap_or_default())
    }
}

/// Job board double returning a fixed set of openings.
pub(super) struct StaticBoard {
    openings: Vec<JobOpening>,
}

impl StaticBoard {
    pub(super) fn new(openings: Vec<JobOpening>) -> Self {
        Self { openings }
    }
}

impl JobBoard for StaticBoard {
    fn find_openings(
        &self,
        _role: &str,
        _location: &str,
        _companies: &[String],
        _timeout: Duration,
    ) -> Result<Vec<JobOpening>, SourceError> {
        Ok(self.openings.clone())
    }
}

/// Job board double that is always unreachable.
pub(super) struct OfflineBoard;

impl JobBoard for OfflineBoard {
    fn find_openings(
        &self,
        _role: &str,
        _location: &str,
        _companies: &[String],
        _timeout: Duration,
    ) -> Result<Vec<JobOpening>, SourceError> {
        Err(SourceError::Unavailable("job board offline".to_string()))
    }
}

pub(super) fn opening(role: &str, company: &str, link: &str, description: &str) -> JobOpening {
    JobOpening {
        role: role.to_string(),
        company: company.to_string(),
        link: link.to_string(),
        location: None,
        description: description.to_string(),
    }
}

pub(super) fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
