use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::classify::{classify, ClassificationResult, MessageKind};
use super::domain::{ApplicationStatus, CandidateId, MessageEvent};
use super::sources::{MailSource, SourceError};
use super::store::{InvalidTransition, StateStore, StoreError, UpsertOutcome};

/// Failures that abort a reconciliation pass. Either way the store file is left
/// untouched: the single persist call only happens after every fetch and
/// classification has succeeded.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Mail(#[from] SourceError),
}

/// A status change applied during a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    pub candidate_id: CandidateId,
    pub company: String,
    pub role: String,
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
}

/// A proposed change rejected by the state machine; reported, never fatal.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedUpdate {
    pub candidate_id: CandidateId,
    pub company: String,
    pub role: String,
    pub from: ApplicationStatus,
    pub requested: ApplicationStatus,
    pub reason: String,
}

/// A message that could not be resolved to exactly one tracked application.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedMessage {
    pub candidate_id: CandidateId,
    pub sender: String,
    pub subject: String,
    pub kind: MessageKind,
}

/// Report for one reconciliation pass, suitable for terminal or log display.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub interview_requests: usize,
    pub schedule_requests: usize,
    pub receipts: usize,
    pub other: usize,
    pub applied: Vec<AppliedUpdate>,
    pub skipped: Vec<SkippedUpdate>,
    pub unmatched: Vec<UnmatchedMessage>,
}

impl RunSummary {
    fn count(&mut self, kind: MessageKind) {
        match kind {
            MessageKind::InterviewRequest => self.interview_requests += 1,
            MessageKind::ScheduleRequest => self.schedule_requests += 1,
            MessageKind::ApplicationReceived => self.receipts += 1,
            MessageKind::Other => self.other += 1,
        }
    }

    pub fn messages_seen(&self) -> usize {
        self.interview_requests + self.schedule_requests + self.receipts + self.other
    }

    /// True when the pass changed nothing and rejected nothing.
    pub fn is_quiet(&self) -> bool {
        self.applied.is_empty() && self.skipped.is_empty()
    }
}

/// Runs one reconciliation pass: lock, load, fetch per candidate/company pair,
/// classify, stage merges on a copy, persist once, summarize.
pub struct ReconciliationEngine<M> {
    store: StateStore,
    mail: Arc<M>,
    timeout: Duration,
}

impl<M> ReconciliationEngine<M>
where
    M: MailSource,
{
    pub fn new(store: StateStore, mail: Arc<M>, timeout: Duration) -> Self {
        Self {
            store,
            mail,
            timeout,
        }
    }

    pub fn run(&self, since: DateTime<Utc>) -> Result<RunSummary, ReconcileError> {
        let _lock = self.store.lock()?;
        let records = self.store.load()?;

        // Fetch everything before staging anything. A failure for any pair aborts
        // the whole pass; partial reconciliation across candidates is not allowed.
        // A sender mentioning two tracked companies ("MGM", "MGM Grand") returns
        // the same message for both pairs, so duplicates are dropped here.
        let mut inbox: Vec<MessageEvent> = Vec::new();
        for (candidate, company) in records.candidate_company_pairs() {
            let batch = self
                .mail
                .fetch_messages(&candidate, &company, since, self.timeout)?;
            for event in batch {
                if !inbox.contains(&event) {
                    inbox.push(event);
                }
            }
        }

        let classified: Vec<(MessageEvent, ClassificationResult)> = inbox
            .into_iter()
            .map(|event| {
                let result = classify(&event, &records);
                (event, result)
            })
            .collect();

        let mut staged = records.clone();
        let mut summary = RunSummary::default();

        for (event, result) in classified {
            summary.count(result.kind);

            let Some(key) = result.matched else {
                summary.unmatched.push(UnmatchedMessage {
                    candidate_id: event.candidate_id,
                    sender: event.sender,
                    subject: event.subject,
                    kind: result.kind,
                });
                continue;
            };

            let Some(target) = target_status(result.kind) else {
                // `other` mail never changes status; it only leaves an audit note.
                staged.annotate(
                    &key,
                    format!("note from {}: {}", event.sender, event.subject),
                    event.received_at,
                );
                continue;
            };
            let note = format!(
                "{} via message from {}: {}",
                target.label(),
                event.sender,
                event.subject
            );
            match staged.advance(&key, target, note, event.received_at) {
                Ok(UpsertOutcome::Updated { from, to }) => summary.applied.push(AppliedUpdate {
                    candidate_id: key.candidate_id,
                    company: key.company,
                    role: key.role,
                    from,
                    to,
                }),
                Ok(_) => {}
                Err(InvalidTransition { key, from, to }) => {
                    warn!(
                        candidate = %key.candidate_id,
                        company = %key.company,
                        from = from.label(),
                        requested = to.label(),
                        "skipping transition rejected by the state machine"
                    );
                    summary.skipped.push(SkippedUpdate {
                        candidate_id: key.candidate_id,
                        company: key.company,
                        role: key.role,
                        from,
                        requested: to,
                        reason: format!("{from} does not accept {to}"),
                    });
                }
            }
        }

        self.store.persist(&staged)?;
        info!(
            messages = summary.messages_seen(),
            applied = summary.applied.len(),
            skipped = summary.skipped.len(),
            unmatched = summary.unmatched.len(),
            "reconciliation pass persisted"
        );

        Ok(summary)
    }
}

fn target_status(kind: MessageKind) -> Option<ApplicationStatus> {
    match kind {
        MessageKind::InterviewRequest => Some(ApplicationStatus::InterviewRequested),
        MessageKind::ScheduleRequest => Some(ApplicationStatus::Scheduled),
        MessageKind::ApplicationReceived => Some(ApplicationStatus::AwaitingResponse),
        MessageKind::Other => None,
    }
}
