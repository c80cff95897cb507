use serde::Serialize;
use tracing::warn;

use super::domain::{ApplicationKey, MessageEvent};
use super::store::RecordSet;

/// Message categories, listed in classification priority order. A message that
/// mentions both an interview and scheduling is an interview request; that is the
/// strictly higher-value signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    InterviewRequest,
    ScheduleRequest,
    ApplicationReceived,
    Other,
}

impl MessageKind {
    pub const fn label(self) -> &'static str {
        match self {
            MessageKind::InterviewRequest => "interview_request",
            MessageKind::ScheduleRequest => "schedule_request",
            MessageKind::ApplicationReceived => "application_received",
            MessageKind::Other => "other",
        }
    }
}

/// Outcome of classifying one message against the current record set.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub kind: MessageKind,
    /// The tracked application this message concerns, when exactly one resolves.
    pub matched: Option<ApplicationKey>,
}

/// A bare "received" only counts as an application receipt alongside one of these.
const RECEIPT_CONTEXT_TOKENS: &[&str] =
    &["application", "applying", "candidacy", "resume", "submission"];

/// Classify one inbound message. Purely functional: the caller decides whether and
/// how to apply the result.
pub fn classify(event: &MessageEvent, records: &RecordSet) -> ClassificationResult {
    let haystack = format!("{}\n{}", event.subject, event.body).to_lowercase();
    let kind = kind_for(&haystack);
    let matched = resolve_match(event, records);

    if matched.is_none() {
        warn!(
            candidate = %event.candidate_id,
            sender = %event.sender,
            kind = kind.label(),
            "message did not resolve to exactly one tracked application"
        );
    }

    ClassificationResult { kind, matched }
}

fn kind_for(haystack: &str) -> MessageKind {
    if haystack.contains("interview") {
        MessageKind::InterviewRequest
    } else if haystack.contains("schedule") {
        MessageKind::ScheduleRequest
    } else if haystack.contains("application received")
        || (haystack.contains("received")
            && RECEIPT_CONTEXT_TOKENS
                .iter()
                .any(|token| haystack.contains(token)))
    {
        MessageKind::ApplicationReceived
    } else {
        MessageKind::Other
    }
}

/// Resolve the sender against the candidate's tracked companies. Zero hits or an
/// ambiguous sender (several distinct applications match) resolve to `None`; the
/// engine reports those rather than guessing.
fn resolve_match(event: &MessageEvent, records: &RecordSet) -> Option<ApplicationKey> {
    let sender = event.sender.to_lowercase();
    let mut hits = records
        .records_for(&event.candidate_id)
        .into_iter()
        .filter(|record| company_matches(&sender, &record.company));

    let first = hits.next()?;
    if hits.next().is_some() {
        return None;
    }
    Some(first.key())
}

/// Leading words too generic to identify a company on their own. Without this,
/// "The Venetian" would claim every sender containing "the".
const GENERIC_LEADING_WORDS: &[&str] = &["the", "las", "new", "grand", "hotel", "resort"];

/// Whether a lowercased sender address or display name mentions the company.
/// Checks the full name, a whitespace-stripped form ("mgm resorts" ->
/// "mgmresorts"), and the leading word for multi-word names. The leading word
/// must appear as a whole token in the sender ("mgm" in "recruiting@mgm.example"
/// but not in "mgmt@example"), so unrelated senders never claim a record.
pub(crate) fn company_matches(sender_lowercase: &str, company: &str) -> bool {
    let name = company.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    if sender_lowercase.contains(&name) {
        return true;
    }
    let compact: String = name.split_whitespace().collect();
    if compact != name && sender_lowercase.contains(&compact) {
        return true;
    }
    match name.split_whitespace().next() {
        Some(first)
            if first.len() >= 3 && first != name && !GENERIC_LEADING_WORDS.contains(&first) =>
        {
            sender_lowercase
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| token == first)
        }
        _ => false,
    }
}
