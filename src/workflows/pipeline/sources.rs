use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use super::classify::company_matches;
use super::domain::{CandidateId, MessageEvent};

/// Collaborator failures. Both variants abort a reconciliation pass; retries, if
/// any, belong to the collaborator implementations themselves.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("collaborator unreachable: {0}")]
    Unavailable(String),
    #[error("collaborator call timed out after {timeout:?}")]
    TimedOut { timeout: Duration },
}

/// Narrow seam to the mail provider. Implementations must honor the supplied
/// timeout; the engine never waits indefinitely.
pub trait MailSource {
    fn fetch_messages(
        &self,
        candidate: &CandidateId,
        company: &str,
        since: DateTime<Utc>,
        timeout: Duration,
    ) -> Result<Vec<MessageEvent>, SourceError>;
}

/// One opening returned by the job-discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JobOpening {
    #[serde(rename = "Role", alias = "role")]
    pub role: String,
    #[serde(rename = "Company", alias = "company")]
    pub company: String,
    #[serde(rename = "Link", alias = "link")]
    pub link: String,
    #[serde(
        rename = "Location",
        alias = "location",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub location: Option<String>,
    #[serde(rename = "Description", alias = "description", default)]
    pub description: String,
}

/// Narrow seam to the job-discovery collaborator.
pub trait JobBoard {
    fn find_openings(
        &self,
        role: &str,
        location: &str,
        companies: &[String],
        timeout: Duration,
    ) -> Result<Vec<JobOpening>, SourceError>;
}

/// Mail adapter backed by a local JSON drop file: an array of `MessageEvent`
/// objects written by the (external) mail connector. Filters by candidate, company
/// mention, and receipt time.
#[derive(Debug, Clone)]
pub struct MailDropFile {
    path: PathBuf,
}

impl MailDropFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MailSource for MailDropFile {
    fn fetch_messages(
        &self,
        candidate: &CandidateId,
        company: &str,
        since: DateTime<Utc>,
        _timeout: Duration,
    ) -> Result<Vec<MessageEvent>, SourceError> {
        let raw = fs::read_to_string(&self.path).map_err(|err| {
            SourceError::Unavailable(format!("maildrop {}: {err}", self.path.display()))
        })?;
        let events: Vec<MessageEvent> = serde_json::from_str(&raw).map_err(|err| {
            SourceError::Unavailable(format!("maildrop {}: {err}", self.path.display()))
        })?;

        Ok(events
            .into_iter()
            .filter(|event| {
                &event.candidate_id == candidate
                    && event.received_at > since
                    && company_matches(&event.sender.to_lowercase(), company)
            })
            .collect())
    }
}

/// Job-discovery adapter backed by a CSV export with `Role, Company, Link,
/// Location, Description` headers.
#[derive(Debug, Clone)]
pub struct OpeningsCsvFile {
    path: PathBuf,
}

impl OpeningsCsvFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl JobBoard for OpeningsCsvFile {
    fn find_openings(
        &self,
        role: &str,
        location: &str,
        companies: &[String],
        _timeout: Duration,
    ) -> Result<Vec<JobOpening>, SourceError> {
        let file = fs::File::open(&self.path).map_err(|err| {
            SourceError::Unavailable(format!("openings export {}: {err}", self.path.display()))
        })?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(file);

        let role_filter = role.trim().to_lowercase();
        let location_filter = location.trim().to_lowercase();
        let company_filter: Vec<String> = companies
            .iter()
            .map(|company| company.trim().to_lowercase())
            .filter(|company| !company.is_empty())
            .collect();

        let mut openings = Vec::new();
        for row in reader.deserialize::<JobOpening>() {
            let opening = row.map_err(|err| {
                SourceError::Unavailable(format!("openings export {}: {err}", self.path.display()))
            })?;
            if !role_filter.is_empty() && !opening.role.to_lowercase().contains(&role_filter) {
                continue;
            }
            if !location_filter.is_empty() {
                let listed = opening
                    .location
                    .as_deref()
                    .unwrap_or_default()
                    .to_lowercase();
                if !listed.contains(&location_filter) {
                    continue;
                }
            }
            if !company_filter.is_empty()
                && !company_filter.contains(&opening.company.to_lowercase())
            {
                continue;
            }
            openings.push(opening);
        }

        Ok(openings)
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
