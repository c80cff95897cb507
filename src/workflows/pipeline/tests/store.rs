use std::fs;

use super::common::*;
use crate::workflows::pipeline::domain::ApplicationStatus;
use crate::workflows::pipeline::store::{StateStore, StoreError, UpsertOutcome};

#[test]
fn load_of_missing_file_yields_empty_tracker() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = StateStore::new(dir.path().join("applications.json"));
    let records = store.load().expect("missing file loads empty");
    assert!(records.is_empty());
}

#[test]
fn persist_then_load_round_trips() {
    let (_dir, store) = seeded_store(vec![
        mgm_security_guard(ApplicationStatus::Submitted),
        record(
            "C2",
            "Sunrise Hospital",
            "Housekeeping",
            "https://jobs.sunrise.example/hk-1",
            ApplicationStatus::Discovered,
        ),
    ]);

    let records = store.load().expect("store loads");
    assert_eq!(records.len(), 2);
    let key = mgm_security_guard(ApplicationStatus::Submitted).key();
    assert_eq!(
        records.get(&key).expect("record present").status,
        ApplicationStatus::Submitted
    );
}

#[test]
fn unparseable_document_is_corrupt() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("applications.json");
    fs::write(&path, "{ not json").expect("write garbage");

    let store = StateStore::new(&path);
    match store.load() {
        Err(StoreError::Corrupt { .. }) => {}
        other => panic!("expected corrupt store, got {other:?}"),
    }
}

#[test]
fn duplicate_keys_in_document_are_corrupt() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("applications.json");
    let entry = serde_json::to_value(mgm_security_guard(ApplicationStatus::Submitted))
        .expect("record serializes");
    let doc = serde_json::json!({ "applications": [entry.clone(), entry] });
    fs::write(&path, doc.to_string()).expect("write document");

    let store = StateStore::new(&path);
    match store.load() {
        Err(StoreError::Corrupt { detail, .. }) => {
            assert!(detail.contains("duplicate"));
        }
        other => panic!("expected corrupt store, got {other:?}"),
    }
}

#[test]
fn persist_leaves_no_staging_residue() {
    let (dir, store) = seeded_store(vec![mgm_security_guard(ApplicationStatus::Drafted)]);
    store
        .persist(&store.load().expect("load"))
        .expect("second persist");

    let names: Vec<String> = fs::read_dir(dir.path())
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["applications.json".to_string()]);
}

#[test]
fn upsert_keeps_keys_unique() {
    let mut records = seeded_records(vec![mgm_security_guard(ApplicationStatus::Submitted)]);
    let outcome = records
        .upsert(mgm_security_guard(ApplicationStatus::Submitted))
        .expect("same-status upsert is accepted");
    assert_eq!(outcome, UpsertOutcome::Unchanged);
    assert_eq!(records.len(), 1);
}

#[test]
fn upsert_rejects_backward_transitions() {
    let mut records = seeded_records(vec![mgm_security_guard(ApplicationStatus::Scheduled)]);
    let err = records
        .upsert(mgm_security_guard(ApplicationStatus::Drafted))
        .expect_err("regression rejected");
    assert_eq!(err.from, ApplicationStatus::Scheduled);
    assert_eq!(err.to, ApplicationStatus::Drafted);
    let key = err.key;
    assert_eq!(
        records.get(&key).expect("record kept").status,
        ApplicationStatus::Scheduled
    );
}

#[test]
fn statuses_are_monotonic_across_upserts() {
    let order = [
        ApplicationStatus::Discovered,
        ApplicationStatus::Drafted,
        ApplicationStatus::Submitted,
        ApplicationStatus::AwaitingResponse,
        ApplicationStatus::InterviewRequested,
        ApplicationStatus::Scheduled,
    ];

    let mut records = seeded_records(vec![mgm_security_guard(ApplicationStatus::Discovered)]);
    let key = mgm_security_guard(ApplicationStatus::Discovered).key();
    let mut observed = vec![ApplicationStatus::Discovered];

    for status in order.into_iter().skip(1) {
        records
            .upsert(mgm_security_guard(status))
            .expect("forward transition accepted");
        observed.push(records.get(&key).expect("record present").status);
    }

    let mut sorted = observed.clone();
    sorted.sort();
    assert_eq!(observed, sorted, "status sequence must be non-decreasing");
}

#[test]
fn closed_is_reachable_from_any_state() {
    for status in [
        ApplicationStatus::Discovered,
        ApplicationStatus::Submitted,
        ApplicationStatus::Scheduled,
    ] {
        let mut records = seeded_records(vec![mgm_security_guard(status)]);
        let outcome = records
            .upsert(mgm_security_guard(ApplicationStatus::Closed))
            .expect("closing always succeeds");
        assert!(matches!(
            outcome,
            UpsertOutcome::Updated {
                to: ApplicationStatus::Closed,
                ..
            }
        ));
    }
}

#[test]
fn advance_appends_audit_note() {
    let mut records = seeded_records(vec![mgm_security_guard(ApplicationStatus::Submitted)]);
    let key = mgm_security_guard(ApplicationStatus::Submitted).key();
    let at = stamp(2025, 9, 10, 14);

    records
        .advance(&key, ApplicationStatus::AwaitingResponse, "receipt confirmed", at)
        .expect("forward advance");

    let record = records.get(&key).expect("record present");
    assert_eq!(record.status, ApplicationStatus::AwaitingResponse);
    assert_eq!(record.last_updated, at);
    assert_eq!(record.notes, vec!["receipt confirmed".to_string()]);
}

#[test]
fn advance_to_current_status_changes_nothing() {
    let mut records = seeded_records(vec![mgm_security_guard(ApplicationStatus::Submitted)]);
    let key = mgm_security_guard(ApplicationStatus::Submitted).key();
    let before = records.get(&key).expect("record present").clone();

    let outcome = records
        .advance(&key, ApplicationStatus::Submitted, "noop", stamp(2025, 9, 10, 14))
        .expect("equal status accepted");
    assert_eq!(outcome, UpsertOutcome::Unchanged);
    assert_eq!(records.get(&key).expect("record present"), &before);
}

#[test]
fn lock_is_exclusive_and_released_on_drop() {
    let (_dir, store) = seeded_store(vec![mgm_security_guard(ApplicationStatus::Submitted)]);

    let guard = store.lock().expect("first lock succeeds");
    match store.lock() {
        Err(StoreError::Locked(_)) => {}
        other => panic!("expected lock contention, got {other:?}"),
    }

    drop(guard);
    store.lock().expect("lock reacquired after release");
}

#[test]
fn candidate_company_pairs_are_distinct() {
    let records = seeded_records(vec![
        mgm_security_guard(ApplicationStatus::Submitted),
        record(
            "C1",
            "MGM",
            "Valet",
            "https://careers.mgm.example/valet",
            ApplicationStatus::Discovered,
        ),
        record(
            "C2",
            "Sunrise Hospital",
            "Housekeeping",
            "https://jobs.sunrise.example/hk-1",
            ApplicationStatus::Submitted,
        ),
    ]);

    let pairs = records.candidate_company_pairs();
    assert_eq!(pairs.len(), 2);
    assert!(pairs.iter().any(|(c, co)| c.0 == "C1" && co == "MGM"));
    assert!(pairs.iter().any(|(c, co)| c.0 == "C2" && co == "Sunrise Hospital"));
}
