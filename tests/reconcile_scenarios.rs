// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! End-to-end reconcile scenarios through the public API.
//!
//! Collaborators and the zone writer are in-memory fakes; no network is used.

mod common;

use common::{map, RecordingWriter, StaticSource};
use vm_dns_sync::batch::plan_batches;
use vm_dns_sync::cycle::run_cycle;
use vm_dns_sync::errors::SyncError;
use vm_dns_sync::model::{ChangeAction, Decision, PendingChange, Provenance};
use vm_dns_sync::sync::{SyncSettings, ZoneSynchronizer};
use vm_dns_sync::triage::triage;

fn apply_settings() -> SyncSettings {
    SyncSettings {
        dry_run: false,
        ..SyncSettings::default()
    }
}

fn synchronizer() -> ZoneSynchronizer {
    ZoneSynchronizer::new(apply_settings()).unwrap()
}

/// One VM `vm-<host>` per live entry, bound to `http://<host>.example.com`.
fn source(zone: &[(&str, &str)], live: &[(&str, &str)]) -> StaticSource {
    let host = |h: &str| format!("http://{h}.example.com");

    StaticSource {
        zone: zone.iter().map(|(h, ip)| (host(h), (*ip).to_string())).collect(),
        live: live
            .iter()
            .map(|(h, ip)| (format!("vm-{h}"), (*ip).to_string()))
            .collect(),
        registry: live
            .iter()
            .map(|(h, _)| (host(h), format!("vm-{h}")))
            .collect(),
    }
}

async fn cycle(source: &StaticSource, writer: &RecordingWriter) -> Result<usize, SyncError> {
    run_cycle(source, source, source, writer, &synchronizer())
        .await
        .map(|report| report.changes)
}

fn change(name: &str, action: ChangeAction, ip: &str) -> PendingChange {
    PendingChange {
        name: name.to_string(),
        action,
        ip: ip.to_string(),
    }
}

#[tokio::test]
async fn scenario_a_matching_record_needs_nothing() {
    let source = source(&[("a", "1.1.1.1")], &[("a", "1.1.1.1")]);

    let summaries = triage(&source.live, &source.zone, &source.registry);
    assert_eq!(summaries["http://a.example.com"].decision, Decision::NoChange);

    let writer = RecordingWriter::default();
    assert_eq!(cycle(&source, &writer).await, Err(SyncError::NoPendingChanges));
    assert!(writer.calls().is_empty());
}

#[tokio::test]
async fn scenario_b_changed_address_is_upserted() {
    let source = source(&[("a", "1.1.1.1")], &[("a", "2.2.2.2")]);

    let summaries = triage(&source.live, &source.zone, &source.registry);
    assert_eq!(summaries["http://a.example.com"].decision, Decision::Update);

    let writer = RecordingWriter::default();
    assert_eq!(cycle(&source, &writer).await, Ok(1));
    assert_eq!(
        writer.calls(),
        vec![vec![change("a.example.com", ChangeAction::Upsert, "2.2.2.2")]]
    );
}

#[tokio::test]
async fn scenario_c_new_vm_is_added() {
    let source = source(&[], &[("b", "3.3.3.3")]);

    let summaries = triage(&source.live, &source.zone, &source.registry);
    let summary = &summaries["http://b.example.com"];
    assert_eq!(summary.provenance, Provenance::LiveOnly);
    assert_eq!(summary.decision, Decision::Add);

    let writer = RecordingWriter::default();
    assert_eq!(cycle(&source, &writer).await, Ok(1));
    assert_eq!(
        writer.calls(),
        vec![vec![change("b.example.com", ChangeAction::Upsert, "3.3.3.3")]]
    );
}

#[tokio::test]
async fn scenario_d_gone_vm_is_deleted() {
    let source = source(&[("c", "4.4.4.4")], &[]);

    let summaries = triage(&source.live, &source.zone, &source.registry);
    let summary = &summaries["http://c.example.com"];
    assert_eq!(summary.provenance, Provenance::ZoneOnly);
    assert_eq!(summary.decision, Decision::Delete);

    let writer = RecordingWriter::default();
    assert_eq!(cycle(&source, &writer).await, Ok(1));
    assert_eq!(
        writer.calls(),
        vec![vec![change("c.example.com", ChangeAction::Delete, "4.4.4.4")]]
    );
}

#[tokio::test]
async fn scenario_e_ipv6_live_address_deletes_old_record() {
    let source = source(&[("d", "4.4.4.4")], &[("d", "fe80::1")]);

    let summaries = triage(&source.live, &source.zone, &source.registry);
    let summary = &summaries["http://d.example.com"];
    assert_eq!(summary.provenance, Provenance::Both);
    assert_eq!(summary.decision, Decision::Delete);

    let writer = RecordingWriter::default();
    assert_eq!(cycle(&source, &writer).await, Ok(1));
    assert_eq!(
        writer.calls(),
        vec![vec![change("d.example.com", ChangeAction::Delete, "4.4.4.4")]]
    );
}

#[test]
fn scenario_f_hundred_changes_in_batches_of_thirteen() {
    let ranges = plan_batches(100, 13).unwrap();

    assert_eq!(ranges.len(), 8);
    assert_eq!(ranges.last().map(ExactSizeIterator::len), Some(9));
}

#[tokio::test]
async fn scenario_f_hundred_changes_reach_the_writer_in_order() {
    let live: Vec<(String, String)> = (0..100)
        .map(|i| (format!("h{i:03}"), format!("10.0.{}.{}", i / 256, i % 256)))
        .collect();
    let live_refs: Vec<(&str, &str)> = live.iter().map(|(h, ip)| (h.as_str(), ip.as_str())).collect();
    let source = source(&[], &live_refs);

    let settings = SyncSettings {
        batch_size: 13,
        ..apply_settings()
    };
    let writer = RecordingWriter::default();

    let report = run_cycle(
        &source,
        &source,
        &source,
        &writer,
        &ZoneSynchronizer::new(settings).unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(report.changes, 100);
    assert_eq!(report.batches, 8);

    let calls = writer.calls();
    let sizes: Vec<usize> = calls.iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![13, 13, 13, 13, 13, 13, 13, 9]);

    let names: Vec<String> = calls.into_iter().flatten().map(|c| c.name).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[tokio::test]
async fn failed_batches_do_not_stop_the_rest() {
    let live: Vec<(String, String)> = (0..10)
        .map(|i| (format!("h{i}"), format!("10.0.0.{i}")))
        .collect();
    let live_refs: Vec<(&str, &str)> = live.iter().map(|(h, ip)| (h.as_str(), ip.as_str())).collect();
    let source = source(&[], &live_refs);

    let settings = SyncSettings {
        batch_size: 3,
        ..apply_settings()
    };
    let writer = RecordingWriter::failing(vec![0, 2]);

    let err = run_cycle(
        &source,
        &source,
        &source,
        &writer,
        &ZoneSynchronizer::new(settings).unwrap(),
    )
    .await
    .unwrap_err();

    assert_eq!(err, SyncError::PartialApplyFailure { failed: 2, total: 4 });
    assert_eq!(writer.calls().len(), 4);
}

#[tokio::test]
async fn dry_run_reports_the_withheld_change_set() {
    let source = source(&[("gone", "4.4.4.4")], &[("new", "3.3.3.3")]);
    let writer = RecordingWriter::default();

    let err = run_cycle(
        &source,
        &source,
        &source,
        &writer,
        &ZoneSynchronizer::new(SyncSettings::default()).unwrap(),
    )
    .await
    .unwrap_err();

    assert_eq!(err, SyncError::DryRun { pending: 2 });
    assert!(writer.calls().is_empty());
}

#[tokio::test]
async fn oversized_label_is_skipped_not_written() {
    let long = "x".repeat(64);
    let source = source(&[], &[(long.as_str(), "5.5.5.5"), ("ok", "6.6.6.6")]);
    let writer = RecordingWriter::default();

    assert_eq!(cycle(&source, &writer).await, Ok(1));
    assert_eq!(
        writer.calls(),
        vec![vec![change("ok.example.com", ChangeAction::Upsert, "6.6.6.6")]]
    );
}

#[tokio::test]
async fn unbound_vm_is_ignored() {
    let mut source = source(&[], &[]);
    source.live = map(&[("orphan-vm", "7.7.7.7")]);
    let writer = RecordingWriter::default();

    assert_eq!(cycle(&source, &writer).await, Err(SyncError::NoPendingChanges));
}
