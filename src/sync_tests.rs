// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `sync.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::model::{ChangeAction, Provenance, TriageSummary};
    use std::sync::Mutex;

    /// Writer recording every batch, failing the batches listed in `fail_on`.
    #[derive(Default)]
    struct RecordingWriter {
        batches: Mutex<Vec<Vec<PendingChange>>>,
        fail_on: Vec<usize>,
    }

    impl RecordingWriter {
        fn failing(fail_on: Vec<usize>) -> Self {
            Self {
                fail_on,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<Vec<PendingChange>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ZoneWriter for RecordingWriter {
        async fn apply_batch(
            &self,
            batch: &[PendingChange],
            _ttl: u32,
        ) -> Result<(), ZoneWriteError> {
            let mut batches = self.batches.lock().unwrap();
            let index = batches.len();
            batches.push(batch.to_vec());
            if self.fail_on.contains(&index) {
                return Err(ZoneWriteError::UpdateRejected {
                    zone: "example.com".to_string(),
                    server: "127.0.0.1:53".to_string(),
                    code: "Refused".to_string(),
                });
            }
            Ok(())
        }
    }

    fn summary(host: &str, zone_ip: &str, live_ip: &str, decision: Decision) -> TriageSummary {
        let provenance = match (zone_ip.is_empty(), live_ip.is_empty()) {
            (false, true) => Provenance::ZoneOnly,
            (true, false) => Provenance::LiveOnly,
            _ => Provenance::Both,
        };
        TriageSummary {
            hostname: host.to_string(),
            zone_ip: zone_ip.to_string(),
            live_ip: live_ip.to_string(),
            provenance,
            decision,
        }
    }

    fn summaries(entries: Vec<TriageSummary>) -> TriageMap {
        entries
            .into_iter()
            .map(|s| (s.hostname.clone(), s))
            .collect()
    }

    fn live_settings(batch_size: usize) -> SyncSettings {
        SyncSettings {
            batch_size,
            dry_run: false,
            ..SyncSettings::default()
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.batch_size, 25);
        assert!(settings.dry_run);
        assert_eq!(settings.record_ttl, 60);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = ZoneSynchronizer::new(live_settings(0));
        assert!(matches!(result, Err(SyncError::InvalidBatchSize(0))));
    }

    #[test]
    fn test_pending_changes_mapping() {
        let input = summaries(vec![
            summary("http://a.example.com", "", "1.1.1.1", Decision::Add),
            summary("http://b.example.com.", "2.2.2.2", "3.3.3.3", Decision::Update),
            summary("http://c.example.com", "4.4.4.4", "", Decision::Delete),
            summary("http://d.example.com", "5.5.5.5", "5.5.5.5", Decision::NoChange),
        ]);

        let changes = ZoneSynchronizer::pending_changes(&input, 63);

        assert_eq!(
            changes,
            vec![
                PendingChange {
                    name: "a.example.com".to_string(),
                    action: ChangeAction::Upsert,
                    ip: "1.1.1.1".to_string(),
                },
                PendingChange {
                    name: "b.example.com".to_string(),
                    action: ChangeAction::Upsert,
                    ip: "3.3.3.3".to_string(),
                },
                PendingChange {
                    name: "c.example.com".to_string(),
                    action: ChangeAction::Delete,
                    ip: "4.4.4.4".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_oversized_label_is_skipped() {
        let long = format!("http://{}.example.com", "x".repeat(64));
        let just_fits = format!("http://{}.example.com", "y".repeat(63));
        let input = summaries(vec![
            summary(&long, "", "1.1.1.1", Decision::Add),
            summary(&just_fits, "", "1.1.1.2", Decision::Add),
        ]);

        let changes = ZoneSynchronizer::pending_changes(&input, 63);

        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].ip, "1.1.1.2");
    }

    #[tokio::test]
    async fn test_empty_input_reports_no_pending_changes() {
        let sync = ZoneSynchronizer::new(live_settings(25)).unwrap();
        let writer = RecordingWriter::default();

        let result = sync.sync(&TriageMap::new(), &writer).await;

        assert_eq!(result, Err(SyncError::NoPendingChanges));
        assert!(writer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_only_no_change_reports_no_pending_changes() {
        let sync = ZoneSynchronizer::new(live_settings(25)).unwrap();
        let writer = RecordingWriter::default();
        let input = summaries(vec![
            summary("sample-domain-1", "1.1.1.1", "1.1.1.1", Decision::NoChange),
            summary("sample-domain-2", "2.2.2.2", "2.2.2.2", Decision::NoChange),
        ]);

        let result = sync.sync(&input, &writer).await;

        assert_eq!(result, Err(SyncError::NoPendingChanges));
        assert!(writer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_only_oversized_reports_no_pending_changes() {
        let sync = ZoneSynchronizer::new(live_settings(25)).unwrap();
        let writer = RecordingWriter::default();
        let host = format!("http://{}.example.com", "z".repeat(70));
        let input = summaries(vec![summary(&host, "", "1.1.1.1", Decision::Add)]);

        let result = sync.sync(&input, &writer).await;

        assert_eq!(result, Err(SyncError::NoPendingChanges));
    }

    #[tokio::test]
    async fn test_dry_run_withholds_writes() {
        let sync = ZoneSynchronizer::new(SyncSettings::default()).unwrap();
        let writer = RecordingWriter::default();
        let input = summaries(vec![
            summary("sample-domain-1", "1.1.1.1", "2.2.2.2", Decision::Update),
            summary("sample-domain-2", "3.3.3.3", "", Decision::Delete),
        ]);

        let result = sync.sync(&input, &writer).await;

        assert_eq!(result, Err(SyncError::DryRun { pending: 2 }));
        assert!(writer.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_with_nothing_to_do_reports_no_pending_changes() {
        let sync = ZoneSynchronizer::new(SyncSettings::default()).unwrap();
        let writer = RecordingWriter::default();

        let result = sync.sync(&TriageMap::new(), &writer).await;

        assert_eq!(result, Err(SyncError::NoPendingChanges));
    }

    #[tokio::test]
    async fn test_successful_apply() {
        let sync = ZoneSynchronizer::new(live_settings(25)).unwrap();
        let writer = RecordingWriter::default();
        let input = summaries(vec![
            summary("sample-domain-1", "1.1.1.1", "2.2.2.2", Decision::Update),
            summary("sample-domain-2", "3.3.3.3", "", Decision::Delete),
        ]);

        let report = sync.sync(&input, &writer).await.unwrap();

        assert_eq!(report, SyncReport { changes: 2, batches: 1 });
        assert_eq!(writer.calls().len(), 1);
        assert_eq!(writer.calls()[0].len(), 2);
    }

    #[tokio::test]
    async fn test_batches_follow_planner() {
        let sync = ZoneSynchronizer::new(live_settings(3)).unwrap();
        let writer = RecordingWriter::default();
        let input = summaries(
            (0..8)
                .map(|i| summary(&format!("host-{i}"), "", &format!("10.0.0.{i}"), Decision::Add))
                .collect(),
        );

        let report = sync.sync(&input, &writer).await.unwrap();

        let sizes: Vec<usize> = writer.calls().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 2]);
        assert_eq!(report.batches, 3);
        assert_eq!(writer.calls()[0][0].name, "host-0");
        assert_eq!(writer.calls()[2][1].name, "host-7");
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_remaining() {
        let sync = ZoneSynchronizer::new(live_settings(2)).unwrap();
        let writer = RecordingWriter::failing(vec![0]);
        let input = summaries(
            (0..6)
                .map(|i| summary(&format!("host-{i}"), &format!("10.0.0.{i}"), "", Decision::Delete))
                .collect(),
        );

        let result = sync.sync(&input, &writer).await;

        assert_eq!(
            result,
            Err(SyncError::PartialApplyFailure {
                failed: 1,
                total: 3
            })
        );
        assert_eq!(writer.calls().len(), 3, "every batch must be attempted");
    }

    #[tokio::test]
    async fn test_all_batches_failing() {
        let sync = ZoneSynchronizer::new(live_settings(1)).unwrap();
        let writer = RecordingWriter::failing(vec![0, 1]);
        let input = summaries(vec![
            summary("sample-domain-1", "1.1.1.1", "2.2.2.2", Decision::Update),
            summary("sample-domain-2", "3.3.3.3", "", Decision::Delete),
        ]);

        let result = sync.sync(&input, &writer).await;

        assert_eq!(
            result,
            Err(SyncError::PartialApplyFailure {
                failed: 2,
                total: 2
            })
        );
    }

    #[tokio::test]
    async fn test_writer_label_limit_is_honoured() {
        struct ShortLabels(RecordingWriter);

        #[async_trait]
        impl ZoneWriter for ShortLabels {
            async fn apply_batch(
                &self,
                batch: &[PendingChange],
                ttl: u32,
            ) -> Result<(), ZoneWriteError> {
                self.0.apply_batch(batch, ttl).await
            }

            fn max_label_length(&self) -> usize {
                4
            }
        }

        let sync = ZoneSynchronizer::new(live_settings(25)).unwrap();
        let writer = ShortLabels(RecordingWriter::default());
        let input = summaries(vec![
            summary("http://abcd.example.com", "", "1.1.1.1", Decision::Add),
            summary("http://abcde.example.com", "", "1.1.1.2", Decision::Add),
        ]);

        let report = sync.sync(&input, &writer).await.unwrap();

        assert_eq!(report.changes, 1);
        assert_eq!(writer.0.calls()[0][0].name, "abcd.example.com");
    }
}
