use crate::archive::index::ArchiveIndex;
use crate::archive::store::{ArchiveStore, sanitize_topic};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct VerifyOutcome {
    pub streams_checked: usize,
    pub topics_checked: usize,
    pub messages_checked: usize,
    /// Broken invariants between the index and the topic files.
    pub problems: Vec<String>,
    /// Topic files on disk that the index does not mention.
    pub orphans: Vec<PathBuf>,
}

impl VerifyOutcome {
    pub fn is_consistent(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Cross-check `stream_index.json` against every topic file it references.
pub fn verify_archive(store: &ArchiveStore) -> Result<VerifyOutcome> {
    let index = store.load_index()?;
    let mut outcome = VerifyOutcome::default();

    for (stream_name, record) in &index.streams {
        outcome.streams_checked += 1;
        for (topic, summary) in &record.topics {
            outcome.topics_checked += 1;
            let label = format!("{stream_name}/{topic}");
            let path = store.topic_path(stream_name, record.id, topic);
            if !path.is_file() {
                outcome
                    .problems
                    .push(format!("{label}: topic file missing at {}", path.display()));
                continue;
            }

            let messages = store.load_topic(stream_name, record.id, topic)?;
            outcome.messages_checked += messages.len();

            if messages.len() != summary.size {
                outcome.problems.push(format!(
                    "{label}: index size {} but file holds {}",
                    summary.size,
                    messages.len()
                ));
            }
            if let Some(pair) = messages.windows(2).find(|w| w[0].id >= w[1].id) {
                outcome.problems.push(format!(
                    "{label}: message ids out of order ({} then {})",
                    pair[0].id, pair[1].id
                ));
            }
            if let Some(last) = messages.last() {
                if last.timestamp != summary.latest_timestamp {
                    outcome.problems.push(format!(
                        "{label}: latest_timestamp {} but last message has {}",
                        summary.latest_timestamp, last.timestamp
                    ));
                }
                let max_id = messages.iter().map(|m| m.id).max().unwrap_or(last.id);
                if max_id > record.latest_id {
                    outcome.problems.push(format!(
                        "{label}: holds message {max_id} beyond stream latest_id {}",
                        record.latest_id
                    ));
                }
            } else {
                outcome.problems.push(format!("{label}: topic file is empty"));
            }
        }
    }

    outcome.orphans = find_orphans(store, &index)?;
    Ok(outcome)
}

fn find_orphans(store: &ArchiveStore, index: &ArchiveIndex) -> Result<Vec<PathBuf>> {
    let mut orphans = Vec::new();
    for (stream_name, record) in &index.streams {
        let dir = store.stream_dir(stream_name, record.id);
        if !dir.is_dir() {
            continue;
        }
        let known = record
            .topics
            .keys()
            .map(|topic| format!("{}.json", sanitize_topic(topic)))
            .collect::<BTreeSet<_>>();
        for entry in fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if !known.contains(name) {
                orphans.push(path);
            }
        }
    }
    orphans.sort();
    Ok(orphans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::index::{MessageRecord, StreamRecord, TopicSummary};
    use crate::error::ArchiveError;
    use tempfile::tempdir;

    fn record(id: i64, ts: i64) -> MessageRecord {
        MessageRecord {
            id,
            sender_name: "Ada".into(),
            timestamp: ts,
            content: String::new(),
        }
    }

    fn seeded(store: &ArchiveStore, messages: &[MessageRecord], size: usize) {
        store.write_topic("general", 10, "hello", messages).expect("topic");
        let mut general = StreamRecord::seed(10);
        general.latest_id = 3;
        general.topics.insert(
            "hello".into(),
            TopicSummary {
                size,
                latest_timestamp: messages.last().map(|m| m.timestamp).unwrap_or_default(),
            },
        );
        let mut index = ArchiveIndex::default();
        index.streams.insert("general".into(), general);
        store.save_index(&index).expect("index");
    }

    #[test]
    fn consistent_archive_passes() {
        let tmp = tempdir().expect("tempdir");
        let store = ArchiveStore::open(tmp.path()).expect("open");
        seeded(&store, &[record(1, 10), record(3, 30)], 2);

        let outcome = verify_archive(&store).expect("verify");
        assert!(outcome.is_consistent(), "{:?}", outcome.problems);
        assert_eq!(outcome.topics_checked, 1);
        assert_eq!(outcome.messages_checked, 2);
        assert!(outcome.orphans.is_empty());
    }

    #[test]
    fn detects_size_mismatch_and_unordered_ids() {
        let tmp = tempdir().expect("tempdir");
        let store = ArchiveStore::open(tmp.path()).expect("open");
        seeded(&store, &[record(2, 20), record(1, 30)], 5);

        let outcome = verify_archive(&store).expect("verify");
        assert!(!outcome.is_consistent());
        assert!(outcome.problems.iter().any(|p| p.contains("index size 5")));
        assert!(outcome.problems.iter().any(|p| p.contains("out of order")));
    }

    #[test]
    fn detects_messages_beyond_cursor_and_missing_files() {
        let tmp = tempdir().expect("tempdir");
        let store = ArchiveStore::open(tmp.path()).expect("open");
        seeded(&store, &[record(1, 10), record(9, 90)], 2);

        let outcome = verify_archive(&store).expect("verify");
        assert!(outcome.problems.iter().any(|p| p.contains("beyond stream latest_id 3")));

        fs::remove_file(store.topic_path("general", 10, "hello")).expect("remove");
        let outcome = verify_archive(&store).expect("verify");
        assert!(outcome.problems.iter().any(|p| p.contains("topic file missing")));
    }

    #[test]
    fn reports_orphan_topic_files() {
        let tmp = tempdir().expect("tempdir");
        let store = ArchiveStore::open(tmp.path()).expect("open");
        seeded(&store, &[record(1, 10)], 1);
        store
            .write_topic("general", 10, "gone", &[record(2, 20)])
            .expect("orphan");

        let outcome = verify_archive(&store).expect("verify");
        assert!(outcome.is_consistent());
        assert_eq!(outcome.orphans, vec![store.topic_path("general", 10, "gone")]);
    }

    #[test]
    fn missing_index_is_an_error() {
        let tmp = tempdir().expect("tempdir");
        let store = ArchiveStore::open(tmp.path()).expect("open");
        let err = verify_archive(&store).expect_err("no index");
        assert!(matches!(
            err.downcast_ref::<ArchiveError>(),
            Some(ArchiveError::NoPriorIndex { .. })
        ));
    }
}
