use crate::archive::index::{ArchiveIndex, MessageRecord, TopicSummary};
use crate::error::ArchiveError;
use anyhow::{Context, Result};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const INDEX_FILE: &str = "stream_index.json";

/// Everything except ASCII alphanumerics, `-`, `_` and `~` gets encoded; `.` included.
const SANITIZE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'~');

/// Percent-encode `input` and swap `%` for `.`, giving a unique, path-safe name.
pub fn sanitize(input: &str) -> String {
    utf8_percent_encode(input, SANITIZE_SET)
        .to_string()
        .replace('%', ".")
}

pub fn sanitize_stream(stream_name: &str, stream_id: i64) -> String {
    format!("{stream_id}-{}", sanitize(&stream_name.replace(' ', "-")))
}

pub fn sanitize_topic(topic_name: &str) -> String {
    sanitize(topic_name)
}

fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let data = serde_json::to_string_pretty(value)?;
    Ok(format!("{data}\n"))
}

/// File-backed archive rooted at the configured JSON directory.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    /// Open an existing archive directory. The directory is never created implicitly.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let root = root.into();
        if !root.exists() {
            return Err(ArchiveError::ArchiveDirMissing { path: root });
        }
        if !root.is_dir() {
            return Err(ArchiveError::NotADirectory { path: root });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    pub fn has_index(&self) -> bool {
        self.index_path().is_file()
    }

    pub fn load_index(&self) -> Result<ArchiveIndex> {
        let path = self.index_path();
        if !path.exists() {
            return Err(ArchiveError::NoPriorIndex { path }.into());
        }
        let raw =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let parsed = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(parsed)
    }

    /// Replace the index via temp file + rename so readers never see a torn write.
    pub fn save_index(&self, index: &ArchiveIndex) -> Result<PathBuf> {
        let path = self.index_path();
        let data = to_pretty_json(index)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)
            .with_context(|| format!("failed to create temp file in {}", self.root.display()))?;
        tmp.write_all(data.as_bytes())
            .with_context(|| format!("failed to write {}", tmp.path().display()))?;
        tmp.persist(&path)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub fn stream_dir(&self, stream_name: &str, stream_id: i64) -> PathBuf {
        self.root.join(sanitize_stream(stream_name, stream_id))
    }

    pub fn topic_path(&self, stream_name: &str, stream_id: i64, topic_name: &str) -> PathBuf {
        self.stream_dir(stream_name, stream_id)
            .join(format!("{}.json", sanitize_topic(topic_name)))
    }

    /// Messages already archived for a topic; empty when the topic is new.
    pub fn load_topic(
        &self,
        stream_name: &str,
        stream_id: i64,
        topic_name: &str,
    ) -> Result<Vec<MessageRecord>> {
        let path = self.topic_path(stream_name, stream_id, topic_name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw =
            fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let parsed = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(parsed)
    }

    pub fn write_topic(
        &self,
        stream_name: &str,
        stream_id: i64,
        topic_name: &str,
        messages: &[MessageRecord],
    ) -> Result<PathBuf> {
        let dir = self.stream_dir(stream_name, stream_id);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = self.topic_path(stream_name, stream_id, topic_name);
        let data = to_pretty_json(messages)?;
        fs::write(&path, data).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Delete topic files in a stream directory that `topics` no longer mentions.
    pub fn prune_stale_topics(
        &self,
        stream_name: &str,
        stream_id: i64,
        topics: &BTreeMap<String, TopicSummary>,
    ) -> Result<Vec<PathBuf>> {
        let dir = self.stream_dir(stream_name, stream_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let keep = topics
            .keys()
            .map(|topic| format!("{}.json", sanitize_topic(topic)))
            .collect::<std::collections::BTreeSet<_>>();

        let mut removed = Vec::new();
        for entry in fs::read_dir(&dir).with_context(|| format!("failed to read {}", dir.display()))? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if keep.contains(file_name) {
                continue;
            }
            fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
            removed.push(path);
        }
        removed.sort();
        Ok(removed)
    }
}
