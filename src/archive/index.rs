//! On-disk data model: the stream index and the per-topic message lists.
//!
//! `stream_index.json` looks like
//!
//! ```text
//! {
//!   "generated_at": <epoch secs of the last successful sync>,
//!   "streams": {
//!     "<stream name>": {
//!       "id": <stream id>,
//!       "latest_id": <highest message id ingested for the stream>,
//!       "topics": {
//!         "<topic name>": { "size": <messages>, "latest_timestamp": <epoch secs> }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Each topic's messages live in `<id>-<stream>/<topic>.json` as a list of
//! [`MessageRecord`] ordered by id. Indexes written by the older tool used
//! `topic_data`, `latest_date` and `sender_full_name`; those names are still
//! accepted on read.

use crate::zulip::remote::RemoteMessage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    #[serde(alias = "sender_full_name")]
    pub sender_name: String,
    pub timestamp: i64,
    pub content: String,
}

impl From<RemoteMessage> for MessageRecord {
    fn from(msg: RemoteMessage) -> Self {
        Self {
            id: msg.id,
            sender_name: msg.sender_full_name,
            timestamp: msg.timestamp,
            content: msg.content,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    #[serde(alias = "topic_size")]
    pub size: usize,
    #[serde(alias = "latest_date")]
    pub latest_timestamp: i64,
}

impl TopicSummary {
    /// Summary of a persisted list; `None` for an empty list, which is never written.
    pub fn from_messages(messages: &[MessageRecord]) -> Option<Self> {
        let last = messages.last()?;
        Some(Self {
            size: messages.len(),
            latest_timestamp: last.timestamp,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: i64,
    pub latest_id: i64,
    #[serde(default, alias = "topic_data")]
    pub topics: BTreeMap<String, TopicSummary>,
}

impl StreamRecord {
    pub fn seed(id: i64) -> Self {
        Self {
            id,
            latest_id: 0,
            topics: BTreeMap::new(),
        }
    }

    /// Move the resume cursor forward; never backwards.
    pub fn advance_cursor(&mut self, fetched_max_id: Option<i64>) {
        if let Some(max_id) = fetched_max_id {
            self.latest_id = self.latest_id.max(max_id);
        }
    }

    pub fn message_count(&self) -> usize {
        self.topics.values().map(|t| t.size).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveIndex {
    #[serde(default)]
    pub generated_at: u64,
    #[serde(default)]
    pub streams: BTreeMap<String, StreamRecord>,
}

impl ArchiveIndex {
    /// Streams with the most topics first; ties by name.
    pub fn streams_by_topic_count(&self) -> Vec<(&String, &StreamRecord)> {
        let mut out = self.streams.iter().collect::<Vec<_>>();
        out.sort_by(|a, b| b.1.topics.len().cmp(&a.1.topics.len()).then(a.0.cmp(b.0)));
        out
    }
}

/// Topics of a stream, most recently active first; ties by name.
pub fn topics_by_recency(record: &StreamRecord) -> Vec<(&String, &TopicSummary)> {
    let mut out = record.topics.iter().collect::<Vec<_>>();
    out.sort_by(|a, b| {
        b.1.latest_timestamp
            .cmp(&a.1.latest_timestamp)
            .then(a.0.cmp(b.0))
    });
    out
}
