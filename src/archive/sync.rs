//! Full and incremental synchronization as one pipeline.
//!
//! Per stream: pick a starting anchor (0 for a full rebuild, `latest_id + 1`
//! otherwise), fetch everything after it, split by topic, merge into the topic
//! files, then bump the stream cursor. The index is written last, after every
//! topic file of the run, so the cursor never points past data that is not on
//! disk.

use crate::archive::fetch::MessageFetcher;
use crate::archive::filter::StreamFilter;
use crate::archive::index::{ArchiveIndex, StreamRecord, TopicSummary};
use crate::archive::partition::partition_by_topic;
use crate::archive::rate_limit::{RateLimitedExecutor, Sleeper};
use crate::archive::store::ArchiveStore;
use crate::archive::util::now_epoch_secs;
use crate::error::ArchiveError;
use crate::zulip::remote::{ChatRemote, Narrow, RemoteStream};
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

impl SyncMode {
    pub fn from_flags(full: bool, incremental: bool) -> Result<Self, ArchiveError> {
        match (full, incremental) {
            (true, true) => Err(ArchiveError::ConflictingModes),
            (true, false) => Ok(Self::Full),
            (false, true) => Ok(Self::Incremental),
            (false, false) => Err(ArchiveError::NoModeRequested),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

/// Context attached to any error raised while a single stream is synced.
#[derive(Debug, Clone)]
pub struct StreamSyncFailed {
    pub stream: String,
}

impl fmt::Display for StreamSyncFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to sync stream `{}`", self.stream)
    }
}

pub struct SyncContext<'a, R: ChatRemote, S: Sleeper> {
    pub remote: &'a R,
    pub store: &'a ArchiveStore,
    pub filter: &'a StreamFilter,
    pub executor: &'a RateLimitedExecutor<S>,
    pub page_size: u32,
}

#[derive(Debug, Clone)]
pub struct StreamSyncSummary {
    pub name: String,
    pub id: i64,
    pub anchor: i64,
    pub new_messages: usize,
    pub topics_written: usize,
    pub latest_id: i64,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub mode: SyncMode,
    pub index_path: PathBuf,
    pub generated_at: u64,
    pub streams: Vec<StreamSyncSummary>,
    pub skipped_streams: Vec<String>,
    pub pruned_files: Vec<PathBuf>,
}

impl SyncOutcome {
    pub fn new_messages(&self) -> usize {
        self.streams.iter().map(|s| s.new_messages).sum()
    }

    pub fn topics_written(&self) -> usize {
        self.streams.iter().map(|s| s.topics_written).sum()
    }
}

pub fn run_sync<R: ChatRemote, S: Sleeper>(
    ctx: &SyncContext<'_, R, S>,
    mode: SyncMode,
) -> Result<SyncOutcome> {
    // Incremental mode must fail on a missing index before touching the network.
    let mut index = match mode {
        SyncMode::Full => ArchiveIndex::default(),
        SyncMode::Incremental => ctx.store.load_index()?,
    };

    let remote_streams = ctx
        .executor
        .execute("streams", "", || ctx.remote.list_streams())
        .context("failed to list streams")?;

    let (included, skipped): (Vec<RemoteStream>, Vec<RemoteStream>) =
        remote_streams.into_iter().partition(|s| ctx.filter.admits(s));
    tracing::info!(
        mode = mode.as_str(),
        included = included.len(),
        skipped = skipped.len(),
        "starting sync"
    );

    let fetcher = MessageFetcher::new(ctx.remote, ctx.executor, ctx.page_size);
    let mut streams = Vec::with_capacity(included.len());
    for stream in &included {
        let summary = sync_stream(ctx, &fetcher, mode, &mut index, stream).with_context(|| {
            StreamSyncFailed {
                stream: stream.name.clone(),
            }
        })?;
        streams.push(summary);
    }

    index.generated_at = now_epoch_secs()?;
    let index_path = ctx.store.save_index(&index)?;

    let mut pruned_files = Vec::new();
    if mode == SyncMode::Full {
        for stream in &included {
            let Some(record) = index.streams.get(&stream.name) else {
                continue;
            };
            let removed = ctx
                .store
                .prune_stale_topics(&stream.name, record.id, &record.topics)?;
            pruned_files.extend(removed);
        }
    }

    tracing::info!(
        mode = mode.as_str(),
        streams = streams.len(),
        pruned = pruned_files.len(),
        index = %index_path.display(),
        "sync committed"
    );

    Ok(SyncOutcome {
        mode,
        index_path,
        generated_at: index.generated_at,
        streams,
        skipped_streams: skipped.into_iter().map(|s| s.name).collect(),
        pruned_files,
    })
}

fn sync_stream<R: ChatRemote, S: Sleeper>(
    ctx: &SyncContext<'_, R, S>,
    fetcher: &MessageFetcher<'_, R, S>,
    mode: SyncMode,
    index: &mut ArchiveIndex,
    stream: &RemoteStream,
) -> Result<StreamSyncSummary> {
    let record = index
        .streams
        .entry(stream.name.clone())
        .or_insert_with(|| StreamRecord::seed(stream.id));

    let anchor = match mode {
        SyncMode::Full => 0,
        SyncMode::Incremental => record.latest_id + 1,
    };

    let messages = fetcher.fetch_all(&Narrow::stream(&stream.name), anchor)?;
    let new_messages = messages.len();
    let fetched_max_id = messages.iter().map(|m| m.id).max();

    let by_topic = partition_by_topic(messages);
    let topics_written = by_topic.len();
    for (topic, fresh) in by_topic {
        let mut combined = match mode {
            SyncMode::Full => Vec::new(),
            SyncMode::Incremental => ctx.store.load_topic(&stream.name, record.id, &topic)?,
        };
        // A previous run may have written this file and died before the index
        // commit; skip anything the file already holds.
        let last_persisted = combined.last().map(|m| m.id);
        combined.extend(
            fresh
                .into_iter()
                .filter(|m| last_persisted.is_none_or(|last| m.id > last)),
        );

        ctx.store
            .write_topic(&stream.name, record.id, &topic, &combined)?;
        if let Some(summary) = TopicSummary::from_messages(&combined) {
            record.topics.insert(topic, summary);
        }
    }

    record.advance_cursor(fetched_max_id);

    tracing::info!(
        stream = %stream.name,
        anchor,
        new_messages,
        topics = topics_written,
        latest_id = record.latest_id,
        "stream synced"
    );

    Ok(StreamSyncSummary {
        name: stream.name.clone(),
        id: record.id,
        anchor,
        new_messages,
        topics_written,
        latest_id: record.latest_id,
    })
}
