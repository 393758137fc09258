use anyhow::Result;

use crate::archive::audit;
use crate::archive::config::load_config;
use crate::archive::filter::StreamFilter;
use crate::archive::lock::ArchiveLock;
use crate::archive::paths::resolve_paths;
use crate::archive::rate_limit::{RateLimitedExecutor, RetryPolicy};
use crate::archive::store::ArchiveStore;
use crate::archive::sync::{StreamSyncFailed, SyncContext, SyncMode, SyncOutcome, run_sync};
use crate::archive::util::plural;
use crate::archive::warn::{self, WarnEvent};
use crate::commands::CommandReport;
use crate::error::{ArchiveError, classify};
use crate::zulip::client::ZulipClient;

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub full: bool,
    pub incremental: bool,
}

fn outcome_report(outcome: &SyncOutcome) -> CommandReport {
    let mut report = CommandReport::new("sync");
    report.detail(format!("mode={}", outcome.mode.as_str()));
    report.detail(format!("index={}", outcome.index_path.display()));
    report.detail(format!("generated_at={}", outcome.generated_at));
    for stream in &outcome.streams {
        report.detail(format!(
            "stream {} (id {}): {} from anchor {}, {} written, latest_id={}",
            stream.name,
            stream.id,
            plural(stream.new_messages, "new message"),
            stream.anchor,
            plural(stream.topics_written, "topic"),
            stream.latest_id
        ));
    }
    for name in &outcome.skipped_streams {
        report.detail(format!("skipped stream {name}"));
    }
    for path in &outcome.pruned_files {
        report.detail(format!("pruned {}", path.display()));
    }
    report.detail(format!(
        "synced {}: {}, {}",
        plural(outcome.streams.len(), "stream"),
        plural(outcome.new_messages(), "new message"),
        plural(outcome.topics_written(), "topic file")
    ));
    report
}

pub fn run(opts: &SyncOptions) -> Result<CommandReport> {
    let mode = SyncMode::from_flags(opts.full, opts.incremental)?;
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let store = ArchiveStore::open(cfg.json_directory(&paths))?;

    // Incremental runs need a prior index; fail before touching credentials or the network.
    if mode == SyncMode::Incremental && !store.has_index() {
        return Err(ArchiveError::NoPriorIndex {
            path: store.index_path(),
        }
        .into());
    }

    let lock = ArchiveLock::acquire(store.root())?;
    tracing::debug!(lock = %lock.path().display(), "archive locked");
    let creds = cfg.zulip.require_credentials()?;
    let client = ZulipClient::new(&creds, cfg.fetch.request_timeout_secs)?;
    let executor =
        RateLimitedExecutor::new(RetryPolicy::from_max_retries(cfg.fetch.max_rate_limit_retries));
    let filter = StreamFilter::from_selection(&cfg.streams);

    audit::append_event(
        &paths,
        "sync",
        "started",
        &format!("mode={} root={}", mode.as_str(), store.root().display()),
    )?;

    let ctx = SyncContext {
        remote: &client,
        store: &store,
        filter: &filter,
        executor: &executor,
        page_size: cfg.fetch.page_size,
    };
    let outcome = match run_sync(&ctx, mode) {
        Ok(outcome) => outcome,
        Err(err) => {
            let code = classify(&err).map_or("E000_UNCLASSIFIED", |c| c.as_str());
            let rendered = format!("{err:#}");
            let stream = err
                .downcast_ref::<StreamSyncFailed>()
                .map_or("", |failed| failed.stream.as_str());
            warn::emit(WarnEvent {
                code,
                stage: "sync",
                action: mode.as_str(),
                stream,
                retry: "rerun-sync",
                reason: "sync-aborted-index-unchanged",
                err: &rendered,
            });
            if let Err(audit_err) =
                audit::append_event(&paths, "sync", "failed", &format!("code={code} {rendered}"))
            {
                tracing::error!(error = %format!("{audit_err:#}"), "failed to record audit event");
            }
            return Err(err);
        }
    };

    audit::append_event(
        &paths,
        "sync",
        "ok",
        &format!(
            "mode={} streams={} new_messages={} pruned={}",
            mode.as_str(),
            outcome.streams.len(),
            outcome.new_messages(),
            outcome.pruned_files.len()
        ),
    )?;

    Ok(outcome_report(&outcome))
}
