use anyhow::Result;

use crate::archive::config::{env_overrides, load_config};
use crate::archive::index::{ArchiveIndex, topics_by_recency};
use crate::archive::paths::resolve_paths;
use crate::archive::store::ArchiveStore;
use crate::archive::util::{format_epoch_utc, plural};
use crate::commands::CommandReport;

fn env_report() -> CommandReport {
    let mut report = CommandReport::new("env");
    let (known, unknown) = env_overrides();
    for key in known {
        report.detail(format!("env_override={key}"));
    }
    for key in unknown {
        report.issue(format!("unknown environment variable {key}; check for a typo"));
    }
    report
}

fn index_summary(index: &ArchiveIndex) -> Vec<String> {
    let mut lines = Vec::new();
    let generated_at = i64::try_from(index.generated_at).unwrap_or(i64::MAX);
    lines.push(format!("last_sync={}", format_epoch_utc(generated_at)));
    lines.push(format!("streams={}", index.streams.len()));

    for (name, record) in index.streams_by_topic_count() {
        lines.push(format!(
            "stream {name} (id {}): {}, {}, latest_id={}",
            record.id,
            plural(record.topics.len(), "topic"),
            plural(record.message_count(), "message"),
            record.latest_id
        ));
        for (topic, summary) in topics_by_recency(record) {
            lines.push(format!(
                "  {topic}: {}, last active {}",
                plural(summary.size, "message"),
                format_epoch_utc(summary.latest_timestamp)
            ));
        }
    }
    lines
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("config_file={}", paths.config_file.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.merge(env_report());

    let cfg = load_config(&paths)?;
    let json_dir = cfg.json_directory(&paths);
    report.detail(format!("json_directory={}", json_dir.display()));
    report.detail(format!("included_streams={}", cfg.streams.included.join(",")));
    if !cfg.streams.excluded.is_empty() {
        report.detail(format!("excluded_streams={}", cfg.streams.excluded.join(",")));
    }
    report.detail(format!(
        "zulip_site={}",
        cfg.zulip.site.as_deref().unwrap_or("<unset>")
    ));

    let store = match ArchiveStore::open(&json_dir) {
        Ok(store) => store,
        Err(err) => {
            report.issue(err.to_string());
            return Ok(report);
        }
    };
    if !store.has_index() {
        report.issue(format!(
            "no stream index at {}; run `zulip-archive sync --full` to build it",
            store.index_path().display()
        ));
        return Ok(report);
    }

    let index = store.load_index()?;
    for line in index_summary(&index) {
        report.detail(line);
    }

    Ok(report)
}
