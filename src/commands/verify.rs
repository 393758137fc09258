use anyhow::Result;

use crate::archive::config::load_config;
use crate::archive::paths::resolve_paths;
use crate::archive::store::ArchiveStore;
use crate::archive::verify::{VerifyOutcome, verify_archive};
use crate::commands::CommandReport;

#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    /// Treat topic files the index does not know about as failures.
    pub strict: bool,
}

fn outcome_report(outcome: &VerifyOutcome, opts: &VerifyOptions) -> CommandReport {
    let mut report = CommandReport::new("verify");
    report.detail(format!("streams_checked={}", outcome.streams_checked));
    report.detail(format!("topics_checked={}", outcome.topics_checked));
    report.detail(format!("messages_checked={}", outcome.messages_checked));

    for problem in &outcome.problems {
        report.issue(problem.clone());
    }
    for orphan in &outcome.orphans {
        let line = format!("topic file not in index: {}", orphan.display());
        if opts.strict {
            report.issue(line);
        } else {
            report.detail(line);
        }
    }
    if outcome.is_consistent() && report.ok {
        report.detail("archive: consistent");
    }
    report
}

pub fn run(opts: &VerifyOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths)?;
    let store = ArchiveStore::open(cfg.json_directory(&paths))?;
    let outcome = verify_archive(&store)?;
    Ok(outcome_report(&outcome, opts))
}
