use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, CommandReport};

#[derive(Parser)]
#[command(name = "zulip-archive")]
#[command(version)]
#[command(about = "Mirror public Zulip streams into a browsable JSON archive")]
#[command(after_long_help = r#"CONFIGURATION
    Settings are read from $ZULIP_ARCHIVE_HOME/archive.toml (default ~/.zulip-archive)
    and can be overridden with ZULIP_ARCHIVE_* environment variables, for example
    ZULIP_ARCHIVE_SITE, ZULIP_ARCHIVE_EMAIL, ZULIP_ARCHIVE_API_KEY and ZULIP_ARCHIVE_JSON_DIR.
"#)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch messages from the server into the archive
    Sync {
        /// Rebuild the whole archive from the first message
        #[arg(short = 't', long)]
        full: bool,
        /// Fetch only messages newer than the last sync
        #[arg(short = 'i', long)]
        incremental: bool,
    },
    /// Show paths, overrides and a summary of the stream index
    Status,
    /// Check the stream index against the topic files on disk
    Verify {
        /// Also fail on topic files the index does not reference
        #[arg(long)]
        strict: bool,
    },
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "failed" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("issue: {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Sync { full, incremental } => {
            commands::sync::run(&commands::sync::SyncOptions { full, incremental })?
        }
        Command::Status => commands::status::run()?,
        Command::Verify { strict } => {
            commands::verify::run(&commands::verify::VerifyOptions { strict })?
        }
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
