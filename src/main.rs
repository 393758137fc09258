mod archive;
mod cli;
mod commands;
mod env_loader;
mod error;
mod logging;
mod zulip;

fn main() {
    // Before logging, so a `.env` can set ZULIP_ARCHIVE_LOG.
    let dotenv = env_loader::load_dotenv();
    logging::init();
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    if let Err(err) = cli::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
