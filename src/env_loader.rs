use std::env;
use std::path::{Path, PathBuf};

const ARCHIVE_DIR_NAME: &str = ".zulip-archive";

/// `.env` inside the archive home: `ZULIP_ARCHIVE_HOME` when set, else `~/.zulip-archive`.
fn archive_home_dotenv(archive_home: Option<String>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    let base = match archive_home {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => home_dir?.join(ARCHIVE_DIR_NAME),
    };
    Some(base.join(".env"))
}

fn load_from(path: &Path) -> Option<PathBuf> {
    if !path.is_file() {
        return None;
    }
    dotenvy::from_path(path).ok().map(|()| path.to_path_buf())
}

/// Load a `.env` from the working directory, else from the archive home.
/// Variables already in the environment win. Returns the file that was read.
pub fn load_dotenv() -> Option<PathBuf> {
    if let Ok(path) = dotenvy::dotenv() {
        return Some(path);
    }

    let fallback = archive_home_dotenv(env::var("ZULIP_ARCHIVE_HOME").ok(), dirs::home_dir())?;
    load_from(&fallback)
}
