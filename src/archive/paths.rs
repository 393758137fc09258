use anyhow::Result;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ArchivePaths {
    pub home: PathBuf,
    pub config_file: PathBuf,
    pub logs_dir: PathBuf,
    pub default_json_dir: PathBuf,
}

fn required_home_dir() -> Result<PathBuf> {
    if let Some(home) = dirs::home_dir() {
        return Ok(home);
    }
    Err(anyhow::anyhow!("HOME directory could not be resolved"))
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<ArchivePaths> {
    let home = match env::var("ZULIP_ARCHIVE_HOME") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => required_home_dir()?.join(".zulip-archive"),
    };

    let config_file = env_or_default_path("ZULIP_ARCHIVE_CONFIG_PATH", home.join("archive.toml"));
    let logs_dir = env_or_default_path("ZULIP_ARCHIVE_LOGS_DIR", home.join("logs"));
    let default_json_dir = home.join("json");

    Ok(ArchivePaths {
        home,
        config_file,
        logs_dir,
        default_json_dir,
    })
}
