use crate::archive::fetch::DEFAULT_PAGE_SIZE;
use crate::archive::paths::ArchivePaths;
use crate::error::ArchiveError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "ZULIP_ARCHIVE_";

include!(concat!(env!("OUT_DIR"), "/zulip_archive_env_allowlist.rs"));

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ArchiveSection {
    pub json_directory: Option<PathBuf>,
}

/// Missing keys fall back to `Default`, so an `excluded`-only table still archives `*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSelection {
    pub included: Vec<String>,
    pub excluded: Vec<String>,
}

impl Default for StreamSelection {
    fn default() -> Self {
        Self {
            included: vec!["*".to_string()],
            excluded: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ZulipSettings {
    pub site: Option<String>,
    pub email: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ZulipCredentials {
    pub site: String,
    pub email: String,
    pub api_key: String,
}

impl ZulipSettings {
    pub fn require_credentials(&self) -> Result<ZulipCredentials, ArchiveError> {
        fn required(value: &Option<String>, name: &'static str) -> Result<String, ArchiveError> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(ToOwned::to_owned)
                .ok_or(ArchiveError::MissingSetting(name))
        }

        Ok(ZulipCredentials {
            site: required(&self.site, "zulip.site")?
                .trim_end_matches('/')
                .to_string(),
            email: required(&self.email, "zulip.email")?,
            api_key: required(&self.api_key, "zulip.api_key")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub page_size: u32,
    /// Zero means retry rate-limited calls without bound.
    pub max_rate_limit_retries: u32,
    pub request_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_rate_limit_retries: 0,
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ArchiveConfig {
    pub archive: ArchiveSection,
    pub streams: StreamSelection,
    pub zulip: ZulipSettings,
    pub fetch: FetchSettings,
}

impl ArchiveConfig {
    pub fn json_directory(&self, paths: &ArchivePaths) -> PathBuf {
        self.archive
            .json_directory
            .clone()
            .unwrap_or_else(|| paths.default_json_dir.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialArchiveConfig {
    archive: Option<ArchiveSection>,
    streams: Option<StreamSelection>,
    zulip: Option<ZulipSettings>,
    fetch: Option<FetchSettings>,
}

fn env_or_u32(var: &str, fallback: u32) -> u32 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u32>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_opt_string(var: &str, fallback: Option<String>) -> Option<String> {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => Some(v.trim().to_string()),
        _ => fallback,
    }
}

fn env_or_csv(var: &str, fallback: &[String]) -> Vec<String> {
    match env::var(var) {
        Ok(v) => {
            let out = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect::<Vec<_>>();
            if out.is_empty() {
                fallback.to_vec()
            } else {
                out
            }
        }
        Err(_) => fallback.to_vec(),
    }
}

fn validate(cfg: &ArchiveConfig) -> Result<()> {
    if cfg.streams.included.is_empty() {
        return Err(anyhow!(ArchiveError::InvalidConfig(
            "streams.included is empty; add \"*\" to archive every public stream".to_string()
        )));
    }
    if cfg.fetch.page_size == 0 || cfg.fetch.page_size > 5000 {
        return Err(anyhow!(ArchiveError::InvalidConfig(
            "fetch.page_size must be within 1..=5000".to_string()
        )));
    }
    if cfg.fetch.request_timeout_secs == 0 {
        return Err(anyhow!(ArchiveError::InvalidConfig(
            "fetch.request_timeout_secs must be >= 1".to_string()
        )));
    }
    Ok(())
}

fn merge_file_config(base: &mut ArchiveConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| ArchiveError::InvalidConfig(format!("{}: {err}", path.display())))?;
    merge_toml(base, &raw)
        .map_err(|err| ArchiveError::InvalidConfig(format!("{}: {err}", path.display())))?;
    Ok(())
}

fn merge_toml(base: &mut ArchiveConfig, raw: &str) -> Result<(), toml::de::Error> {
    let parsed: PartialArchiveConfig = toml::from_str(raw)?;
    if let Some(archive) = parsed.archive {
        base.archive = archive;
    }
    if let Some(streams) = parsed.streams {
        base.streams = streams;
    }
    if let Some(zulip) = parsed.zulip {
        base.zulip = zulip;
    }
    if let Some(fetch) = parsed.fetch {
        base.fetch = fetch;
    }
    Ok(())
}

pub fn load_config(paths: &ArchivePaths) -> Result<ArchiveConfig> {
    let mut cfg = ArchiveConfig::default();
    merge_file_config(&mut cfg, &paths.config_file)?;

    if let Some(dir) = env_or_opt_string("ZULIP_ARCHIVE_JSON_DIR", None) {
        cfg.archive.json_directory = Some(PathBuf::from(dir));
    }
    cfg.streams.included = env_or_csv("ZULIP_ARCHIVE_INCLUDED_STREAMS", &cfg.streams.included);
    cfg.streams.excluded = env_or_csv("ZULIP_ARCHIVE_EXCLUDED_STREAMS", &cfg.streams.excluded);
    cfg.zulip.site = env_or_opt_string("ZULIP_ARCHIVE_SITE", cfg.zulip.site.take());
    cfg.zulip.email = env_or_opt_string("ZULIP_ARCHIVE_EMAIL", cfg.zulip.email.take());
    cfg.zulip.api_key = env_or_opt_string("ZULIP_ARCHIVE_API_KEY", cfg.zulip.api_key.take());
    cfg.fetch.page_size = env_or_u32("ZULIP_ARCHIVE_PAGE_SIZE", cfg.fetch.page_size);
    cfg.fetch.max_rate_limit_retries = env_or_u32(
        "ZULIP_ARCHIVE_MAX_RATE_LIMIT_RETRIES",
        cfg.fetch.max_rate_limit_retries,
    );
    cfg.fetch.request_timeout_secs = env_or_u64(
        "ZULIP_ARCHIVE_REQUEST_TIMEOUT_SECS",
        cfg.fetch.request_timeout_secs,
    );

    validate(&cfg)?;
    Ok(cfg)
}

/// `ZULIP_ARCHIVE_*` variables present in the environment, split into known and unknown keys.
pub fn env_overrides() -> (Vec<String>, Vec<String>) {
    let mut known = Vec::new();
    let mut unknown = Vec::new();
    for (key, _) in env::vars() {
        if !key.starts_with(ENV_PREFIX) {
            continue;
        }
        if GENERATED_ENV_ALLOWLIST.contains(&key.as_str()) {
            known.push(key);
        } else {
            unknown.push(key);
        }
    }
    known.sort();
    unknown.sort();
    (known, unknown)
}
