use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(
        "no prior stream index at {path}; run `zulip-archive sync --full` once to build it \
         (or check that json_directory still points at the existing archive)"
    )]
    NoPriorIndex { path: PathBuf },
    #[error("cannot perform both a full and an incremental sync; use --full or --incremental")]
    ConflictingModes,
    #[error("no sync mode requested; use --full or --incremental")]
    NoModeRequested,
    #[error("missing required setting `{0}`")]
    MissingSetting(&'static str),
    #[error("archive directory {path} does not exist; create it with `mkdir -p {path}`")]
    ArchiveDirMissing { path: PathBuf },
    #[error("{path} needs to be a directory")]
    NotADirectory { path: PathBuf },
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("archive at {path} is locked by another sync run")]
    Locked { path: PathBuf },
}

impl ArchiveError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Locked { .. } => ErrorCode::E001Locked,
            Self::NoPriorIndex { .. } => ErrorCode::E002NoPriorIndex,
            Self::ConflictingModes | Self::NoModeRequested => ErrorCode::E003UsageConflict,
            Self::ArchiveDirMissing { .. } | Self::NotADirectory { .. } => {
                ErrorCode::E004ArchiveDirInvalid
            }
            Self::MissingSetting(_) | Self::InvalidConfig(_) => ErrorCode::E005ConfigMissing,
        }
    }
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("rate limited by server; retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },
    #[error("rate limit retries exhausted after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },
    #[error("zulip api error ({code}): {message}")]
    Api { code: String, message: String },
    #[error("unexpected zulip response: {0}")]
    Protocol(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl RemoteError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::RateLimited { .. } | Self::RateLimitExhausted { .. } => ErrorCode::E006RateLimited,
            Self::Api { .. } | Self::Protocol(_) | Self::Http(_) => ErrorCode::E007RemoteFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    E001Locked,
    E002NoPriorIndex,
    E003UsageConflict,
    E004ArchiveDirInvalid,
    E005ConfigMissing,
    E006RateLimited,
    E007RemoteFailure,
    E008IndexCorrupt,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Locked => "E001_LOCKED",
            Self::E002NoPriorIndex => "E002_NO_PRIOR_INDEX",
            Self::E003UsageConflict => "E003_USAGE_CONFLICT",
            Self::E004ArchiveDirInvalid => "E004_ARCHIVE_DIR_INVALID",
            Self::E005ConfigMissing => "E005_CONFIG_MISSING",
            Self::E006RateLimited => "E006_RATE_LIMITED",
            Self::E007RemoteFailure => "E007_REMOTE_FAILURE",
            Self::E008IndexCorrupt => "E008_INDEX_CORRUPT",
        }
    }
}

/// Best-effort classification of an `anyhow` chain for audit and warn output.
pub fn classify(err: &anyhow::Error) -> Option<ErrorCode> {
    for cause in err.chain() {
        if let Some(archive) = cause.downcast_ref::<ArchiveError>() {
            return Some(archive.code());
        }
        if let Some(remote) = cause.downcast_ref::<RemoteError>() {
            return Some(remote.code());
        }
        if cause.downcast_ref::<serde_json::Error>().is_some() {
            return Some(ErrorCode::E008IndexCorrupt);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_finds_typed_error_behind_context() {
        let err = anyhow::Error::new(ArchiveError::ConflictingModes).context("sync aborted");
        assert_eq!(classify(&err), Some(ErrorCode::E003UsageConflict));

        let err = anyhow::Error::new(RemoteError::Protocol("bad".into())).context("fetch");
        assert_eq!(
            classify(&err).map(ErrorCode::as_str),
            Some("E007_REMOTE_FAILURE")
        );
    }

    #[test]
    fn classify_returns_none_for_untyped_errors() {
        let err = anyhow::anyhow!("plain failure");
        assert_eq!(classify(&err), None);
    }
}
