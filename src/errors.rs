use std::path::PathBuf;

use thiserror::Error;

use crate::{
    apk::ApkError,
    config::{ConfigError, InvalidPackageId},
    dex::DexError,
};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("APK too large ({}MB). Max: {}MB", .size / MB, .limit / MB)]
    TooLarge { size: u64, limit: u64 },
    #[error("A decompilation of {0} is already running")]
    AlreadyRunning(String),
    #[error(transparent)]
    PackageId(InvalidPackageId),
    #[error("Cancelled")]
    Cancelled,
    #[error("Failed to decompile {container}: {source}")]
    Disassembly {
        container: String,
        #[source]
        source: DexError,
    },
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Archive(ApkError),
    #[error(transparent)]
    Dex(DexError),
    #[error(transparent)]
    Config(ConfigError),
}

const MB: u64 = 1024 * 1024;

impl From<ApkError> for JobError {
    fn from(e: ApkError) -> Self {
        JobError::Archive(e)
    }
}

impl From<DexError> for JobError {
    fn from(e: DexError) -> Self {
        JobError::Dex(e)
    }
}

impl From<InvalidPackageId> for JobError {
    fn from(e: InvalidPackageId) -> Self {
        JobError::PackageId(e)
    }
}

impl From<ConfigError> for JobError {
    fn from(e: ConfigError) -> Self {
        JobError::Config(e)
    }
}

/// Attaches the offending path to an I/O error.
pub(crate) trait IoContext<T> {
    fn at(self, path: &std::path::Path) -> Result<T, JobError>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &std::path::Path) -> Result<T, JobError> {
        self.map_err(|source| JobError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
