use std::{
    fs,
    path::{Component, Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Archives above this size are refused before anything is written.
pub const DEFAULT_SIZE_LIMIT: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid package id {0:?}: expected a single path component")]
pub struct InvalidPackageId(pub String);

/// Settings shared by every job. Each section falls back to its defaults so
/// a partial file never invalidates the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_size_limit")]
    pub size_limit: u64,
    /// Job output lands in `output_root/<package id>`.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Zipped output trees and archive copies are written here.
    #[serde(default = "default_exports_dir")]
    pub exports_dir: PathBuf,
    /// Parent of the per-job temporary extraction areas.
    #[serde(default = "std::env::temp_dir")]
    pub work_dir: PathBuf,
    #[serde(default)]
    pub disassembler: DisassemblerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisassemblerConfig {
    /// Executable name, path, or a `.jar` to run with `java -jar`.
    #[serde(default = "default_program")]
    pub program: String,
    /// Extra arguments placed before the subcommand.
    #[serde(default)]
    pub args: Vec<String>,
    /// Threads per container; defaults to the available parallelism.
    #[serde(default)]
    pub jobs: Option<usize>,
}

fn default_size_limit() -> u64 {
    DEFAULT_SIZE_LIMIT
}

fn default_output_root() -> PathBuf {
    PathBuf::from("decompiled")
}

fn default_exports_dir() -> PathBuf {
    PathBuf::from("exports")
}

fn default_program() -> String {
    "baksmali".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            size_limit: default_size_limit(),
            output_root: default_output_root(),
            exports_dir: default_exports_dir(),
            work_dir: std::env::temp_dir(),
            disassembler: DisassemblerConfig::default(),
        }
    }
}

impl Default for DisassemblerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: Vec::new(),
            jobs: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Where the job for `package_id` writes its tree. The id must be a single
    /// plain path component so the directory stays below `output_root`.
    pub fn output_dir(&self, package_id: &str) -> Result<PathBuf, InvalidPackageId> {
        let mut components = Path::new(package_id).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.output_root.join(package_id)),
            _ => Err(InvalidPackageId(package_id.to_string())),
        }
    }
}
