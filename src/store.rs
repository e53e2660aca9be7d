//! Housekeeping over the decompiled output tree and the exports directory.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;

use crate::{
    apk::{self, ApkError},
    config::{Config, InvalidPackageId},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    PackageId(InvalidPackageId),
    #[error("{0} has not been decompiled")]
    NotDecompiled(String),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error(transparent)]
    Archive(ApkError),
}

impl From<InvalidPackageId> for StoreError {
    fn from(e: InvalidPackageId) -> Self {
        StoreError::PackageId(e)
    }
}

impl From<ApkError> for StoreError {
    fn from(e: ApkError) -> Self {
        StoreError::Archive(e)
    }
}

fn io_at(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// One decompiled application found below the output root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredApp {
    pub package_id: String,
    pub file_count: usize,
    pub bytes: u64,
}

/// Whether `package_id` has an output directory with at least one entry.
pub fn is_decompiled(config: &Config, package_id: &str) -> Result<bool, StoreError> {
    let dir = config.output_dir(package_id)?;
    match fs::read_dir(&dir) {
        Ok(mut entries) => Ok(entries.next().is_some()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_at(&dir)(e)),
    }
}

/// Decompiled applications sorted by package id. A missing output root is an
/// empty store.
pub fn list(config: &Config) -> Result<Vec<StoredApp>, StoreError> {
    let root = &config.output_root;
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_at(root)(e)),
    };

    let mut apps = Vec::new();
    for entry in entries {
        let entry = entry.map_err(io_at(root))?;
        if !entry.file_type().map_err(io_at(&entry.path()))?.is_dir() {
            continue;
        }
        let package_id = entry.file_name().to_string_lossy().into_owned();
        let (file_count, bytes) = tally(&entry.path())?;
        apps.push(StoredApp {
            package_id,
            file_count,
            bytes,
        });
    }
    apps.sort_by(|a, b| a.package_id.cmp(&b.package_id));
    Ok(apps)
}

/// Removes one application's output. Returns whether there was anything to
/// remove.
pub fn delete(config: &Config, package_id: &str) -> Result<bool, StoreError> {
    let dir = config.output_dir(package_id)?;
    remove_tree(&dir)
}

/// Removes the whole output root.
pub fn clear_all(config: &Config) -> Result<bool, StoreError> {
    remove_tree(&config.output_root)
}

/// Bytes taken by all files below the output root.
pub fn total_size(config: &Config) -> Result<u64, StoreError> {
    if !config.output_root.exists() {
        return Ok(0);
    }
    Ok(tally(&config.output_root)?.1)
}

/// Zips one application's output to `exports_dir/<id>_decompiled.zip`,
/// replacing an earlier export.
pub fn export_app(config: &Config, package_id: &str) -> Result<PathBuf, StoreError> {
    let dir = config.output_dir(package_id)?;
    if !is_decompiled(config, package_id)? {
        return Err(StoreError::NotDecompiled(package_id.to_string()));
    }
    let exports = &config.exports_dir;
    fs::create_dir_all(exports).map_err(io_at(exports))?;
    let archive = exports.join(format!("{package_id}_decompiled.zip"));
    apk::export_directory(&dir, &archive)?;
    Ok(archive)
}

/// Copies the source archive to `exports_dir/<id>.apk`.
pub fn copy_archive(
    config: &Config,
    package_id: &str,
    archive: &Path,
) -> Result<PathBuf, StoreError> {
    config.output_dir(package_id)?;
    let exports = &config.exports_dir;
    fs::create_dir_all(exports).map_err(io_at(exports))?;
    let dest = exports.join(format!("{package_id}.apk"));
    fs::copy(archive, &dest).map_err(io_at(archive))?;
    log::info!("copied {} to {}", archive.display(), dest.display());
    Ok(dest)
}

fn remove_tree(dir: &Path) -> Result<bool, StoreError> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            log::info!("removed {}", dir.display());
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(io_at(dir)(e)),
    }
}

/// File count and total file size below `dir`.
fn tally(dir: &Path) -> Result<(usize, u64), StoreError> {
    let mut count = 0;
    let mut bytes = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|source| StoreError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            count += 1;
            bytes += entry
                .metadata()
                .map_err(|source| StoreError::Walk {
                    path: dir.to_path_buf(),
                    source,
                })?
                .len();
        }
    }
    Ok((count, bytes))
}
