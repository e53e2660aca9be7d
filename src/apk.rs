//! Reading members out of an APK and packing output trees back into zips.

use std::{
    cmp::Ordering,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;
use thiserror::Error;
use walkdir::WalkDir;
use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

pub const CONTAINER_SUFFIX: &str = ".dex";
pub const MANIFEST_NAME: &str = "AndroidManifest.xml";
pub const RESOURCE_ROOT: &str = "res/";
pub const XML_SUFFIX: &str = ".xml";

const PREALLOC_LIMIT: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ApkError {
    #[error("Failed to read archive: {0}")]
    Zip(ZipError),
    #[error("I/O error: {0}")]
    Io(io::Error),
    #[error("Failed to walk output directory: {0}")]
    Walk(walkdir::Error),
}

impl From<ZipError> for ApkError {
    fn from(e: ZipError) -> Self {
        ApkError::Zip(e)
    }
}

impl From<io::Error> for ApkError {
    fn from(e: io::Error) -> Self {
        ApkError::Io(e)
    }
}

impl From<walkdir::Error> for ApkError {
    fn from(e: walkdir::Error) -> Self {
        ApkError::Walk(e)
    }
}

/// How a member is treated by a decompilation job, decided by name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemberKind {
    Directory,
    /// DEX bytecode handed to the disassembler.
    Container,
    Manifest,
    /// XML under the resource root, usually binary XML.
    ResourceXml,
    /// Copied through untouched.
    Opaque,
}

impl MemberKind {
    pub fn classify(name: &str) -> Self {
        if name.ends_with('/') {
            MemberKind::Directory
        } else if name.ends_with(CONTAINER_SUFFIX) {
            MemberKind::Container
        } else if name == MANIFEST_NAME {
            MemberKind::Manifest
        } else if name.starts_with(RESOURCE_ROOT) && name.ends_with(XML_SUFFIX) {
            MemberKind::ResourceXml
        } else {
            MemberKind::Opaque
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub index: usize,
    pub name: String,
    pub kind: MemberKind,
    pub size: u64,
    /// Relative output path, `None` when the name would escape the target
    /// directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContainer {
    pub name: String,
    pub path: PathBuf,
}

impl ExtractedContainer {
    pub fn file_name(&self) -> &str {
        file_name(&self.name)
    }
}

/// Orders container member names by file name, then by full name.
fn container_order(a: &str, b: &str) -> Ordering {
    file_name(a).cmp(file_name(b)).then_with(|| a.cmp(b))
}

fn file_name(member: &str) -> &str {
    member.rsplit('/').next().unwrap_or(member)
}

pub struct Apk {
    archive: ZipArchive<BufReader<File>>,
}

impl Apk {
    pub fn open(path: &Path) -> Result<Self, ApkError> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(BufReader::new(file))?;
        log::debug!("opened {} with {} members", path.display(), archive.len());
        Ok(Self { archive })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// All members in archive order.
    pub fn members(&mut self) -> Result<Vec<Member>, ApkError> {
        let mut members = Vec::with_capacity(self.archive.len());
        for index in 0..self.archive.len() {
            let file = self.archive.by_index(index)?;
            let name = file.name().to_string();
            let kind = if file.is_dir() {
                MemberKind::Directory
            } else {
                MemberKind::classify(&name)
            };
            members.push(Member {
                index,
                kind,
                size: file.size(),
                path: file.enclosed_name().map(|p| p.to_path_buf()),
                name,
            });
        }
        Ok(members)
    }

    /// Names of the DEX containers in processing order: by file name, so the
    /// primary `classes.dex` precedes `classes2.dex` and any nested container.
    pub fn container_names(&mut self) -> Result<Vec<String>, ApkError> {
        let mut names: Vec<String> = self
            .members()?
            .into_iter()
            .filter(|m| m.kind == MemberKind::Container)
            .map(|m| m.name)
            .collect();
        names.sort_by(|a, b| container_order(a, b));
        Ok(names)
    }

    /// Writes every DEX container below `dest`, keeping relative paths.
    pub fn extract_containers(&mut self, dest: &Path) -> Result<Vec<ExtractedContainer>, ApkError> {
        let mut extracted = Vec::new();
        for member in self.members()? {
            if member.kind != MemberKind::Container {
                continue;
            }
            let Some(relative) = member.path else {
                log::warn!("skipping container with unsafe name {}", member.name);
                continue;
            };
            let path = dest.join(relative);
            self.copy_member(member.index, &path)?;
            log::debug!("extracted {} ({} bytes)", member.name, member.size);
            extracted.push(ExtractedContainer {
                name: member.name,
                path,
            });
        }
        extracted.sort_by(|a, b| container_order(&a.name, &b.name));
        Ok(extracted)
    }

    pub fn read_member(&mut self, index: usize) -> Result<Vec<u8>, ApkError> {
        let mut file = self.archive.by_index(index)?;
        // The declared size is untrusted.
        let mut buf = Vec::with_capacity(file.size().min(PREALLOC_LIMIT) as usize);
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Streams a member to `dest`, creating parent directories.
    pub fn copy_member(&mut self, index: usize, dest: &Path) -> Result<u64, ApkError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = self.archive.by_index(index)?;
        let mut out = BufWriter::new(File::create(dest)?);
        let written = io::copy(&mut file, &mut out)?;
        out.flush()?;
        Ok(written)
    }
}

/// Packs the files below `dir` into a deflated zip at `archive`, entries keyed
/// by `/`-separated relative path. Returns the number of entries written.
pub fn export_directory(dir: &Path, archive: &Path) -> Result<usize, ApkError> {
    let parent = archive
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let target = fs::canonicalize(parent)
        .map(|parent| parent.join(archive.file_name().unwrap_or_default()))
        .unwrap_or_else(|_| archive.to_path_buf());
    let mut writer = ZipWriter::new(BufWriter::new(File::create(archive)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let root = fs::canonicalize(dir)?;

    let mut count = 0;
    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.path() == target {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, options)?;
        io::copy(&mut File::open(entry.path())?, &mut writer)?;
        count += 1;
    }
    writer.finish()?.flush()?;
    log::info!("exported {count} files from {} to {}", dir.display(), archive.display());
    Ok(count)
}

#[cfg(test)]
pub(crate) fn write_test_archive(path: &Path, members: &[(&str, &[u8])]) {
    let mut writer = ZipWriter::new(File::create(path).unwrap());
    let options = SimpleFileOptions::default();
    for (name, data) in members {
        if name.ends_with('/') {
            writer.add_directory(*name, options).unwrap();
        } else {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap();
}
