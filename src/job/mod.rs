//! End-to-end decompilation of one APK.
//!
//! A job extracts the DEX containers into a private temporary area, hands
//! each one to a [`Disassembler`] in name order, then decodes the manifest and
//! resource XML and copies every other member into the output tree. Progress
//! is reported through a caller-supplied sink and cancellation is polled
//! between containers and members, never while a container is being
//! disassembled.

mod cancel;
mod event;
mod service;

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use walkdir::WalkDir;

pub use self::{
    cancel::CancellationToken,
    event::{DecompileEvent, Outcome, Progress},
    service::{Decompiler, JobHandle},
};
use crate::{
    apk::{Apk, MemberKind},
    axml::{self, AxmlError},
    config::Config,
    dex::{Disassembler, DisassemblyOptions},
    errors::{IoContext, JobError},
};

/// The application a job is run for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppDescriptor {
    pub package_id: String,
    pub archive_path: PathBuf,
    pub size: u64,
    pub display_name: String,
}

impl AppDescriptor {
    /// Describes the archive at `path`. Without an explicit id the file stem
    /// is used as package id and display name.
    pub fn from_archive(path: &Path, package_id: Option<String>) -> Result<Self, JobError> {
        let size = fs::metadata(path).at(path)?.len();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string());
        Ok(Self {
            package_id: package_id.unwrap_or_else(|| stem.clone()),
            archive_path: path.to_path_buf(),
            size,
            display_name: stem,
        })
    }
}

/// Working parameters resolved for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecompileJob {
    pub source_archive: PathBuf,
    pub output_dir: PathBuf,
    pub size_limit: u64,
    pub work_dir: PathBuf,
}

impl DecompileJob {
    /// Fails when the package id cannot name a directory below the output root.
    pub fn new(app: &AppDescriptor, config: &Config) -> Result<Self, JobError> {
        Ok(Self {
            source_archive: app.archive_path.clone(),
            output_dir: config.output_dir(&app.package_id)?,
            size_limit: config.size_limit,
            work_dir: config.work_dir.clone(),
        })
    }
}

/// Runs a job to completion on the calling thread. Emits `Starting`, any
/// number of `Progress` events and exactly one trailing `Finished`.
pub fn run(
    app: &AppDescriptor,
    config: &Config,
    disassembler: &dyn Disassembler,
    cancel: &CancellationToken,
    mut emit: impl FnMut(DecompileEvent),
) -> Outcome {
    emit(DecompileEvent::Starting);
    log::info!("decompiling {} ({})", app.display_name, app.package_id);

    let mut options = DisassemblyOptions::default();
    if let Some(jobs) = config.disassembler.jobs {
        options.jobs = jobs;
    }

    let outcome = match DecompileJob::new(app, config)
        .and_then(|job| execute(app, &job, disassembler, &options, cancel, &mut emit))
    {
        Ok(outcome) => outcome,
        Err(JobError::Cancelled) => {
            log::info!("{} cancelled", app.package_id);
            Outcome::Cancelled
        }
        Err(e) => {
            log::error!("{} failed: {e}", app.package_id);
            Outcome::Error {
                message: e.to_string(),
            }
        }
    };
    emit(DecompileEvent::Finished(outcome.clone()));
    outcome
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), JobError> {
    if cancel.is_cancelled() {
        Err(JobError::Cancelled)
    } else {
        Ok(())
    }
}

fn execute(
    app: &AppDescriptor,
    job: &DecompileJob,
    disassembler: &dyn Disassembler,
    options: &DisassemblyOptions,
    cancel: &CancellationToken,
    emit: &mut impl FnMut(DecompileEvent),
) -> Result<Outcome, JobError> {
    if app.size > job.size_limit {
        return Err(JobError::TooLarge {
            size: app.size,
            limit: job.size_limit,
        });
    }
    checkpoint(cancel)?;

    let output_dir = &job.output_dir;
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).at(output_dir)?;
    }
    fs::create_dir_all(output_dir).at(output_dir)?;

    emit(DecompileEvent::Progress(Progress::new(
        "Extracting DEX files...",
        0,
        0,
    )));
    fs::create_dir_all(&job.work_dir).at(&job.work_dir)?;
    // Removed on drop, whichever way this function returns.
    let scratch = tempfile::Builder::new()
        .prefix("apkdecomp-")
        .tempdir_in(&job.work_dir)
        .at(&job.work_dir)?;

    let mut apk = Apk::open(&job.source_archive)?;
    let containers = apk.extract_containers(scratch.path())?;
    checkpoint(cancel)?;

    let mut counts = Vec::with_capacity(containers.len());
    for container in &containers {
        counts.push(disassembler.class_count(&container.path)?);
    }
    let total: usize = counts.iter().sum();
    emit(DecompileEvent::Progress(Progress::new(
        format!("Found {total} classes"),
        0,
        total,
    )));

    let mut completed = 0;
    for (container, classes) in containers.iter().zip(counts) {
        checkpoint(cancel)?;
        let name = container.file_name();
        emit(DecompileEvent::Progress(Progress::new(
            format!("Decompiling {name}..."),
            completed,
            total,
        )));
        log::debug!("{} disassembling {name} ({classes} classes)", disassembler.name());
        disassembler
            .disassemble(&container.path, output_dir, options)
            .map_err(|source| JobError::Disassembly {
                container: name.to_string(),
                source,
            })?;
        completed += classes;
        emit(DecompileEvent::Progress(Progress::new(
            format!("Completed {name}"),
            completed,
            total,
        )));
        if let Err(e) = fs::remove_file(&container.path) {
            log::debug!("could not remove {}: {e}", container.path.display());
        }
    }

    checkpoint(cancel)?;
    emit(DecompileEvent::Progress(Progress::new(
        "Extracting AndroidManifest.xml and resources...",
        completed,
        total,
    )));
    extract_members(&mut apk, output_dir, cancel)?;

    let file_count = count_files(output_dir);
    log::info!(
        "{} decompiled into {} ({file_count} files)",
        app.package_id,
        output_dir.display()
    );
    Ok(Outcome::Success {
        output_dir: output_dir.clone(),
        file_count,
    })
}

/// Writes every non-container member below `output_dir`: the manifest and
/// binary resource XML decoded to text (partial text plus an error comment
/// when a document breaks off), everything else byte for byte.
fn extract_members(
    apk: &mut Apk,
    output_dir: &Path,
    cancel: &CancellationToken,
) -> Result<(), JobError> {
    for member in apk.members()? {
        if matches!(member.kind, MemberKind::Directory | MemberKind::Container) {
            continue;
        }
        checkpoint(cancel)?;
        let Some(relative) = &member.path else {
            log::warn!("skipping member with unsafe name {}", member.name);
            continue;
        };
        let dest = output_dir.join(relative);
        match member.kind {
            MemberKind::Manifest => {
                let buf = apk.read_member(member.index)?;
                write_text(&dest, &axml::decode(&buf))?;
            }
            MemberKind::ResourceXml => {
                let buf = apk.read_member(member.index)?;
                match axml::try_decode(&buf) {
                    Ok(text) => write_text(&dest, &text)?,
                    // Plain-text XML stays as it is.
                    Err(AxmlError::BadMagic(_)) => {
                        log::debug!("copying {} verbatim", member.name);
                        apk.copy_member(member.index, &dest)?;
                    }
                    Err(e) => {
                        log::warn!("{}: {e}", member.name);
                        write_text(&dest, &axml::decode(&buf))?;
                    }
                }
            }
            _ => {
                apk.copy_member(member.index, &dest)?;
            }
        }
    }
    Ok(())
}

fn write_text(dest: &Path, text: &str) -> Result<(), JobError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at(parent)?;
    }
    fs::write(dest, text).at(dest)
}

fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count()
}
