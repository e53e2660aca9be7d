use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    sync::Arc,
};

use apkdecomp::{
    apk::{self, ApkError},
    axml, store, AppDescriptor, Baksmali, Config, DecompileEvent, Decompiler, JobError, Outcome,
    StoreError,
};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

const MB: f64 = 1024.0 * 1024.0;

#[derive(Parser, Debug)]
#[command(name = "apkdecomp", about = "Android binary XML decoder and APK decompiler", version)]
struct Cli {
    /// log filter (trace, debug, info, warn, error or an env-filter directive)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    cmd: Command,
}

/// Overrides applied on top of the configuration file.
#[derive(Args, Debug)]
struct Settings {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,
    #[arg(long, global = true)]
    exports_dir: Option<PathBuf>,
}

impl Settings {
    fn load(self) -> Result<Config, CliError> {
        let mut config = match self.config {
            Some(path) => Config::load(&path).map_err(JobError::from)?,
            None => Config::default(),
        };
        if let Some(root) = self.output_root {
            config.output_root = root;
        }
        if let Some(dir) = self.exports_dir {
            config.exports_dir = dir;
        }
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a binary XML file to text
    Decode {
        input: PathBuf,
        /// write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Disassemble an APK and decode its manifest and resources
    Decompile {
        apk: PathBuf,
        /// package id naming the output directory; defaults to the file stem
        #[arg(long)]
        package: Option<String>,
        /// print events as JSON lines on stdout
        #[arg(long)]
        json: bool,
    },
    /// Zip a directory
    Export { dir: PathBuf, archive: PathBuf },
    /// Zip a decompiled package into the exports directory
    ExportApp { package: String },
    /// Copy an APK into the exports directory
    CopyApk {
        apk: PathBuf,
        #[arg(long)]
        package: Option<String>,
    },
    /// List decompiled packages
    List {
        #[arg(long)]
        json: bool,
    },
    /// Remove one package's output, or all output when no package is given
    Clean { package: Option<String> },
    /// Show the space taken by decompiled output
    Usage,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Archive(#[from] ApkError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Stdout(io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_level))
        .with_writer(io::stderr)
        .try_init();

    match execute(cli.cmd, cli.settings) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cmd: Command, settings: Settings) -> Result<ExitCode, CliError> {
    match cmd {
        Command::Decode { input, output } => {
            let buf = fs::read(&input).map_err(|source| CliError::Io {
                path: input.clone(),
                source,
            })?;
            let text = axml::decode(&buf);
            match output {
                Some(path) => fs::write(&path, text).map_err(|source| CliError::Io { path, source })?,
                None => io::stdout()
                    .write_all(text.as_bytes())
                    .and_then(|_| writeln!(io::stdout()))
                    .map_err(CliError::Stdout)?,
            }
        }
        Command::Decompile { apk, package, json } => {
            let config = settings.load()?;
            let disassembler = Baksmali::locate(&config.disassembler).map_err(JobError::from)?;
            let app = AppDescriptor::from_archive(&apk, package)?;
            let service = Decompiler::new(config, Arc::new(disassembler));
            let handle = service.spawn(app)?;

            for event in handle.events().iter() {
                report(&event, json)?;
            }
            return Ok(match handle.wait() {
                Outcome::Success { .. } => ExitCode::SUCCESS,
                Outcome::Cancelled => ExitCode::from(130),
                Outcome::Error { .. } => ExitCode::FAILURE,
            });
        }
        Command::Export { dir, archive } => {
            let count = apk::export_directory(&dir, &archive)?;
            println!("{count} files written to {}", archive.display());
        }
        Command::ExportApp { package } => {
            let archive = store::export_app(&settings.load()?, &package)?;
            println!("{}", archive.display());
        }
        Command::CopyApk { apk, package } => {
            let config = settings.load()?;
            let app = AppDescriptor::from_archive(&apk, package)?;
            let dest = store::copy_archive(&config, &app.package_id, &apk)?;
            println!("{}", dest.display());
        }
        Command::List { json } => {
            let apps = store::list(&settings.load()?)?;
            if json {
                println!("{}", serde_json::to_string(&apps)?);
            } else {
                for app in apps {
                    println!(
                        "{:<40} {:>8} files {:>10.2} MB",
                        app.package_id,
                        app.file_count,
                        app.bytes as f64 / MB
                    );
                }
            }
        }
        Command::Clean { package } => {
            let config = settings.load()?;
            let removed = match &package {
                Some(id) => store::delete(&config, id)?,
                None => store::clear_all(&config)?,
            };
            if !removed {
                log::info!("nothing to remove");
            }
        }
        Command::Usage => {
            let bytes = store::total_size(&settings.load()?)?;
            println!("{bytes} bytes ({:.2} MB)", bytes as f64 / MB);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn report(event: &DecompileEvent, json: bool) -> Result<(), CliError> {
    if json {
        let line = serde_json::to_string(event)?;
        writeln!(io::stdout(), "{line}").map_err(CliError::Stdout)?;
        return Ok(());
    }
    match event {
        DecompileEvent::Starting => log::info!("starting"),
        DecompileEvent::Progress(p) => log::info!("[{:>3}%] {}", p.percentage(), p.label),
        DecompileEvent::Finished(Outcome::Success {
            output_dir,
            file_count,
        }) => println!("{file_count} files written to {}", output_dir.display()),
        DecompileEvent::Finished(Outcome::Error { message }) => log::error!("{message}"),
        DecompileEvent::Finished(Outcome::Cancelled) => log::warn!("cancelled"),
    }
    Ok(())
}
