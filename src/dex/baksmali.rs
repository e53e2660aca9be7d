use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use super::{DexError, Disassembler, DisassemblyOptions};
use crate::config::DisassemblerConfig;

const STDERR_TAIL: usize = 2048;

/// Runs the `baksmali` command-line tool, either as an executable or as a
/// JAR through `java -jar`.
#[derive(Debug, Clone)]
pub struct Baksmali {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl Baksmali {
    pub fn new(program: impl Into<PathBuf>, leading_args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// Resolves the configured program on `PATH`. A `.jar` path is run with
    /// the `java` found on `PATH`.
    pub fn locate(config: &DisassemblerConfig) -> Result<Self, DexError> {
        let mut leading_args: Vec<OsString> = Vec::new();
        let program = if config.program.ends_with(".jar") {
            let java = which::which("java").map_err(|_| DexError::NotFound("java".into()))?;
            leading_args.push("-jar".into());
            leading_args.push(config.program.clone().into());
            java
        } else {
            which::which(&config.program)
                .map_err(|_| DexError::NotFound(config.program.clone()))?
        };
        leading_args.extend(config.args.iter().map(OsString::from));
        log::debug!("using disassembler {}", program.display());
        Ok(Self::new(program, leading_args))
    }

    pub fn arguments(
        &self,
        container: &Path,
        output_dir: &Path,
        options: &DisassemblyOptions,
    ) -> Vec<OsString> {
        let mut args = self.leading_args.clone();
        args.push(if options.deodex { "deodex" } else { "disassemble" }.into());
        args.push("--jobs".into());
        args.push(options.jobs.max(1).to_string().into());
        args.push("--output".into());
        args.push(output_dir.into());
        args.push("--parameter-registers".into());
        args.push(options.parameter_registers.to_string().into());
        if options.locals_directive {
            args.push("--use-locals".into());
        }
        if options.sequential_labels {
            args.push("--sequential-labels".into());
        }
        args.push("--debug-info".into());
        args.push(options.debug_info.to_string().into());
        if options.code_offsets {
            args.push("--code-offsets".into());
        }
        args.push("--accessor-comments".into());
        args.push(options.accessor_comments.to_string().into());
        args.push(container.into());
        args
    }
}

impl Disassembler for Baksmali {
    fn name(&self) -> &str {
        "baksmali"
    }

    fn disassemble(
        &self,
        container: &Path,
        output_dir: &Path,
        options: &DisassemblyOptions,
    ) -> Result<(), DexError> {
        let program = self.program.display().to_string();
        let output = Command::new(&self.program)
            .args(self.arguments(container, output_dir, options))
            .stdin(Stdio::null())
            .output()
            .map_err(|source| DexError::Launch {
                program: program.clone(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail_start = stderr.len().saturating_sub(STDERR_TAIL);
        let tail_start = (tail_start..stderr.len())
            .find(|i| stderr.is_char_boundary(*i))
            .unwrap_or(stderr.len());
        Err(DexError::Rejected {
            program,
            status: output.status.to_string(),
            stderr: stderr[tail_start..].trim().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_follow_options() {
        let baksmali = Baksmali::new("/usr/bin/java", vec!["-jar".into(), "baksmali.jar".into()]);
        let options = DisassemblyOptions {
            jobs: 4,
            ..Default::default()
        };
        let args = baksmali.arguments(Path::new("classes.dex"), Path::new("out"), &options);
        let args: Vec<_> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            [
                "-jar",
                "baksmali.jar",
                "disassemble",
                "--jobs",
                "4",
                "--output",
                "out",
                "--parameter-registers",
                "true",
                "--use-locals",
                "--sequential-labels",
                "--debug-info",
                "true",
                "--accessor-comments",
                "true",
                "classes.dex",
            ]
        );
    }

    #[test]
    fn deodex_switches_command() {
        let baksmali = Baksmali::new("baksmali", vec![]);
        let options = DisassemblyOptions {
            deodex: true,
            code_offsets: true,
            ..Default::default()
        };
        let args = baksmali.arguments(Path::new("a.dex"), Path::new("o"), &options);
        assert_eq!(args[0], "deodex");
        assert!(args.iter().any(|a| a == "--code-offsets"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let baksmali = Baksmali::new("false", vec![]);
        let err = baksmali
            .disassemble(
                &dir.path().join("classes.dex"),
                dir.path(),
                &DisassemblyOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, DexError::Rejected { .. }));
    }

    #[test]
    fn missing_tool_fails_to_launch() {
        let dir = tempfile::tempdir().unwrap();
        let baksmali = Baksmali::new(dir.path().join("no-such-tool"), vec![]);
        let err = baksmali
            .disassemble(
                &dir.path().join("classes.dex"),
                dir.path(),
                &DisassemblyOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, DexError::Launch { .. }));
    }
}
