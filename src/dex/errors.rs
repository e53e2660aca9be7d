use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DexError {
    #[error("failed to read DEX container {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
    #[error("disassembler `{0}` not found")]
    NotFound(String),
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Rejected {
        program: String,
        status: String,
        stderr: String,
    },
}
