//! Boundary to the external bytecode disassembler.

mod baksmali;
mod errors;

use std::{num::NonZeroUsize, path::Path, thread};

use ::dex::DexReader;
use serde::{Deserialize, Serialize};

pub use self::{baksmali::Baksmali, errors::DexError};

/// Fixed set of switches handed to the disassembler for every container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisassemblyOptions {
    pub parameter_registers: bool,
    pub locals_directive: bool,
    pub sequential_labels: bool,
    pub debug_info: bool,
    pub accessor_comments: bool,
    pub code_offsets: bool,
    pub deodex: bool,
    /// Worker threads the disassembler may use for one container.
    pub jobs: usize,
}

impl Default for DisassemblyOptions {
    fn default() -> Self {
        Self {
            parameter_registers: true,
            locals_directive: true,
            sequential_labels: true,
            debug_info: true,
            accessor_comments: true,
            code_offsets: false,
            deodex: false,
            jobs: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        }
    }
}

/// Turns one DEX container into smali sources under an output directory.
pub trait Disassembler: Send + Sync {
    fn name(&self) -> &str;

    /// Number of classes defined in `container`, used to size progress.
    fn class_count(&self, container: &Path) -> Result<usize, DexError> {
        count_classes(container)
    }

    fn disassemble(
        &self,
        container: &Path,
        output_dir: &Path,
        options: &DisassemblyOptions,
    ) -> Result<(), DexError>;
}

/// Counts the class definitions of a DEX file.
pub fn count_classes(container: &Path) -> Result<usize, DexError> {
    let dex = DexReader::from_file(container).map_err(|e| DexError::Read {
        path: container.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(dex.classes().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_fixed_configuration() {
        let options = DisassemblyOptions::default();
        assert!(options.parameter_registers);
        assert!(options.locals_directive);
        assert!(options.sequential_labels);
        assert!(options.debug_info);
        assert!(options.accessor_comments);
        assert!(!options.code_offsets);
        assert!(!options.deodex);
        assert!(options.jobs >= 1);
    }

    #[test]
    fn counting_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.dex");
        std::fs::write(&path, b"not a dex file at all").unwrap();
        assert!(matches!(count_classes(&path), Err(DexError::Read { .. })));
    }
}
