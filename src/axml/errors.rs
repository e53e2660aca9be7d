use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AxmlError {
    #[error("not a valid Android binary XML file (magic {0:#010x})")]
    BadMagic(u32),
    #[error("unexpected end of data at offset {offset}, needed {needed} bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("seek to offset {target} is past the end of a {len} byte buffer")]
    SeekOutOfBounds { target: usize, len: usize },
    #[error("chunk at offset {offset} declares invalid size {size}")]
    InvalidChunkSize { offset: usize, size: u32 },
}
