//! Decoding of Android binary XML and orchestration of APK decompilation.
//!
//! [`axml`] turns compiled XML resources back into text. [`job`] drives a
//! whole APK through an external [`dex::Disassembler`], reporting progress
//! and honouring cancellation. [`store`] manages what earlier jobs left in
//! the output root.

pub mod apk;
pub mod axml;
pub mod config;
pub mod dex;
pub mod errors;
pub mod job;
pub mod store;

pub use self::axml::{decode, try_decode, AxmlError};
pub use self::config::Config;
pub use self::dex::{Baksmali, Disassembler, DisassemblyOptions};
pub use self::errors::JobError;
pub use self::store::{StoreError, StoredApp};
pub use self::job::{
    run, AppDescriptor, CancellationToken, DecompileEvent, Decompiler, JobHandle, Outcome,
    Progress,
};
