//! VM Host Types - Plain data shared by the execution core and its callers.
//!
//! This crate provides:
//! - Addresses (32-byte, Bech32m encoded)
//! - Contract code metadata flags
//! - Contract call input
//! - Execution output (output accounts, storage updates, logs, return codes)

pub mod address;
pub mod code_metadata;
pub mod error;
pub mod input;
pub mod output;

pub use address::Address;
pub use code_metadata::CodeMetadata;
pub use error::TypesError;
pub use input::{CallType, ContractCallInput};
pub use output::{LogEntry, OutputAccount, ReturnCode, StorageUpdate, StorageUpdates, VmOutput};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Address, CallType, CodeMetadata, ContractCallInput, LogEntry, OutputAccount, ReturnCode,
        StorageUpdate, StorageUpdates, TypesError, VmOutput,
    };
}
