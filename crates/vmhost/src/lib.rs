//! VM Host - execution core of the smart-contract virtual machine.
//!
//! This crate provides:
//! - Storage engine with byte-diff gas costing and protected key namespaces
//! - Output accumulator with same-context and destination-context merge rules
//! - Gas schedule and metering
//! - Call-frame stacks and the call-depth governor
//! - Contract instance abstraction and validation gate
//! - ESDT token balance accessors
//! - Host configuration

pub mod blockchain;
pub mod call_stack;
pub mod config;
pub mod error;
pub mod esdt;
pub mod gas_metering;
pub mod host;
pub mod instance;
pub mod output;
pub mod runtime;
pub mod storage;
pub mod validator;
pub mod world;

pub use blockchain::{BlockchainHook, HookError, UserAccount};
pub use call_stack::{CallFrame, CallStack};
pub use config::VmHostConfig;
pub use error::VmError;
pub use gas_metering::{GasSchedule, GasTracker, MeteringContext};
pub use host::VmHost;
pub use instance::{
    ContractInstance, FunctionSignature, InstanceBuilder, NativeContract, NativeInstanceBuilder,
};
pub use output::OutputContext;
pub use runtime::RuntimeContext;
pub use storage::{ProtectionGuard, StorageContext, StorageEnv, StorageStatus};
pub use validator::ContractValidator;
pub use world::MockWorld;

/// VM version constant
pub const VM_VERSION: u32 = 1;

/// Maximum call depth
pub const MAX_CALL_DEPTH: usize = 64;

/// Maximum contract code size (128 KB)
pub const MAX_CODE_SIZE: usize = 128 * 1024;

/// Storage namespace no contract may write.
pub const DEFAULT_RESERVED_KEY_PREFIX: &str = "RESERVED";

/// Per-account namespace written only by built-in functions.
pub const DEFAULT_PROTECTED_KEY_PREFIX: &str = "VMHOST@";
