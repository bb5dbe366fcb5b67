use thiserror::Error;
use vmhost_types::ReturnCode;

use crate::blockchain::HookError;

/// Errors that can occur during VM host execution.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("Out of gas: used {used}, limit {limit}")]
    OutOfGas { used: u64, limit: u64 },

    #[error("Cannot write storage in read-only mode")]
    WriteOnReadOnly,

    #[error("Cannot store under the reserved key prefix")]
    StoreReservedKey,

    #[error("Cannot write to protected key")]
    CannotWriteProtectedKey,

    #[error("Reserved key prefix must not be empty")]
    EmptyReservedKeyPrefix,

    #[error("Protected key prefix must not be empty")]
    EmptyProtectedKeyPrefix,

    #[error("Call depth exceeded: {depth}")]
    CallDepthExceeded { depth: usize },

    #[error("Code size exceeded: {size} > {limit}")]
    CodeSizeExceeded { size: usize, limit: usize },

    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    #[error("Contract invalid")]
    ContractInvalid,

    #[error("Invalid function name: {0}")]
    InvalidFunctionName(String),

    #[error("Function has non-void signature: {0}")]
    FunctionNonvoidSignature(String),

    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    #[error("Memory declaration missing")]
    MemoryDeclarationMissing,

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: String, required: String },

    #[error("Argument index out of range: {0}")]
    ArgumentIndexOutOfRange(usize),

    #[error("User error: {0}")]
    UserError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Hook(#[from] HookError),
}

impl From<&VmError> for ReturnCode {
    fn from(err: &VmError) -> Self {
        match err {
            VmError::OutOfGas { .. } => ReturnCode::OutOfGas,
            VmError::CallDepthExceeded { .. } => ReturnCode::CallStackOverFlow,
            VmError::ContractNotFound(_) => ReturnCode::ContractNotFound,
            VmError::ContractInvalid
            | VmError::InvalidFunctionName(_)
            | VmError::MemoryDeclarationMissing
            | VmError::CodeSizeExceeded { .. } => ReturnCode::ContractInvalid,
            VmError::FunctionNonvoidSignature(_) => ReturnCode::FunctionWrongSignature,
            VmError::FunctionNotFound(_) => ReturnCode::FunctionNotFound,
            VmError::InsufficientFunds { .. } => ReturnCode::OutOfFunds,
            VmError::WriteOnReadOnly
            | VmError::StoreReservedKey
            | VmError::CannotWriteProtectedKey
            | VmError::ArgumentIndexOutOfRange(_)
            | VmError::UserError(_) => ReturnCode::UserError,
            VmError::EmptyReservedKeyPrefix
            | VmError::EmptyProtectedKeyPrefix
            | VmError::ExecutionFailed(_)
            | VmError::InvalidConfig(_)
            | VmError::Hook(_) => ReturnCode::ExecutionFailed,
        }
    }
}
