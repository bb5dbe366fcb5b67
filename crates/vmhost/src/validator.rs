//! Contract validation gate, run on every instance before it executes.

use std::collections::HashSet;

use crate::error::VmError;
use crate::instance::ContractInstance;

/// Export allowed to have a non-void signature.
pub const ALLOCATOR_EXPORT: &str = "alloc";

/// Names no contract may export.
pub const PROTECTED_FUNCTION_NAMES: [&str; 5] = [
    "internalVMErrors",
    "transferValueOnly",
    "writeLog",
    "signalError",
    "completedTxEvent",
];

const MAX_FUNCTION_NAME_LEN: usize = 256;

/// Host API functions exposed to contracts.
pub const HOST_API_NAMES: [&str; 17] = [
    "storageStore",
    "storageLoad",
    "storageLoadFromAddress",
    "getArgument",
    "getNumArguments",
    "getCaller",
    "getSCAddress",
    "getCallValue",
    "finish",
    "transferValue",
    "writeLog",
    "useGas",
    "getGasLeft",
    "signalError",
    "setReadOnly",
    "executeOnSameContext",
    "executeOnDestContext",
];

/// Built-in functions handled by the host itself.
pub const BUILTIN_FUNCTION_NAMES: [&str; 3] = ["ESDTTransfer", "ESDTLocalMint", "ESDTBalance"];

#[derive(Debug, Clone)]
pub struct ContractValidator {
    reserved: HashSet<String>,
}

impl ContractValidator {
    /// Build a validator rejecting exports named in `reserved`.
    pub fn new<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: reserved.into_iter().map(Into::into).collect(),
        }
    }

    /// Validator reserving the host API and built-in function names.
    pub fn with_host_names() -> Self {
        Self::new(HOST_API_NAMES.into_iter().chain(BUILTIN_FUNCTION_NAMES))
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved.contains(name)
    }

    pub fn verify(&self, instance: &dyn ContractInstance) -> Result<(), VmError> {
        self.verify_memory_declaration(instance)?;
        self.verify_functions(instance)?;
        self.verify_protected_functions(instance)
    }

    pub fn verify_memory_declaration(&self, instance: &dyn ContractInstance) -> Result<(), VmError> {
        if !instance.has_memory() {
            return Err(VmError::MemoryDeclarationMissing);
        }
        Ok(())
    }

    pub fn verify_functions(&self, instance: &dyn ContractInstance) -> Result<(), VmError> {
        for name in instance.exports() {
            self.verify_function_name(&name)?;
            if name != ALLOCATOR_EXPORT {
                verify_void_function(instance, &name)?;
            }
        }
        Ok(())
    }

    pub fn verify_protected_functions(&self, instance: &dyn ContractInstance) -> Result<(), VmError> {
        let exports = instance.exports();
        if exports
            .iter()
            .any(|name| PROTECTED_FUNCTION_NAMES.contains(&name.as_str()))
        {
            return Err(VmError::ContractInvalid);
        }
        Ok(())
    }

    pub fn verify_function_name(&self, name: &str) -> Result<(), VmError> {
        let valid = !name.is_empty()
            && name.len() < MAX_FUNCTION_NAME_LEN
            && name.is_ascii()
            && !self.is_reserved(name);
        if !valid {
            return Err(VmError::InvalidFunctionName(name.to_string()));
        }
        Ok(())
    }
}

impl Default for ContractValidator {
    fn default() -> Self {
        Self::with_host_names()
    }
}

fn verify_void_function(instance: &dyn ContractInstance, name: &str) -> Result<(), VmError> {
    let signature = instance
        .signature(name)
        .ok_or_else(|| VmError::FunctionNotFound(name.to_string()))?;
    if !signature.is_void() {
        return Err(VmError::FunctionNonvoidSignature(name.to_string()));
    }
    Ok(())
}
