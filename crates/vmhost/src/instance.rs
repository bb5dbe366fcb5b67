//! Contract instances.
//!
//! The host never interprets bytecode itself. An `InstanceBuilder` turns code
//! bytes into a `ContractInstance`, which the validator inspects and the host
//! then calls into. `NativeInstanceBuilder` is the in-process adapter: code
//! bytes name a registered set of Rust closures.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::VmError;
use crate::host::VmHost;

/// Arity of an exported function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionSignature {
    pub input_arity: usize,
    pub output_arity: usize,
}

impl FunctionSignature {
    pub fn is_void(&self) -> bool {
        self.input_arity == 0 && self.output_arity == 0
    }
}

/// An instantiated contract.
pub trait ContractInstance {
    /// Whether the contract declares a linear memory.
    fn has_memory(&self) -> bool;

    /// Names of exported functions.
    fn exports(&self) -> Vec<String>;

    fn signature(&self, name: &str) -> Option<FunctionSignature>;

    /// Run `function` against the host.
    fn call(&self, host: &mut VmHost, function: &str) -> Result<(), VmError>;
}

/// Turns code bytes into an instance.
pub trait InstanceBuilder: Send + Sync {
    fn instantiate(&self, code: &[u8]) -> Result<Box<dyn ContractInstance>, VmError>;
}

/// Body of a native contract function.
pub type NativeFunction = Arc<dyn Fn(&mut VmHost) -> Result<(), VmError> + Send + Sync>;

/// A contract made of Rust closures.
#[derive(Clone)]
pub struct NativeContract {
    functions: BTreeMap<String, NativeFunction>,
    signatures: BTreeMap<String, FunctionSignature>,
    has_memory: bool,
}

impl NativeContract {
    pub fn new() -> Self {
        Self {
            functions: BTreeMap::new(),
            signatures: BTreeMap::new(),
            has_memory: true,
        }
    }

    /// Export a void function.
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&mut VmHost) -> Result<(), VmError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    /// Override the reported signature of an export.
    pub fn with_signature(mut self, name: impl Into<String>, signature: FunctionSignature) -> Self {
        self.signatures.insert(name.into(), signature);
        self
    }

    /// Report no memory declaration.
    pub fn without_memory(mut self) -> Self {
        self.has_memory = false;
        self
    }
}

impl Default for NativeContract {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NativeContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeContract")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("signatures", &self.signatures)
            .field("has_memory", &self.has_memory)
            .finish()
    }
}

impl ContractInstance for NativeContract {
    fn has_memory(&self) -> bool {
        self.has_memory
    }

    fn exports(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        for name in self.signatures.keys() {
            if !self.functions.contains_key(name) {
                names.push(name.clone());
            }
        }
        names
    }

    fn signature(&self, name: &str) -> Option<FunctionSignature> {
        if let Some(signature) = self.signatures.get(name) {
            return Some(*signature);
        }
        self.functions
            .contains_key(name)
            .then(FunctionSignature::default)
    }

    fn call(&self, host: &mut VmHost, function: &str) -> Result<(), VmError> {
        let body = self
            .functions
            .get(function)
            .cloned()
            .ok_or_else(|| VmError::FunctionNotFound(function.to_string()))?;
        body(host)
    }
}

/// Registry of native contracts keyed by their code bytes.
#[derive(Debug, Default)]
pub struct NativeInstanceBuilder {
    contracts: RwLock<HashMap<Vec<u8>, NativeContract>>,
}

impl NativeInstanceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `contract` under `code`. Deploying `code` on an account makes
    /// that account run `contract`.
    pub fn register(&self, code: impl Into<Vec<u8>>, contract: NativeContract) {
        self.contracts.write().insert(code.into(), contract);
    }
}

impl InstanceBuilder for NativeInstanceBuilder {
    fn instantiate(&self, code: &[u8]) -> Result<Box<dyn ContractInstance>, VmError> {
        let contract = self
            .contracts
            .read()
            .get(code)
            .cloned()
            .ok_or(VmError::ContractInvalid)?;
        Ok(Box::new(contract))
    }
}
