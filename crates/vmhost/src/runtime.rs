//! Runtime context: the input of the running call and its execution mode.

use bytes::Bytes;
use num_bigint::BigUint;
use vmhost_types::{Address, CallType, ContractCallInput};

use crate::error::VmError;

#[derive(Debug, Clone)]
struct RuntimeState {
    vm_input: ContractCallInput,
    read_only: bool,
}

/// Input and mode of the running call, with the callers' saved on a stack.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    vm_input: ContractCallInput,
    read_only: bool,
    state_stack: Vec<RuntimeState>,
}

impl RuntimeContext {
    pub fn new() -> Self {
        Self {
            vm_input: ContractCallInput::new(Address::ZERO, Address::ZERO, "", 0),
            read_only: false,
            state_stack: Vec::new(),
        }
    }

    /// Start a top-level call.
    pub fn init_state_from_input(&mut self, input: ContractCallInput) {
        self.vm_input = input;
        self.read_only = false;
        self.state_stack.clear();
    }

    /// Switch to a nested call's input. Read-only mode carries over.
    pub fn init_state_from_nested_input(&mut self, input: ContractCallInput) {
        self.vm_input = input;
    }

    pub fn push_state(&mut self) {
        self.state_stack.push(RuntimeState {
            vm_input: self.vm_input.clone(),
            read_only: self.read_only,
        });
    }

    pub fn pop_set_active_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.vm_input = state.vm_input;
            self.read_only = state.read_only;
        }
    }

    pub fn state_stack_len(&self) -> usize {
        self.state_stack.len()
    }

    pub fn vm_input(&self) -> &ContractCallInput {
        &self.vm_input
    }

    pub fn caller(&self) -> &Address {
        &self.vm_input.caller
    }

    /// Address of the contract whose code is running.
    pub fn sc_address(&self) -> &Address {
        &self.vm_input.recipient
    }

    pub fn function(&self) -> &str {
        &self.vm_input.function
    }

    pub fn call_value(&self) -> &BigUint {
        &self.vm_input.call_value
    }

    pub fn call_type(&self) -> CallType {
        self.vm_input.call_type
    }

    pub fn arguments(&self) -> &[Bytes] {
        &self.vm_input.arguments
    }

    pub fn argument(&self, index: usize) -> Result<&Bytes, VmError> {
        self.vm_input
            .arguments
            .get(index)
            .ok_or(VmError::ArgumentIndexOutOfRange(index))
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

impl Default for RuntimeContext {
    fn default() -> Self {
        Self::new()
    }
}
