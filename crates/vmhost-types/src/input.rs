//! Contract call input.

use crate::address::Address;
use bytes::Bytes;
use num_bigint::BigUint;

/// How a call was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallType {
    /// Top-level transaction call.
    #[default]
    DirectCall,
    /// Nested call sharing the caller's storage and output state.
    ExecuteOnSameContext,
    /// Nested call running in isolation, merged into the caller on success.
    ExecuteOnDestContext,
}

/// Input of a contract call, top-level or nested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCallInput {
    pub caller: Address,
    pub recipient: Address,
    pub function: String,
    pub arguments: Vec<Bytes>,
    pub call_value: BigUint,
    pub call_type: CallType,
    pub gas_provided: u64,
}

impl ContractCallInput {
    /// Create a direct call with no arguments and no value.
    pub fn new(
        caller: Address,
        recipient: Address,
        function: impl Into<String>,
        gas_provided: u64,
    ) -> Self {
        Self {
            caller,
            recipient,
            function: function.into(),
            arguments: Vec::new(),
            call_value: BigUint::default(),
            call_type: CallType::DirectCall,
            gas_provided,
        }
    }

    /// Append an argument.
    pub fn with_argument(mut self, arg: impl Into<Bytes>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Set value.
    pub fn with_value(mut self, value: impl Into<BigUint>) -> Self {
        self.call_value = value.into();
        self
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }
}
