//! The VM host.
//!
//! Owns every execution context for the transaction in flight and exposes the
//! API contracts call into. Nested calls push a frame on each context, run the
//! callee, then merge or revert depending on the outcome and the call type.

use std::sync::Arc;

use bytes::Bytes;
use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use vmhost_types::{Address, CallType, ContractCallInput, LogEntry, VmOutput};

use crate::blockchain::BlockchainHook;
use crate::call_stack::CallStack;
use crate::config::VmHostConfig;
use crate::error::VmError;
use crate::gas_metering::MeteringContext;
use crate::instance::InstanceBuilder;
use crate::output::OutputContext;
use crate::runtime::RuntimeContext;
use crate::storage::{StorageContext, StorageEnv, StorageStatus};
use crate::validator::ContractValidator;

pub struct VmHost {
    config: VmHostConfig,
    blockchain: Arc<dyn BlockchainHook>,
    builder: Arc<dyn InstanceBuilder>,
    validator: ContractValidator,
    pub(crate) storage: StorageContext,
    pub(crate) output: OutputContext,
    pub(crate) metering: MeteringContext,
    pub(crate) runtime: RuntimeContext,
    call_stack: CallStack,
}

impl VmHost {
    pub fn new(
        config: VmHostConfig,
        blockchain: Arc<dyn BlockchainHook>,
        builder: Arc<dyn InstanceBuilder>,
    ) -> Result<Self, VmError> {
        let storage = StorageContext::new(
            blockchain.clone(),
            config.reserved_key_prefix.as_bytes(),
            config.protected_key_prefix.as_bytes(),
        )?;
        config
            .validate()
            .map_err(|e| VmError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            metering: MeteringContext::new(config.gas_schedule, 0),
            call_stack: CallStack::with_max_depth(config.max_call_depth),
            validator: ContractValidator::with_host_names(),
            output: OutputContext::new(),
            runtime: RuntimeContext::new(),
            storage,
            config,
            blockchain,
            builder,
        })
    }

    /// Replace the validator gate.
    pub fn with_validator(mut self, validator: ContractValidator) -> Self {
        self.validator = validator;
        self
    }

    pub fn config(&self) -> &VmHostConfig {
        &self.config
    }

    pub fn storage(&self) -> &StorageContext {
        &self.storage
    }

    pub fn output(&self) -> &OutputContext {
        &self.output
    }

    pub fn metering(&self) -> &MeteringContext {
        &self.metering
    }

    pub fn runtime(&self) -> &RuntimeContext {
        &self.runtime
    }

    pub fn call_stack(&self) -> &CallStack {
        &self.call_stack
    }

    /// Execute a top-level contract call. Contract failures are reported
    /// through the output's return code, never as an `Err`.
    pub fn run_contract_call(&mut self, input: ContractCallInput) -> VmOutput {
        self.init_state(&input);
        tracing::debug!(
            "Running {:?}::{} with {} gas",
            input.recipient,
            input.function,
            input.gas_provided
        );

        let vm_output = match self.execute_top_level(&input) {
            Ok(()) => self
                .output
                .create_vm_output(self.metering.gas_left(), self.metering.gas_freed()),
            Err(err) => {
                tracing::warn!("Contract call {} failed: {}", input.function, err);
                OutputContext::create_failed_vm_output(&err)
            }
        };

        self.clear_state_stacks();
        vm_output
    }

    fn init_state(&mut self, input: &ContractCallInput) {
        self.output.init_state();
        self.metering.init_state(input.gas_provided);
        self.storage.init_state();
        self.storage.set_address(input.recipient);
        self.runtime.init_state_from_input(input.clone());
        self.call_stack.reset();
    }

    fn clear_state_stacks(&mut self) {
        while self.storage.state_stack_len() > 0 {
            self.storage.pop_discard();
        }
        while self.output.state_stack_len() > 0 {
            self.output.pop_discard();
        }
        while self.metering.state_stack_len() > 0 {
            self.metering.pop_discard();
        }
        while self.runtime.state_stack_len() > 0 {
            self.runtime.pop_set_active_state();
        }
        self.call_stack.reset();
    }

    fn execute_top_level(&mut self, input: &ContractCallInput) -> Result<(), VmError> {
        self.call_stack
            .enter(input.recipient, input.caller, input.call_type)?;
        self.transfer_call_value(&input.caller, &input.recipient, &input.call_value)?;
        self.execute_contract_code(input)
    }

    /// Load, charge for, instantiate, validate and run the recipient's code.
    fn execute_contract_code(&mut self, input: &ContractCallInput) -> Result<(), VmError> {
        let code = self.blockchain.get_code(&input.recipient)?;
        if code.is_empty() {
            return Err(VmError::ContractNotFound(input.recipient.to_string()));
        }
        if code.len() > self.config.max_code_size {
            return Err(VmError::CodeSizeExceeded {
                size: code.len(),
                limit: self.config.max_code_size,
            });
        }

        self.metering.charge(self.metering.compile_cost(code.len()))?;
        let instance = self.builder.instantiate(&code)?;
        if let Err(err) = self.validator.verify(instance.as_ref()) {
            tracing::warn!("Contract {:?} rejected: {}", input.recipient, err);
            return Err(err);
        }

        instance.call(self, &input.function)
    }

    fn transfer_call_value(
        &mut self,
        sender: &Address,
        receiver: &Address,
        value: &BigUint,
    ) -> Result<(), VmError> {
        if value.is_zero() {
            return Ok(());
        }
        self.load_balance(sender)?;
        self.output.transfer(sender, receiver, value)
    }

    /// Make the ledger balance of `address` known to the output, once.
    fn load_balance(&mut self, address: &Address) -> Result<(), VmError> {
        let (known, _) = self.output.balance_view(address);
        if known.is_some() {
            return Ok(());
        }

        let balance = self
            .blockchain
            .get_user_account(address)?
            .map(|account| account.balance)
            .unwrap_or_default();
        let (account, _) = self.output.get_output_account(address);
        account.balance = Some(BigInt::from(balance));
        Ok(())
    }

    /// Run a nested call sharing the caller's storage and output.
    pub fn execute_on_same_context(&mut self, input: ContractCallInput) -> Result<(), VmError> {
        self.execute_nested(input, CallType::ExecuteOnSameContext)
    }

    /// Run a nested call against the recipient's own storage, isolated from
    /// the caller until it succeeds.
    pub fn execute_on_dest_context(&mut self, input: ContractCallInput) -> Result<(), VmError> {
        self.execute_nested(input, CallType::ExecuteOnDestContext)
    }

    fn execute_nested(
        &mut self,
        mut input: ContractCallInput,
        call_type: CallType,
    ) -> Result<(), VmError> {
        input.caller = *self.runtime.sc_address();
        input.call_type = call_type;

        let schedule = *self.metering.schedule();
        let api_cost = match call_type {
            CallType::ExecuteOnSameContext => schedule.execute_on_same_context,
            _ => schedule.execute_on_dest_context,
        };
        self.metering.charge(api_cost)?;
        self.metering.charge(input.gas_provided)?;

        if let Err(err) = self
            .call_stack
            .enter(input.recipient, input.caller, call_type)
        {
            self.metering.charge(schedule.call_final_cost)?;
            return Err(err);
        }

        self.output.push_state();
        self.storage.push_state();
        if call_type == CallType::ExecuteOnDestContext {
            self.output.censor_vm_output();
            self.storage.set_address(input.recipient);
        }
        self.runtime.push_state();
        self.runtime.init_state_from_nested_input(input.clone());
        self.metering.push_state(input.gas_provided);

        tracing::debug!(
            "Entering {:?} call {:?}::{} at depth {}",
            call_type,
            input.recipient,
            input.function,
            self.call_stack.depth()
        );

        let result = self
            .transfer_call_value(&input.caller, &input.recipient, &input.call_value)
            .and_then(|()| self.execute_contract_code(&input));

        match &result {
            Ok(()) => {
                self.metering.pop_merge_active_state();
                if call_type == CallType::ExecuteOnDestContext {
                    self.output.pop_merge_active_state();
                } else {
                    self.output.pop_discard();
                }
            }
            Err(err) => {
                tracing::warn!("Nested call {} failed: {}", input.function, err);
                self.metering.pop_discard();
                self.output.pop_set_active_state();
            }
        }
        self.storage.pop_set_active_state();
        self.runtime.pop_set_active_state();
        self.call_stack.exit();

        tracing::debug!(
            "Left {:?} call {:?}::{}, {} gas left",
            call_type,
            input.recipient,
            input.function,
            self.metering.gas_left()
        );

        self.metering.charge(schedule.call_final_cost)?;
        result
    }

    // Contract API

    pub fn storage_store(&mut self, key: &[u8], value: &[u8]) -> Result<StorageStatus, VmError> {
        self.metering.charge(self.metering.schedule().storage_store)?;
        let mut env = StorageEnv {
            output: &mut self.output,
            metering: &mut self.metering,
            read_only: self.runtime.read_only(),
        };
        self.storage.set_storage(&mut env, key, value)
    }

    pub fn storage_load(&mut self, key: &[u8]) -> Result<Vec<u8>, VmError> {
        self.metering.charge(self.metering.schedule().storage_load)?;
        let (value, _) = self.storage.get_storage(&mut self.output, key)?;
        Ok(value)
    }

    pub fn storage_load_from_address(
        &mut self,
        address: &Address,
        key: &[u8],
    ) -> Result<Vec<u8>, VmError> {
        self.metering.charge(self.metering.schedule().storage_load)?;
        let (value, _) = self
            .storage
            .get_storage_from_address(&mut self.output, address, key)?;
        Ok(value)
    }

    pub fn get_argument(&mut self, index: usize) -> Result<Bytes, VmError> {
        self.metering.charge(self.metering.schedule().get_argument)?;
        self.runtime.argument(index).cloned()
    }

    pub fn arguments(&self) -> &[Bytes] {
        self.runtime.arguments()
    }

    pub fn caller(&self) -> Address {
        *self.runtime.caller()
    }

    pub fn sc_address(&self) -> Address {
        *self.runtime.sc_address()
    }

    pub fn call_value(&self) -> BigUint {
        self.runtime.call_value().clone()
    }

    pub fn finish(&mut self, data: impl Into<Vec<u8>>) -> Result<(), VmError> {
        self.metering.charge(self.metering.schedule().finish)?;
        self.output.finish(data);
        Ok(())
    }

    /// Send `value` from the running contract to `destination`.
    pub fn transfer_value(&mut self, destination: &Address, value: &BigUint) -> Result<(), VmError> {
        self.metering.charge(self.metering.schedule().transfer_value)?;
        if self.runtime.read_only() && !value.is_zero() {
            return Err(VmError::WriteOnReadOnly);
        }
        let sender = self.sc_address();
        self.load_balance(&sender)?;
        self.output.transfer(&sender, destination, value)
    }

    pub fn write_log(&mut self, topics: Vec<Vec<u8>>, data: impl Into<Vec<u8>>) -> Result<(), VmError> {
        self.metering.charge(self.metering.schedule().write_log)?;
        let address = self.sc_address();
        self.output.add_log(LogEntry {
            address,
            topics,
            data: data.into(),
        });
        Ok(())
    }

    pub fn use_gas(&mut self, amount: u64) -> Result<(), VmError> {
        self.metering.charge(amount)
    }

    pub fn gas_left(&self) -> u64 {
        self.metering.gas_left()
    }

    /// Error a contract returns to abort its own execution.
    pub fn signal_error(&self, message: impl Into<String>) -> VmError {
        let message = message.into();
        tracing::debug!("Contract {:?} signalled error: {}", self.sc_address(), message);
        VmError::UserError(message)
    }

    pub fn is_read_only(&self) -> bool {
        self.runtime.read_only()
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.runtime.set_read_only(read_only);
    }
}
