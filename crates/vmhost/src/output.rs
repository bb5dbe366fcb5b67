//! Output accumulator.
//!
//! Collects every effect of the running transaction: per-account storage
//! updates, balance deltas, byte counters, return data and logs. Nested calls
//! save the accumulator on a stack and either keep, merge or revert what
//! they produced.
//!
//! Each state on the stack is a layer. A layer pushed without censoring is a
//! continuation of the saved one and already contains all of its data. A
//! censored layer starts empty and is isolated from the saved one, so reads
//! fall through to the layers beneath it.

use std::collections::btree_map::Entry;

use num_bigint::{BigInt, BigUint, Sign};
use vmhost_types::{
    Address, LogEntry, OutputAccount, ReturnCode, StorageUpdates, VmOutput,
};

use crate::error::VmError;

#[derive(Debug, Clone, Default)]
struct OutputState {
    output: VmOutput,
    /// Started empty instead of as a copy of the saved state beneath it.
    isolated: bool,
}

/// The transaction's output accumulator and its state stack.
#[derive(Debug, Clone, Default)]
pub struct OutputContext {
    state: OutputState,
    state_stack: Vec<OutputState>,
}

impl OutputContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a new top-level transaction.
    pub fn init_state(&mut self) {
        self.state = OutputState::default();
        self.state_stack.clear();
    }

    /// Save a copy of the active state. The active state continues from it.
    pub fn push_state(&mut self) {
        self.state_stack.push(self.state.clone());
        self.state.isolated = false;
    }

    /// Replace the active state with an empty, isolated layer.
    pub fn censor_vm_output(&mut self) {
        self.state = OutputState {
            output: VmOutput::default(),
            isolated: true,
        };
    }

    /// Restore the saved state, reverting everything done since the push.
    pub fn pop_set_active_state(&mut self) {
        if let Some(saved) = self.state_stack.pop() {
            self.state = saved;
        }
    }

    /// Fold the active state into the saved one and make the result active.
    pub fn pop_merge_active_state(&mut self) {
        let Some(mut saved) = self.state_stack.pop() else {
            return;
        };
        let active = std::mem::take(&mut self.state);
        if active.isolated {
            merge_vm_outputs(&mut saved.output, active.output);
        } else {
            saved.output = active.output;
        }
        self.state = saved;
    }

    /// Drop the saved state and keep the active one.
    pub fn pop_discard(&mut self) {
        if let Some(saved) = self.state_stack.pop() {
            if !self.state.isolated {
                self.state.isolated = saved.isolated;
            }
        }
    }

    pub fn state_stack_len(&self) -> usize {
        self.state_stack.len()
    }

    /// Layers visible from the active state, topmost first.
    fn layers(&self) -> Vec<&VmOutput> {
        let mut layers = vec![&self.state.output];
        let mut isolated = self.state.isolated;
        for saved in self.state_stack.iter().rev() {
            if isolated {
                layers.push(&saved.output);
            }
            isolated = saved.isolated;
        }
        layers
    }

    /// Latest value written this transaction for `key` of `address`, if any.
    pub fn lookup_storage(&self, address: &Address, key: &[u8]) -> Option<&[u8]> {
        self.layers().into_iter().find_map(|layer| {
            layer
                .account(address)
                .and_then(|account| account.storage_updates.get(key))
                .map(|update| update.data.as_slice())
        })
    }

    /// Every update recorded so far for `address`, across visible layers.
    pub fn collect_storage_updates(&self, address: &Address) -> StorageUpdates {
        let mut updates = StorageUpdates::new();
        for layer in self.layers().into_iter().rev() {
            if let Some(account) = layer.account(address) {
                for (key, update) in &account.storage_updates {
                    updates.insert(key.clone(), update.clone());
                }
            }
        }
        updates
    }

    /// Known ledger balance (if loaded) and the net delta accumulated so far.
    pub fn balance_view(&self, address: &Address) -> (Option<BigInt>, BigInt) {
        let mut balance = None;
        let mut delta = BigInt::default();
        for layer in self.layers() {
            if let Some(account) = layer.account(address) {
                if balance.is_none() {
                    balance = account.balance.clone();
                }
                delta += &account.balance_delta;
            }
        }
        (balance, delta)
    }

    /// Get the active account entry, creating it on first touch. The flag is
    /// `true` when the entry was created by this call.
    pub fn get_output_account(&mut self, address: &Address) -> (&mut OutputAccount, bool) {
        match self.state.output.output_accounts.entry(*address) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(OutputAccount::new(*address)), true),
        }
    }

    pub fn output_account(&self, address: &Address) -> Option<&OutputAccount> {
        self.state.output.account(address)
    }

    /// Move `value` from `sender` to `receiver`.
    pub fn transfer(
        &mut self,
        sender: &Address,
        receiver: &Address,
        value: &BigUint,
    ) -> Result<(), VmError> {
        let value = BigInt::from_biguint(Sign::Plus, value.clone());
        let (balance, delta) = self.balance_view(sender);
        let available = balance.unwrap_or_default() + delta;
        if available < value {
            return Err(VmError::InsufficientFunds {
                available: available.to_string(),
                required: value.to_string(),
            });
        }

        self.get_output_account(sender).0.balance_delta -= &value;
        self.get_output_account(receiver).0.balance_delta += &value;
        tracing::trace!("Transferred {} from {:?} to {:?}", value, sender, receiver);
        Ok(())
    }

    /// Append return data.
    pub fn finish(&mut self, data: impl Into<Vec<u8>>) {
        self.state.output.return_data.push(data.into());
    }

    pub fn return_data(&self) -> &[Vec<u8>] {
        &self.state.output.return_data
    }

    pub fn clear_return_data(&mut self) {
        self.state.output.return_data.clear();
    }

    pub fn add_log(&mut self, entry: LogEntry) {
        self.state.output.logs.push(entry);
    }

    /// Snapshot of the active state as a successful output.
    pub fn create_vm_output(&self, gas_remaining: u64, gas_refund: u64) -> VmOutput {
        VmOutput {
            return_code: ReturnCode::Ok,
            return_message: String::new(),
            gas_remaining,
            gas_refund,
            ..self.state.output.clone()
        }
    }

    /// Output of a failed execution: no effects, no gas left.
    pub fn create_failed_vm_output(err: &VmError) -> VmOutput {
        VmOutput {
            return_code: ReturnCode::from(err),
            return_message: err.to_string(),
            ..VmOutput::default()
        }
    }
}

/// Merge `right` into `left`. Balance deltas and byte counters add, storage
/// updates union with `right` winning, return data and logs append.
pub fn merge_vm_outputs(left: &mut VmOutput, right: VmOutput) {
    for (address, right_account) in right.output_accounts {
        match left.output_accounts.entry(address) {
            Entry::Occupied(entry) => merge_output_accounts(entry.into_mut(), right_account),
            Entry::Vacant(entry) => {
                entry.insert(right_account);
            }
        }
    }
    left.return_data.extend(right.return_data);
    left.logs.extend(right.logs);
}

pub fn merge_output_accounts(left: &mut OutputAccount, right: OutputAccount) {
    left.storage_updates.extend(right.storage_updates);
    if right.balance.is_some() {
        left.balance = right.balance;
    }
    left.balance_delta += right.balance_delta;
    left.nonce = left.nonce.max(right.nonce);
    left.bytes_added_to_storage += right.bytes_added_to_storage;
    left.bytes_deleted_from_storage += right.bytes_deleted_from_storage;
    left.is_new |= right.is_new;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(label: &str) -> Address {
        Address::from_label(label)
    }

    #[test]
    fn test_get_output_account_created_once() {
        let mut output = OutputContext::new();
        let (_, created) = output.get_output_account(&addr("a"));
        assert!(created);
        let (_, created) = output.get_output_account(&addr("a"));
        assert!(!created);
        assert_eq!(output.create_vm_output(0, 0).output_accounts.len(), 1);
    }

    #[test]
    fn test_pop_set_active_state_reverts() {
        let mut output = OutputContext::new();
        output.get_output_account(&addr("a")).0.set_storage_update(b"k", b"before");
        output.finish(b"parent".to_vec());

        output.push_state();
        output.get_output_account(&addr("a")).0.set_storage_update(b"k", b"after");
        output.get_output_account(&addr("b")).0.set_storage_update(b"k", b"child");
        output.finish(b"child".to_vec());
        output.pop_set_active_state();

        assert_eq!(output.lookup_storage(&addr("a"), b"k"), Some(&b"before"[..]));
        assert!(output.output_account(&addr("b")).is_none());
        assert_eq!(output.return_data(), &[b"parent".to_vec()]);
    }

    #[test]
    fn test_pop_discard_keeps_continuation() {
        let mut output = OutputContext::new();
        output.finish(b"parent".to_vec());
        output.push_state();
        output.finish(b"child".to_vec());
        output.pop_discard();

        assert_eq!(output.state_stack_len(), 0);
        assert_eq!(output.return_data(), &[b"parent".to_vec(), b"child".to_vec()]);
    }

    #[test]
    fn test_censored_layer_reads_through() {
        let mut output = OutputContext::new();
        output.get_output_account(&addr("child")).0.set_storage_update(b"k", b"parent wrote");

        output.push_state();
        output.censor_vm_output();

        assert!(output.output_account(&addr("child")).is_none());
        assert_eq!(
            output.lookup_storage(&addr("child"), b"k"),
            Some(&b"parent wrote"[..])
        );

        output.get_output_account(&addr("child")).0.set_storage_update(b"k", b"child wrote");
        assert_eq!(
            output.lookup_storage(&addr("child"), b"k"),
            Some(&b"child wrote"[..])
        );
        assert_eq!(output.collect_storage_updates(&addr("child")).len(), 1);
    }

    #[test]
    fn test_nested_continuation_inside_isolated_layer() {
        let mut output = OutputContext::new();
        output.get_output_account(&addr("x")).0.balance_delta = BigInt::from(10);

        // isolated child
        output.push_state();
        output.censor_vm_output();
        output.get_output_account(&addr("x")).0.balance_delta = BigInt::from(5);

        // continuation grandchild
        output.push_state();
        let (_, delta) = output.balance_view(&addr("x"));
        assert_eq!(delta, BigInt::from(15));
    }

    #[test]
    fn test_pop_merge_isolated_is_additive() {
        let mut output = OutputContext::new();
        {
            let (parent, _) = output.get_output_account(&addr("p"));
            parent.balance = Some(BigInt::from(1000));
            parent.balance_delta = BigInt::from(-99);
            parent.bytes_added_to_storage = 4;
            parent.set_storage_update(b"shared", b"parent");
            parent.set_storage_update(b"own", b"parent");
        }
        output.finish(b"parent".to_vec());

        output.push_state();
        output.censor_vm_output();
        {
            let (parent, _) = output.get_output_account(&addr("p"));
            parent.balance_delta = BigInt::from(-1);
            parent.bytes_added_to_storage = 3;
            parent.nonce = 2;
            parent.set_storage_update(b"shared", b"child");
        }
        output.get_output_account(&addr("c")).0.balance_delta = BigInt::from(100);
        output.finish(b"child".to_vec());
        output.pop_merge_active_state();

        let vm_output = output.create_vm_output(7, 0);
        let parent = vm_output.account(&addr("p")).unwrap();
        assert_eq!(parent.balance, Some(BigInt::from(1000)));
        assert_eq!(parent.balance_delta, BigInt::from(-100));
        assert_eq!(parent.bytes_added_to_storage, 7);
        assert_eq!(parent.nonce, 2);
        assert_eq!(parent.storage_updates[&b"shared".to_vec()].data, b"child");
        assert_eq!(parent.storage_updates[&b"own".to_vec()].data, b"parent");
        assert_eq!(
            vm_output.account(&addr("c")).unwrap().balance_delta,
            BigInt::from(100)
        );
        assert_eq!(vm_output.return_data, vec![b"parent".to_vec(), b"child".to_vec()]);
        assert_eq!(vm_output.gas_remaining, 7);
    }

    #[test]
    fn test_pop_merge_continuation_does_not_double_count() {
        let mut output = OutputContext::new();
        output.get_output_account(&addr("p")).0.balance_delta = BigInt::from(-5);
        output.push_state();
        output.get_output_account(&addr("p")).0.balance_delta -= BigInt::from(5);
        output.pop_merge_active_state();

        assert_eq!(
            output.output_account(&addr("p")).unwrap().balance_delta,
            BigInt::from(-10)
        );
    }

    #[test]
    fn test_transfer_checks_available_balance() {
        let mut output = OutputContext::new();
        output.get_output_account(&addr("s")).0.balance = Some(BigInt::from(50));

        output.transfer(&addr("s"), &addr("r"), &BigUint::from(30u32)).unwrap();
        let err = output
            .transfer(&addr("s"), &addr("r"), &BigUint::from(30u32))
            .unwrap_err();
        assert!(matches!(err, VmError::InsufficientFunds { .. }));

        let (balance, delta) = output.balance_view(&addr("s"));
        assert_eq!(balance, Some(BigInt::from(50)));
        assert_eq!(delta, BigInt::from(-30));
        assert_eq!(
            output.output_account(&addr("r")).unwrap().balance_delta,
            BigInt::from(30)
        );
    }

    #[test]
    fn test_pop_on_empty_stack_is_noop() {
        let mut output = OutputContext::new();
        output.finish(b"data".to_vec());
        output.pop_set_active_state();
        output.pop_merge_active_state();
        output.pop_discard();
        assert_eq!(output.state_stack_len(), 0);
        assert_eq!(output.return_data().len(), 1);
    }

    #[test]
    fn test_failed_vm_output() {
        let out = OutputContext::create_failed_vm_output(&VmError::UserError("nope".into()));
        assert_eq!(out.return_code, ReturnCode::UserError);
        assert!(out.return_message.contains("nope"));
        assert!(out.output_accounts.is_empty());
        assert_eq!(out.gas_remaining, 0);
    }
}
