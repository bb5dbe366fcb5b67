//! Storage engine.
//!
//! Gas-charged, policy-checked access to the storage of the active account.
//! Reads resolve through the output accumulator first (values written earlier
//! in the transaction) and fall back to the ledger. Writes are charged per
//! operation against the immediately prior value and recorded as storage
//! updates on the active output account.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use vmhost_types::{Address, StorageUpdates};

use crate::blockchain::BlockchainHook;
use crate::error::VmError;
use crate::gas_metering::MeteringContext;
use crate::output::OutputContext;

/// Outcome of a storage write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    Unchanged,
    Modified,
    Added,
    Deleted,
}

impl StorageStatus {
    fn classify(old: &[u8], new: &[u8]) -> Self {
        if old == new {
            StorageStatus::Unchanged
        } else if new.is_empty() {
            StorageStatus::Deleted
        } else if old.is_empty() {
            StorageStatus::Added
        } else {
            StorageStatus::Modified
        }
    }
}

/// The contexts a storage write touches besides storage itself.
pub struct StorageEnv<'a> {
    pub output: &'a mut OutputContext,
    pub metering: &'a mut MeteringContext,
    pub read_only: bool,
}

/// Saved storage view of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StorageFrame {
    address: Address,
    protection_enabled: bool,
}

/// Storage engine bound to one active account at a time.
pub struct StorageContext {
    blockchain: Arc<dyn BlockchainHook>,
    /// Global namespace no contract may ever write.
    reserved_key_prefix: Vec<u8>,
    /// Per-account namespace writable only by privileged host logic.
    protected_key_prefix: Vec<u8>,
    address: Address,
    protection_enabled: bool,
    state_stack: Vec<StorageFrame>,
}

impl StorageContext {
    pub fn new(
        blockchain: Arc<dyn BlockchainHook>,
        reserved_key_prefix: impl Into<Vec<u8>>,
        protected_key_prefix: impl Into<Vec<u8>>,
    ) -> Result<Self, VmError> {
        let reserved_key_prefix = reserved_key_prefix.into();
        let protected_key_prefix = protected_key_prefix.into();
        if reserved_key_prefix.is_empty() {
            return Err(VmError::EmptyReservedKeyPrefix);
        }
        if protected_key_prefix.is_empty() {
            return Err(VmError::EmptyProtectedKeyPrefix);
        }

        Ok(Self {
            blockchain,
            reserved_key_prefix,
            protected_key_prefix,
            address: Address::ZERO,
            protection_enabled: true,
            state_stack: Vec::new(),
        })
    }

    /// Reset for a new top-level transaction.
    pub fn init_state(&mut self) {
        self.address = Address::ZERO;
        self.protection_enabled = true;
        self.state_stack.clear();
    }

    /// Switch the account subsequent operations apply to.
    pub fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn protected_key_prefix(&self) -> &[u8] {
        &self.protected_key_prefix
    }

    pub fn reserved_key_prefix(&self) -> &[u8] {
        &self.reserved_key_prefix
    }

    pub fn is_protection_enabled(&self) -> bool {
        self.protection_enabled
    }

    pub(crate) fn disable_storage_protection(&mut self) {
        self.protection_enabled = false;
    }

    pub(crate) fn enable_storage_protection(&mut self) {
        self.protection_enabled = true;
    }

    /// Disable protection until the returned guard is dropped.
    pub fn unprotected(&mut self) -> ProtectionGuard<'_> {
        ProtectionGuard::new(self)
    }

    /// Save the active view before entering a nested call. The nested call
    /// starts with protection enabled.
    pub fn push_state(&mut self) {
        self.state_stack.push(StorageFrame {
            address: self.address,
            protection_enabled: self.protection_enabled,
        });
        self.protection_enabled = true;
        tracing::debug!("Storage push: depth {}", self.state_stack.len());
    }

    /// Restore the caller's view: active address and protection toggle.
    pub fn pop_set_active_state(&mut self) {
        let Some(frame) = self.state_stack.pop() else {
            return;
        };
        self.address = frame.address;
        self.protection_enabled = frame.protection_enabled;
        tracing::debug!("Storage pop: depth {}", self.state_stack.len());
    }

    /// Drop the saved view without restoring it.
    pub fn pop_discard(&mut self) {
        self.state_stack.pop();
    }

    pub fn state_stack_len(&self) -> usize {
        self.state_stack.len()
    }

    /// Value of `key` for the active account, and whether it came from the
    /// values written during this transaction. Absent keys read as empty.
    /// The read touches the account's output entry.
    pub fn get_storage(
        &self,
        output: &mut OutputContext,
        key: &[u8],
    ) -> Result<(Vec<u8>, bool), VmError> {
        self.get_storage_at(output, &self.address, key)
    }

    /// Same resolution as `get_storage` for any account, without the
    /// readability check. Host-internal.
    pub(crate) fn get_storage_at(
        &self,
        output: &mut OutputContext,
        address: &Address,
        key: &[u8],
    ) -> Result<(Vec<u8>, bool), VmError> {
        output.get_output_account(address);
        if let Some(value) = output.lookup_storage(address, key) {
            return Ok((value.to_vec(), true));
        }

        let (value, _) = self.blockchain.get_storage_data(address, key)?;
        Ok((value, false))
    }

    /// Read another account's storage. Accounts that are not readable read
    /// as empty; ledger errors are returned unchanged.
    pub fn get_storage_from_address(
        &self,
        output: &mut OutputContext,
        address: &Address,
        key: &[u8],
    ) -> Result<(Vec<u8>, bool), VmError> {
        if *address == self.address {
            return self.get_storage(output, key);
        }

        let readable = self
            .blockchain
            .get_user_account(address)?
            .is_some_and(|account| account.is_readable());
        if !readable {
            tracing::trace!("Storage read denied: {:?} is not readable", address);
            return Ok((Vec::new(), false));
        }

        self.get_storage_at(output, address, key)
    }

    /// Everything recorded for `address` so far.
    pub fn get_storage_updates(&self, output: &OutputContext, address: &Address) -> StorageUpdates {
        output.collect_storage_updates(address)
    }

    /// Write `value` under `key` for the active account.
    ///
    /// Policy checks run first: read-only mode (only when the value would
    /// change), the reserved prefix, then the protected prefix. Gas is charged
    /// against the current value before anything is recorded, so an
    /// out-of-gas failure leaves no trace.
    pub fn set_storage(
        &mut self,
        env: &mut StorageEnv<'_>,
        key: &[u8],
        value: &[u8],
    ) -> Result<StorageStatus, VmError> {
        if env.read_only {
            let (current, _) = self.get_storage(&mut *env.output, key)?;
            if current != value {
                return Err(VmError::WriteOnReadOnly);
            }
        }
        if key.starts_with(&self.reserved_key_prefix) {
            return Err(VmError::StoreReservedKey);
        }
        if self.protection_enabled && key.starts_with(&self.protected_key_prefix) {
            return Err(VmError::CannotWriteProtectedKey);
        }

        let (old, _) = self.get_storage(&mut *env.output, key)?;
        let status = StorageStatus::classify(&old, value);
        if status == StorageStatus::Unchanged {
            return Ok(status);
        }

        let (old_len, new_len) = (old.len() as u64, value.len() as u64);
        let metering = &mut *env.metering;
        let (cost, freed, added, deleted) = if new_len > old_len {
            let diff = new_len - old_len;
            let cost = metering
                .store_cost_per_byte()
                .saturating_mul(diff)
                .saturating_add(metering.persist_cost_per_byte().saturating_mul(old_len));
            (cost, 0, diff, 0)
        } else if new_len < old_len {
            let diff = old_len - new_len;
            let cost = metering.persist_cost_per_byte().saturating_mul(new_len);
            let freed = metering.release_cost_per_byte().saturating_mul(diff);
            (cost, freed, 0, diff)
        } else {
            (metering.persist_cost_per_byte().saturating_mul(new_len), 0, 0, 0)
        };

        metering.charge(cost)?;
        metering.free(freed);

        let (account, _) = env.output.get_output_account(&self.address);
        account.bytes_added_to_storage += added;
        account.bytes_deleted_from_storage += deleted;
        account.set_storage_update(key, value);

        tracing::trace!(
            "Storage {:?} key {} on {:?}: cost {}, freed {}",
            status,
            hex::encode(key),
            self.address,
            cost,
            freed
        );
        Ok(status)
    }
}

impl fmt::Debug for StorageContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageContext")
            .field("address", &self.address)
            .field("protection_enabled", &self.protection_enabled)
            .field("state_stack", &self.state_stack)
            .finish_non_exhaustive()
    }
}

/// Scope in which the protected namespace is writable. Protection is
/// re-enabled when the guard is dropped, on every exit path.
pub struct ProtectionGuard<'a> {
    storage: &'a mut StorageContext,
}

impl<'a> ProtectionGuard<'a> {
    pub fn new(storage: &'a mut StorageContext) -> Self {
        storage.disable_storage_protection();
        Self { storage }
    }
}

impl Deref for ProtectionGuard<'_> {
    type Target = StorageContext;

    fn deref(&self) -> &Self::Target {
        self.storage
    }
}

impl DerefMut for ProtectionGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.storage
    }
}

impl Drop for ProtectionGuard<'_> {
    fn drop(&mut self) {
        self.storage.enable_storage_protection();
    }
}
