//! ESDT token balances.
//!
//! Balances live in account storage under the protected namespace:
//! `protected_key_prefix ++ "esdt" ++ token`, as big-endian unsigned
//! integers. Contracts cannot write these keys; the built-ins below do so
//! through a protection guard.

use num_bigint::BigUint;
use num_traits::Zero;
use vmhost_types::Address;

use crate::error::VmError;
use crate::host::VmHost;
use crate::storage::StorageEnv;

/// Identifier inserted between the protected prefix and the token name.
pub const ESDT_KEY_IDENTIFIER: &[u8] = b"esdt";

/// Storage key of `token`'s balance under `protected_prefix`.
pub fn esdt_token_key(protected_prefix: &[u8], token: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(protected_prefix.len() + ESDT_KEY_IDENTIFIER.len() + token.len());
    key.extend_from_slice(protected_prefix);
    key.extend_from_slice(ESDT_KEY_IDENTIFIER);
    key.extend_from_slice(token);
    key
}

impl VmHost {
    fn esdt_key(&self, token: &[u8]) -> Vec<u8> {
        esdt_token_key(self.storage.protected_key_prefix(), token)
    }

    /// Balance of `token` held by `address`, including this transaction's
    /// writes.
    pub fn esdt_balance(&mut self, address: &Address, token: &[u8]) -> Result<BigUint, VmError> {
        let key = self.esdt_key(token);
        let (value, _) = self.storage.get_storage_at(&mut self.output, address, &key)?;
        Ok(BigUint::from_bytes_be(&value))
    }

    /// Create `amount` of `token` on the active storage account. In a
    /// same-context call that is the caller's account.
    pub fn esdt_local_mint(&mut self, token: &[u8], amount: &BigUint) -> Result<(), VmError> {
        self.metering.charge(self.metering.schedule().storage_store)?;
        let address = *self.storage.address();
        let balance = self.esdt_balance(&address, token)? + amount;
        self.write_esdt_balance(token, &balance)
    }

    /// Move `amount` of `token` from the active storage account to
    /// `destination`. Either both balances change or neither does.
    pub fn esdt_transfer(
        &mut self,
        token: &[u8],
        destination: &Address,
        amount: &BigUint,
    ) -> Result<(), VmError> {
        self.metering.charge(self.metering.schedule().esdt_transfer)?;
        let sender = *self.storage.address();
        let sender_balance = self.esdt_balance(&sender, token)?;
        if sender_balance < *amount {
            return Err(VmError::InsufficientFunds {
                available: sender_balance.to_string(),
                required: amount.to_string(),
            });
        }
        if *destination == sender {
            return Ok(());
        }
        let destination_balance = self.esdt_balance(destination, token)?;

        self.output.push_state();
        let result = self.move_esdt_balances(
            token,
            destination,
            &(sender_balance - amount),
            &(destination_balance + amount),
        );
        match result {
            Ok(()) => self.output.pop_discard(),
            Err(_) => self.output.pop_set_active_state(),
        }

        tracing::debug!(
            "ESDT transfer of {} {} from {:?} to {:?}: {}",
            amount,
            String::from_utf8_lossy(token),
            sender,
            destination,
            if result.is_ok() { "done" } else { "reverted" }
        );
        result
    }

    fn move_esdt_balances(
        &mut self,
        token: &[u8],
        destination: &Address,
        sender_balance: &BigUint,
        destination_balance: &BigUint,
    ) -> Result<(), VmError> {
        self.write_esdt_balance(token, sender_balance)?;

        let sender = *self.storage.address();
        self.storage.set_address(*destination);
        let result = self.write_esdt_balance(token, destination_balance);
        self.storage.set_address(sender);
        result
    }

    /// Write the active account's balance of `token`.
    fn write_esdt_balance(&mut self, token: &[u8], balance: &BigUint) -> Result<(), VmError> {
        let key = self.esdt_key(token);
        let value = if balance.is_zero() {
            Vec::new()
        } else {
            balance.to_bytes_be()
        };

        let mut env = StorageEnv {
            output: &mut self.output,
            metering: &mut self.metering,
            read_only: self.runtime.read_only(),
        };
        let mut storage = self.storage.unprotected();
        storage.set_storage(&mut env, &key, &value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_esdt_token_key() {
        assert_eq!(esdt_token_key(b"VMHOST@", b"TOKEN-1"), b"VMHOST@esdtTOKEN-1".to_vec());
    }
}
