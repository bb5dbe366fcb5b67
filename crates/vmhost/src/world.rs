//! In-memory ledger used by tests, benchmarks and local tooling.

use std::collections::HashMap;

use num_bigint::{BigInt, BigUint, Sign};
use parking_lot::RwLock;
use vmhost_types::{Address, CodeMetadata, VmOutput};

use crate::blockchain::{BlockchainHook, HookError, UserAccount};

#[derive(Debug, Clone, Default)]
struct WorldAccount {
    account: UserAccount,
    storage: HashMap<Vec<u8>, Vec<u8>>,
}

/// In-memory `BlockchainHook` implementation.
#[derive(Debug, Default)]
pub struct MockWorld {
    accounts: RwLock<HashMap<Address, WorldAccount>>,
    /// When set, every storage read fails with this error.
    storage_error: RwLock<Option<HookError>>,
}

impl MockWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a user account with `balance`.
    pub fn add_account(&self, address: Address, balance: impl Into<BigUint>) {
        let account = UserAccount {
            address,
            balance: balance.into(),
            ..UserAccount::default()
        };
        self.accounts.write().insert(address, WorldAccount {
            account,
            storage: HashMap::new(),
        });
    }

    /// Add (or replace) a contract account.
    pub fn add_contract(&self, address: Address, code: impl Into<Vec<u8>>, metadata: CodeMetadata) {
        let account = UserAccount {
            address,
            code: code.into(),
            code_metadata: metadata,
            ..UserAccount::default()
        };
        self.accounts.write().insert(address, WorldAccount {
            account,
            storage: HashMap::new(),
        });
    }

    pub fn set_balance(&self, address: &Address, balance: impl Into<BigUint>) {
        let mut accounts = self.accounts.write();
        let entry = accounts.entry(*address).or_default();
        entry.account.address = *address;
        entry.account.balance = balance.into();
    }

    pub fn set_storage(&self, address: &Address, key: &[u8], value: &[u8]) {
        let mut accounts = self.accounts.write();
        let entry = accounts.entry(*address).or_default();
        entry.account.address = *address;
        if value.is_empty() {
            entry.storage.remove(key);
        } else {
            entry.storage.insert(key.to_vec(), value.to_vec());
        }
    }

    pub fn storage(&self, address: &Address, key: &[u8]) -> Vec<u8> {
        self.accounts
            .read()
            .get(address)
            .and_then(|a| a.storage.get(key).cloned())
            .unwrap_or_default()
    }

    pub fn balance(&self, address: &Address) -> BigUint {
        self.accounts
            .read()
            .get(address)
            .map(|a| a.account.balance.clone())
            .unwrap_or_default()
    }

    /// Make every subsequent storage read fail with `error` (or succeed
    /// again with `None`).
    pub fn set_storage_error(&self, error: Option<HookError>) {
        *self.storage_error.write() = error;
    }

    /// Commit a successful output: storage updates, balance deltas, nonces.
    pub fn apply_vm_output(&self, output: &VmOutput) {
        if !output.return_code.is_ok() {
            return;
        }

        let mut accounts = self.accounts.write();
        for (address, out) in &output.output_accounts {
            let entry = accounts.entry(*address).or_default();
            entry.account.address = *address;
            entry.account.nonce = entry.account.nonce.max(out.nonce);

            let balance = BigInt::from_biguint(Sign::Plus, entry.account.balance.clone())
                + &out.balance_delta;
            entry.account.balance = balance.to_biguint().unwrap_or_default();

            for update in out.storage_updates.values() {
                if update.data.is_empty() {
                    entry.storage.remove(&update.offset);
                } else {
                    entry.storage.insert(update.offset.clone(), update.data.clone());
                }
            }
        }
        tracing::debug!("Applied output for {} accounts", output.output_accounts.len());
    }
}

impl BlockchainHook for MockWorld {
    fn get_storage_data(&self, address: &Address, key: &[u8]) -> Result<(Vec<u8>, u32), HookError> {
        if let Some(err) = self.storage_error.read().clone() {
            return Err(err);
        }
        Ok((self.storage(address, key), 0))
    }

    fn get_user_account(&self, address: &Address) -> Result<Option<UserAccount>, HookError> {
        Ok(self.accounts.read().get(address).map(|a| a.account.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmhost_types::OutputAccount;

    #[test]
    fn test_storage_roundtrip() {
        let world = MockWorld::new();
        let addr = Address::from_label("account");

        world.set_storage(&addr, b"key", b"value");
        assert_eq!(world.get_storage_data(&addr, b"key").unwrap().0, b"value");

        world.set_storage(&addr, b"key", b"");
        assert!(world.get_storage_data(&addr, b"key").unwrap().0.is_empty());
    }

    #[test]
    fn test_injected_storage_error() {
        let world = MockWorld::new();
        let addr = Address::from_label("account");
        world.set_storage_error(Some(HookError::TooManyRequests));

        assert_eq!(
            world.get_storage_data(&addr, b"key"),
            Err(HookError::TooManyRequests)
        );

        world.set_storage_error(None);
        assert!(world.get_storage_data(&addr, b"key").is_ok());
    }

    #[test]
    fn test_code_and_metadata() {
        let world = MockWorld::new();
        let addr = Address::from_label("contract");
        world.add_contract(addr, b"code".to_vec(), CodeMetadata::readable());

        assert_eq!(world.get_code(&addr).unwrap(), b"code");
        assert!(world.get_user_account(&addr).unwrap().unwrap().is_readable());
        assert!(world.get_code(&Address::from_label("nobody")).unwrap().is_empty());
    }

    #[test]
    fn test_apply_vm_output() {
        let world = MockWorld::new();
        let sender = Address::from_label("sender");
        let receiver = Address::from_label("receiver");
        world.add_account(sender, 100u32);

        let mut output = VmOutput::default();
        output.output_accounts.insert(
            sender,
            OutputAccount::new(sender).with_balance_delta(-40),
        );
        let mut out = OutputAccount::new(receiver).with_balance_delta(40);
        out.set_storage_update(b"key", b"value");
        output.output_accounts.insert(receiver, out);

        world.apply_vm_output(&output);

        assert_eq!(world.balance(&sender), BigUint::from(60u32));
        assert_eq!(world.balance(&receiver), BigUint::from(40u32));
        assert_eq!(world.storage(&receiver, b"key"), b"value");
    }
}
