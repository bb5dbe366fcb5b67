//! Ledger view consumed by the host.
//!
//! The ledger may live in another process or on another machine; from the
//! host's point of view every call is a synchronous request/response. Retry
//! and timeout policy belong to the implementation, never to the host.

use num_bigint::BigUint;
use thiserror::Error;
use vmhost_types::{Address, CodeMetadata};

/// Errors reported by a blockchain hook implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("too many requests")]
    TooManyRequests,

    #[error("account not found: {0:?}")]
    AccountNotFound(Address),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

/// Account as seen on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserAccount {
    pub address: Address,
    pub nonce: u64,
    pub balance: BigUint,
    pub code: Vec<u8>,
    pub code_metadata: CodeMetadata,
}

impl UserAccount {
    pub fn is_readable(&self) -> bool {
        self.code_metadata.readable
    }
}

/// Read access to the persistent ledger.
pub trait BlockchainHook: Send + Sync {
    /// Stored value of `key` for `address` and its trie depth. An absent key
    /// is an empty value, not an error.
    fn get_storage_data(&self, address: &Address, key: &[u8]) -> Result<(Vec<u8>, u32), HookError>;

    /// The account, or `None` when it does not exist.
    fn get_user_account(&self, address: &Address) -> Result<Option<UserAccount>, HookError>;

    /// Contract code deployed at `address` (empty if none).
    fn get_code(&self, address: &Address) -> Result<Vec<u8>, HookError> {
        Ok(self
            .get_user_account(address)?
            .map(|account| account.code)
            .unwrap_or_default())
    }
}
