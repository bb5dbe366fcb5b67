//! Execution output: per-account effects, return data and logs.
//!
//! A `VmOutput` is what a transaction (or a nested call) hands back to the
//! ledger-committing caller. It is only a description of effects; nothing in
//! this module touches persistent state.

use crate::address::Address;
use num_bigint::BigInt;
use std::collections::BTreeMap;
use std::fmt;

/// Storage updates of one account, keyed by storage key.
pub type StorageUpdates = BTreeMap<Vec<u8>, StorageUpdate>;

/// One net storage mutation to apply at the end of the transaction.
/// An empty `data` deletes the key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StorageUpdate {
    pub offset: Vec<u8>,
    pub data: Vec<u8>,
}

impl StorageUpdate {
    pub fn new(offset: impl Into<Vec<u8>>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            offset: offset.into(),
            data: data.into(),
        }
    }
}

/// Effects recorded for a single account during a transaction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputAccount {
    pub address: Address,
    pub nonce: u64,
    /// Absolute balance, when known (loaded from the ledger).
    pub balance: Option<BigInt>,
    /// Net value moved in or out during the transaction.
    pub balance_delta: BigInt,
    pub storage_updates: StorageUpdates,
    /// Monotonic per-operation counters used for gas bookkeeping.
    pub bytes_added_to_storage: u64,
    pub bytes_deleted_from_storage: u64,
    /// The account did not exist on the ledger before this transaction.
    pub is_new: bool,
}

impl OutputAccount {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            nonce: 0,
            balance: None,
            balance_delta: BigInt::default(),
            storage_updates: StorageUpdates::new(),
            bytes_added_to_storage: 0,
            bytes_deleted_from_storage: 0,
            is_new: false,
        }
    }

    pub fn with_balance(mut self, balance: impl Into<BigInt>) -> Self {
        self.balance = Some(balance.into());
        self
    }

    pub fn with_balance_delta(mut self, delta: impl Into<BigInt>) -> Self {
        self.balance_delta = delta.into();
        self
    }

    /// Record (or replace) the update for `key`.
    pub fn set_storage_update(&mut self, key: &[u8], data: &[u8]) {
        self.storage_updates
            .insert(key.to_vec(), StorageUpdate::new(key, data));
    }
}

/// A log entry (event) emitted by a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LogEntry {
    /// Contract address that emitted the log
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<Vec<u8>>,
    /// Non-indexed data
    pub data: Vec<u8>,
}

/// Outcome classification of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReturnCode {
    #[default]
    Ok,
    FunctionNotFound,
    FunctionWrongSignature,
    ContractNotFound,
    UserError,
    OutOfGas,
    OutOfFunds,
    CallStackOverFlow,
    ContractInvalid,
    ExecutionFailed,
}

impl ReturnCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, ReturnCode::Ok)
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReturnCode::Ok => "ok",
            ReturnCode::FunctionNotFound => "function not found",
            ReturnCode::FunctionWrongSignature => "wrong signature for function",
            ReturnCode::ContractNotFound => "contract not found",
            ReturnCode::UserError => "user error",
            ReturnCode::OutOfGas => "out of gas",
            ReturnCode::OutOfFunds => "out of funds",
            ReturnCode::CallStackOverFlow => "call stack overflow",
            ReturnCode::ContractInvalid => "contract invalid",
            ReturnCode::ExecutionFailed => "execution failed",
        };
        f.write_str(s)
    }
}

/// Result of a transaction or nested call.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VmOutput {
    pub return_code: ReturnCode,
    pub return_message: String,
    pub output_accounts: BTreeMap<Address, OutputAccount>,
    pub return_data: Vec<Vec<u8>>,
    pub logs: Vec<LogEntry>,
    pub gas_remaining: u64,
    /// Gas freed by storage releases, refunded by the ledger.
    pub gas_refund: u64,
}

impl VmOutput {
    /// Get an account entry, creating it on first touch.
    pub fn account_mut(&mut self, address: Address) -> &mut OutputAccount {
        self.output_accounts
            .entry(address)
            .or_insert_with(|| OutputAccount::new(address))
    }

    pub fn account(&self, address: &Address) -> Option<&OutputAccount> {
        self.output_accounts.get(address)
    }
}
