use serde::{Deserialize, Serialize};

use crate::error::VmError;

/// Gas schedule for host operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    // Storage, per byte
    pub store_per_byte: u64,          // 50
    pub persist_per_byte: u64,        // 10
    pub release_per_byte: u64,        // 10

    // Code
    pub compile_per_byte: u64,        // 4

    // Host API base costs
    pub storage_store: u64,           // 75
    pub storage_load: u64,            // 50
    pub get_argument: u64,            // 10
    pub finish: u64,                  // 10
    pub transfer_value: u64,          // 100
    pub write_log: u64,               // 100
    pub esdt_transfer: u64,           // 200

    // Nested calls
    pub execute_on_same_context: u64, // 100
    pub execute_on_dest_context: u64, // 100
    pub call_final_cost: u64,         // 20
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            // Storage
            store_per_byte: 50,
            persist_per_byte: 10,
            release_per_byte: 10,

            // Code
            compile_per_byte: 4,

            // Host API
            storage_store: 75,
            storage_load: 50,
            get_argument: 10,
            finish: 10,
            transfer_value: 100,
            write_log: 100,
            esdt_transfer: 200,

            // Nested calls
            execute_on_same_context: 100,
            execute_on_dest_context: 100,
            call_final_cost: 20,
        }
    }
}

impl GasSchedule {
    /// Schedule where every cost is zero. Useful as a base for tests that
    /// only care about a handful of costs.
    pub fn zero() -> Self {
        Self {
            store_per_byte: 0,
            persist_per_byte: 0,
            release_per_byte: 0,
            compile_per_byte: 0,
            storage_store: 0,
            storage_load: 0,
            get_argument: 0,
            finish: 0,
            transfer_value: 0,
            write_log: 0,
            esdt_transfer: 0,
            execute_on_same_context: 0,
            execute_on_dest_context: 0,
            call_final_cost: 0,
        }
    }
}

/// Gas tracking for a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasTracker {
    /// Gas limit for this call
    limit: u64,
    /// Gas already used
    used: u64,
    /// Gas freed by storage releases, refundable at the end
    freed: u64,
}

impl GasTracker {
    /// Create a new gas tracker.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            freed: 0,
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn freed(&self) -> u64 {
        self.freed
    }

    /// Get remaining gas.
    pub fn gas_left(&self) -> u64 {
        self.limit - self.used
    }

    pub fn is_out_of_gas(&self) -> bool {
        self.used >= self.limit
    }

    /// Charge gas. On failure the tracker is exhausted.
    pub fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        let Some(new_used) = self.used.checked_add(amount) else {
            self.used = self.limit;
            return Err(VmError::OutOfGas {
                used: u64::MAX,
                limit: self.limit,
            });
        };

        if new_used > self.limit {
            self.used = self.limit;
            Err(VmError::OutOfGas {
                used: new_used,
                limit: self.limit,
            })
        } else {
            self.used = new_used;
            Ok(())
        }
    }

    /// Record freed gas (storage release).
    pub fn free(&mut self, amount: u64) {
        self.freed = self.freed.saturating_add(amount);
    }

    /// Give back gas previously charged, e.g. the unused part of a
    /// sub-call reservation.
    pub fn restore(&mut self, amount: u64) {
        self.used = self.used.saturating_sub(amount);
    }
}

/// Gas schedule plus the stack of per-call trackers.
#[derive(Debug, Clone)]
pub struct MeteringContext {
    schedule: GasSchedule,
    current: GasTracker,
    state_stack: Vec<GasTracker>,
}

impl MeteringContext {
    pub fn new(schedule: GasSchedule, gas_limit: u64) -> Self {
        Self {
            schedule,
            current: GasTracker::new(gas_limit),
            state_stack: Vec::new(),
        }
    }

    /// Start a fresh top-level call.
    pub fn init_state(&mut self, gas_provided: u64) {
        self.current = GasTracker::new(gas_provided);
        self.state_stack.clear();
    }

    pub fn schedule(&self) -> &GasSchedule {
        &self.schedule
    }

    pub fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        self.current.charge(amount)
    }

    pub fn free(&mut self, amount: u64) {
        self.current.free(amount);
    }

    pub fn gas_left(&self) -> u64 {
        self.current.gas_left()
    }

    pub fn gas_freed(&self) -> u64 {
        self.current.freed()
    }

    pub fn is_out_of_gas(&self) -> bool {
        self.current.is_out_of_gas()
    }

    pub fn tracker(&self) -> &GasTracker {
        &self.current
    }

    pub fn store_cost_per_byte(&self) -> u64 {
        self.schedule.store_per_byte
    }

    pub fn persist_cost_per_byte(&self) -> u64 {
        self.schedule.persist_per_byte
    }

    pub fn release_cost_per_byte(&self) -> u64 {
        self.schedule.release_per_byte
    }

    /// Cost of compiling `code_len` bytes of contract code.
    pub fn compile_cost(&self, code_len: usize) -> u64 {
        self.schedule.compile_per_byte.saturating_mul(code_len as u64)
    }

    /// Enter a sub-call with `gas_provided`. The caller is expected to have
    /// charged the reservation already.
    pub fn push_state(&mut self, gas_provided: u64) {
        let parent = std::mem::replace(&mut self.current, GasTracker::new(gas_provided));
        self.state_stack.push(parent);
    }

    /// Return to the caller, giving back the sub-call's unused and freed gas.
    pub fn pop_merge_active_state(&mut self) {
        let Some(parent) = self.state_stack.pop() else {
            return;
        };
        let child = std::mem::replace(&mut self.current, parent);
        self.current.restore(child.gas_left());
        self.current.free(child.freed());
    }

    /// Return to the caller; the sub-call's reservation is forfeited.
    pub fn pop_discard(&mut self) {
        if let Some(parent) = self.state_stack.pop() {
            self.current = parent;
        }
    }

    pub fn state_stack_len(&self) -> usize {
        self.state_stack.len()
    }
}
