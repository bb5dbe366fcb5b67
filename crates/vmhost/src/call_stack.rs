//! Call-depth governor.
//!
//! Tracks the chain of contract calls within a transaction and bounds its
//! depth. Contracts may re-enter themselves or each other; only the depth is
//! limited.

use vmhost_types::{Address, CallType};

use crate::error::VmError;
use crate::MAX_CALL_DEPTH;

/// A single entry of the call chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Contract being called
    pub address: Address,
    /// Caller address
    pub caller: Address,
    pub call_type: CallType,
    /// Call depth (0 for top-level)
    pub depth: usize,
}

#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    max_depth: usize,
}

impl CallStack {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_CALL_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            frames: Vec::new(),
            max_depth,
        }
    }

    /// Enter a new call. Fails when the depth limit is reached.
    pub fn enter(
        &mut self,
        address: Address,
        caller: Address,
        call_type: CallType,
    ) -> Result<usize, VmError> {
        let depth = self.frames.len();
        if depth >= self.max_depth {
            return Err(VmError::CallDepthExceeded { depth });
        }

        self.frames.push(CallFrame {
            address,
            caller,
            call_type,
            depth,
        });
        Ok(depth)
    }

    /// Leave the current call. A no-op on an empty stack.
    pub fn exit(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn current_frame(&self) -> Option<&CallFrame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Whether `address` is anywhere in the current call chain.
    pub fn contains(&self, address: &Address) -> bool {
        self.frames.iter().any(|frame| frame.address == *address)
    }

    /// Sender of the top-level call.
    pub fn tx_origin(&self) -> Option<&Address> {
        self.frames.first().map(|frame| &frame.caller)
    }

    pub fn reset(&mut self) {
        self.frames.clear();
    }
}

impl Default for CallStack {
    fn default() -> Self {
        Self::new()
    }
}
