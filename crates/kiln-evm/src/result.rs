//! Per-call outputs

use crate::error::VmError;
use kiln_primitives::{Address, DataWord, H256};
use std::collections::HashSet;

/// One entry produced by a LOG opcode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogEntry {
    /// Address of the contract that emitted the log
    pub address: Address,
    /// Indexed topics, at most four
    pub topics: Vec<H256>,
    /// Raw payload copied out of memory
    pub data: Vec<u8>,
}

/// A call or creation recorded instead of executed, for conformance
/// harnesses that run with the testing-suite flag set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnedCall {
    /// Call target; `None` for a creation
    pub destination: Option<Address>,
    /// Value attached
    pub value: DataWord,
    /// Gas forwarded
    pub gas: u64,
    /// Input (or init code) passed
    pub input: Vec<u8>,
}

/// Everything a frame produces besides its storage writes: the halt-return
/// buffer, emitted logs, scheduled gas refunds, accounts scheduled for
/// deletion, recorded spawned calls, and the failure if the frame halted
/// exceptionally.
///
/// On a successful child return, logs, refunds, deletions and recorded
/// calls [`merge`](ProgramResult::merge) into the caller's result; a failed
/// child merges nothing.
#[derive(Clone, Debug, Default)]
pub struct ProgramResult {
    h_return: Vec<u8>,
    logs: Vec<LogEntry>,
    future_refund: u64,
    delete_accounts: HashSet<Address>,
    spawned_calls: Vec<SpawnedCall>,
    failure: Option<VmError>,
}

impl ProgramResult {
    /// Create an empty result
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the halt-return buffer
    pub fn set_h_return(&mut self, data: Vec<u8>) {
        self.h_return = data;
    }

    /// The halt-return buffer
    pub fn h_return(&self) -> &[u8] {
        &self.h_return
    }

    /// Append a log entry
    pub fn add_log(&mut self, log: LogEntry) {
        self.logs.push(log);
    }

    /// Emitted logs, in order
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Schedule gas to be returned at transaction end
    pub fn add_refund(&mut self, gas: u64) {
        self.future_refund += gas;
    }

    /// Total refund scheduled so far
    pub fn future_refund(&self) -> u64 {
        self.future_refund
    }

    /// Schedule an account for deletion
    pub fn add_delete_account(&mut self, address: Address) {
        self.delete_accounts.insert(address);
    }

    /// Accounts scheduled for deletion
    pub fn delete_accounts(&self) -> &HashSet<Address> {
        &self.delete_accounts
    }

    /// Record a call or creation without executing it
    pub fn add_spawned_call(&mut self, call: SpawnedCall) {
        self.spawned_calls.push(call);
    }

    /// Recorded calls and creations
    pub fn spawned_calls(&self) -> &[SpawnedCall] {
        &self.spawned_calls
    }

    /// Mark the frame as having halted exceptionally
    pub fn set_failure(&mut self, error: VmError) {
        self.failure = Some(error);
    }

    /// The failure, if the frame halted exceptionally
    pub fn failure(&self) -> Option<&VmError> {
        self.failure.as_ref()
    }

    /// Fold a successful child's side effects into this result. The
    /// child's return buffer and failure slot are not part of the merge.
    pub fn merge(&mut self, child: ProgramResult) {
        self.logs.extend(child.logs);
        self.future_refund += child.future_refund;
        self.delete_accounts.extend(child.delete_accounts);
        self.spawned_calls.extend(child.spawned_calls);
    }
}
