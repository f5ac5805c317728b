//! The mutable state of one call frame, plus the service routines the
//! opcodes are built from: memory and storage I/O, jump validation, gas
//! spending, and sub-call / creation dispatch.

use crate::config::VmConfig;
use crate::error::VmError;
use crate::invoke::ProgramInvoke;
use crate::memory::Memory;
use crate::precompiled::{PrecompileRegistry, PrecompiledContract};
use crate::result::{ProgramResult, SpawnedCall};
use crate::stack::Stack;
use crate::vm::Vm;
use kiln_crypto::keccak256;
use kiln_primitives::{Address, DataWord, H256};
use kiln_storage::{Repository, RepositoryTrack};
use tracing::debug;

/// The kind of message a CALL-class opcode dispatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MsgKind {
    /// Run the code at the target address against the target's storage
    Call,
    /// Run the code at the target address against the caller's storage
    /// (CALLCODE)
    Stateless,
}

/// A sub-call assembled from the CALL/CALLCODE operands.
#[derive(Clone, Debug)]
pub struct MessageCall {
    /// Call or stateless
    pub kind: MsgKind,
    /// Gas forwarded to the callee
    pub gas: u64,
    /// Address whose code runs
    pub code_address: DataWord,
    /// Value attached
    pub value: DataWord,
    /// Input window start in caller memory
    pub in_offset: DataWord,
    /// Input window length
    pub in_size: DataWord,
    /// Output window start in caller memory
    pub out_offset: DataWord,
    /// Output window length
    pub out_size: DataWord,
}

/// One record of the opcode trace, captured per step when `vm_trace` is on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpTrace {
    /// Program counter before the step
    pub pc: usize,
    /// Raw opcode byte
    pub op: u8,
    /// Gas remaining before the step
    pub gas: u64,
    /// Call depth of the frame
    pub depth: usize,
}

/// The execution state of a single call frame.
///
/// A program exclusively owns its stack, memory and result, holds its gas
/// counter and program counter, and borrows the repository view it executes
/// against. Sub-calls run a fresh `Program` against a [`RepositoryTrack`]
/// layered over this frame's repository.
pub struct Program<'a> {
    code: Vec<u8>,
    pc: usize,
    stack: Stack,
    memory: Memory,
    gas: u64,
    stopped: bool,
    last_op: u8,
    previously_executed_op: Option<u8>,
    step_count: u64,
    jumpdests: Vec<bool>,
    traces: Vec<OpTrace>,
    invoke: ProgramInvoke,
    result: ProgramResult,
    config: VmConfig,
    repo: &'a mut dyn Repository,
    precompiles: &'a dyn PrecompileRegistry,
}

impl<'a> Program<'a> {
    /// Create a frame over `code` with the given environment. Gas comes
    /// from the invoke; jump destinations are analysed up front.
    pub fn new(
        code: Vec<u8>,
        invoke: ProgramInvoke,
        repo: &'a mut dyn Repository,
        precompiles: &'a dyn PrecompileRegistry,
        config: VmConfig,
    ) -> Self {
        let jumpdests = analyze_jump_dests(&code);
        let gas = invoke.gas;
        Program {
            code,
            pc: 0,
            stack: Stack::new(),
            memory: Memory::new(),
            gas,
            stopped: false,
            last_op: 0,
            previously_executed_op: None,
            step_count: 0,
            jumpdests,
            traces: Vec::new(),
            invoke,
            result: ProgramResult::new(),
            config,
            repo,
            precompiles,
        }
    }

    // --- code and control flow ---

    /// The byte at the program counter; an empty program reads as STOP
    pub fn current_op(&self) -> u8 {
        self.code.get(self.pc).copied().unwrap_or(0)
    }

    /// The program code
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    /// The program counter
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Move the program counter; running off the end of code stops the
    /// machine (an implicit normal halt)
    pub fn set_pc(&mut self, pc: usize) {
        self.pc = pc;
        if self.pc >= self.code.len() {
            self.stopped = true;
        }
    }

    /// Advance past the current one-byte opcode
    pub fn advance(&mut self) {
        self.set_pc(self.pc + 1);
    }

    /// Consume the next `n` code bytes as a push immediate, zero-padded if
    /// the code ends early
    pub fn sweep(&mut self, n: usize) -> Vec<u8> {
        let mut data = vec![0u8; n];
        if self.pc < self.code.len() {
            let end = (self.pc + n).min(self.code.len());
            data[..end - self.pc].copy_from_slice(&self.code[self.pc..end]);
        }
        self.set_pc(self.pc + n);
        data
    }

    /// Resolve a jump target: it must hold a JUMPDEST that is not inside a
    /// push immediate
    pub fn validate_jump_dest(&self, pos: &DataWord) -> Result<usize, VmError> {
        let dest = pos
            .as_usize()
            .ok_or(VmError::InvalidJumpDestination(usize::MAX))?;
        if dest < self.code.len() && self.jumpdests[dest] {
            Ok(dest)
        } else {
            Err(VmError::InvalidJumpDestination(dest))
        }
    }

    /// Halt the frame
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// True once the frame has halted
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    // --- stack ---

    /// Immutable view of the stack
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Check the stack holds at least `required` words
    pub fn stack_require(&self, required: usize) -> Result<(), VmError> {
        self.stack.require(required)
    }

    /// Push a word
    pub fn stack_push(&mut self, value: DataWord) {
        self.stack.push(value);
    }

    /// Pop the top word
    pub fn stack_pop(&mut self) -> Result<DataWord, VmError> {
        self.stack.pop()
    }

    /// Duplicate the `n`-th word from the top
    pub fn stack_dup(&mut self, n: usize) -> Result<(), VmError> {
        self.stack.dup(n)
    }

    /// Swap the top word with the one `n` below
    pub fn stack_swap(&mut self, n: usize) -> Result<(), VmError> {
        self.stack.swap(n)
    }

    // --- gas ---

    /// Gas remaining in this frame
    pub fn gas(&self) -> u64 {
        self.gas
    }

    /// Deduct gas; going negative is the out-of-gas fault
    pub fn spend_gas(&mut self, amount: u64, cause: &str) -> Result<(), VmError> {
        debug!(target: "vm", amount, cause, left = self.gas, "spend gas");
        if self.gas < amount {
            return Err(VmError::OutOfGas);
        }
        self.gas -= amount;
        Ok(())
    }

    /// Burn everything that is left; the uniform reaction to a fault
    pub fn spend_all_gas(&mut self) {
        self.gas = 0;
    }

    /// Return unused gas to this frame (e.g. what a sub-call did not use)
    pub fn refund_gas(&mut self, amount: u64) {
        self.gas += amount;
    }

    /// Schedule gas to be refunded at transaction end
    pub fn future_refund_gas(&mut self, amount: u64) {
        self.result.add_refund(amount);
    }

    // --- memory ---

    /// Tracked memory size in bytes
    pub fn mem_size(&self) -> usize {
        self.memory.size()
    }

    /// Immutable view of memory, for dumps
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Physically grow memory to cover `[offset, offset + size)`; a
    /// zero-length window touches nothing
    pub fn memory_expand(&mut self, offset: &DataWord, size: &DataWord) -> Result<(), VmError> {
        if size.is_zero() {
            return Ok(());
        }
        let (offset, size) = self.window(offset, size)?;
        self.memory.extend_to(offset + size);
        Ok(())
    }

    /// Read a 32-byte word, expanding memory over the touched range
    pub fn memory_load(&mut self, addr: &DataWord) -> Result<DataWord, VmError> {
        let offset = addr.as_usize().ok_or(VmError::BadInstructionOperand)?;
        self.memory.extend_to(offset + 32);
        Ok(self.memory.load(offset))
    }

    /// Write a 32-byte word
    pub fn memory_save_word(&mut self, addr: &DataWord, value: &DataWord) -> Result<(), VmError> {
        let offset = addr.as_usize().ok_or(VmError::BadInstructionOperand)?;
        self.memory.store(offset, value);
        Ok(())
    }

    /// Write a single byte
    pub fn memory_save_byte(&mut self, addr: &DataWord, value: u8) -> Result<(), VmError> {
        let offset = addr.as_usize().ok_or(VmError::BadInstructionOperand)?;
        self.memory.store8(offset, value);
        Ok(())
    }

    /// Write a byte run at a word-addressed offset
    pub fn memory_save(&mut self, addr: &DataWord, data: &[u8]) -> Result<(), VmError> {
        let offset = addr.as_usize().ok_or(VmError::BadInstructionOperand)?;
        self.memory.store_slice(offset, data);
        Ok(())
    }

    /// Copy `[offset, offset + size)` out of memory, expanding over the
    /// range first; a zero-length window yields an empty buffer
    pub fn memory_chunk(&mut self, offset: &DataWord, size: &DataWord) -> Result<Vec<u8>, VmError> {
        if size.is_zero() {
            return Ok(Vec::new());
        }
        let (offset, size) = self.window(offset, size)?;
        self.memory.extend_to(offset + size);
        Ok(self.memory.load_slice(offset, size))
    }

    /// Write at most `max_size` bytes of `data` at `offset`; how call
    /// output lands in the caller's out window
    fn memory_save_limited(
        &mut self,
        offset: &DataWord,
        max_size: &DataWord,
        data: &[u8],
    ) -> Result<(), VmError> {
        if data.is_empty() || max_size.is_zero() {
            return Ok(());
        }
        let offset = offset.as_usize().ok_or(VmError::BadInstructionOperand)?;
        let cap = max_size.as_usize().unwrap_or(usize::MAX).min(data.len());
        self.memory.store_slice(offset, &data[..cap]);
        Ok(())
    }

    fn window(&self, offset: &DataWord, size: &DataWord) -> Result<(usize, usize), VmError> {
        let offset = offset.as_usize().ok_or(VmError::BadInstructionOperand)?;
        let size = size.as_usize().ok_or(VmError::BadInstructionOperand)?;
        offset
            .checked_add(size)
            .ok_or(VmError::BadInstructionOperand)?;
        Ok((offset, size))
    }

    // --- storage and accounts ---

    /// Read this contract's storage slot; `None` if never written
    pub fn storage_load(&self, key: &DataWord) -> Option<DataWord> {
        self.repo
            .storage(&self.invoke.owner, &word_to_slot(key))
            .map(slot_to_word)
    }

    /// Write this contract's storage slot
    pub fn storage_save(&mut self, key: &DataWord, value: &DataWord) {
        self.repo
            .set_storage(&self.invoke.owner, word_to_slot(key), word_to_slot(value));
    }

    /// Balance of an arbitrary account
    pub fn get_balance(&self, address: &DataWord) -> DataWord {
        DataWord::from(self.repo.balance(&address.last20()))
    }

    /// Code of an arbitrary account
    pub fn get_code_at(&self, address: &DataWord) -> Vec<u8> {
        self.repo.code(&address.last20())
    }

    /// Hash of a recent block, zero when unknown
    pub fn block_hash(&self, number: u64) -> DataWord {
        DataWord::from_be_bytes(*self.repo.block_hash(number).as_bytes())
    }

    /// This contract's storage slots, for dumps
    pub fn storage_dump(&self) -> Vec<(H256, H256)> {
        self.repo.storage_entries(&self.invoke.owner)
    }

    // --- halting and results ---

    /// Set the halt-return buffer
    pub fn set_h_return(&mut self, data: Vec<u8>) {
        self.result.set_h_return(data);
    }

    /// The in-progress result
    pub fn result(&self) -> &ProgramResult {
        &self.result
    }

    /// Mutable access to the in-progress result
    pub fn result_mut(&mut self) -> &mut ProgramResult {
        &mut self.result
    }

    /// Tear the frame apart into its result and unused gas
    pub fn into_parts(self) -> (ProgramResult, u64) {
        (self.result, self.gas)
    }

    /// Record a fault on the result
    pub fn set_runtime_failure(&mut self, error: VmError) {
        self.result.set_failure(error);
    }

    /// Schedule this contract for deletion and hand its whole balance to
    /// the named beneficiary. A normal halt.
    pub fn suicide(&mut self, beneficiary: &DataWord) {
        let owner = self.invoke.owner;
        let obtainer = beneficiary.last20();
        let balance = self.repo.balance(&owner);
        debug!(target: "vm", %owner, %obtainer, balance, "suicide");
        self.repo.transfer(&owner, &obtainer, balance);
        self.result.add_delete_account(owner);
    }

    // --- bookkeeping ---

    /// The environment this frame runs in
    pub fn invoke(&self) -> &ProgramInvoke {
        &self.invoke
    }

    /// The engine configuration
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Remember the opcode byte being decoded
    pub fn set_last_op(&mut self, op: u8) {
        self.last_op = op;
    }

    /// The opcode byte most recently decoded
    pub fn last_op(&self) -> u8 {
        self.last_op
    }

    /// Remember the opcode that just finished executing
    pub fn set_previously_executed_op(&mut self, op: u8) {
        self.previously_executed_op = Some(op);
    }

    /// The opcode that previously finished executing, if any
    pub fn previously_executed_op(&self) -> Option<u8> {
        self.previously_executed_op
    }

    /// Bump the executed-step counter
    pub fn count_step(&mut self) {
        self.step_count += 1;
    }

    /// Steps executed so far in this frame
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Append an opcode-trace record for the current machine state
    pub fn save_op_trace(&mut self) {
        self.traces.push(OpTrace {
            pc: self.pc,
            op: self.current_op(),
            gas: self.gas,
            depth: self.invoke.call_depth,
        });
    }

    /// The opcode trace collected so far (empty unless `vm_trace` is set)
    pub fn op_traces(&self) -> &[OpTrace] {
        &self.traces
    }

    // --- sub-calls and creation ---

    /// Deploy a new contract from init code in memory. On success the
    /// child's return buffer becomes the new contract's code and its
    /// address lands on the stack; on failure a zero word does.
    pub fn create_contract(
        &mut self,
        value: &DataWord,
        in_offset: &DataWord,
        in_size: &DataWord,
    ) -> Result<(), VmError> {
        let init_code = self.memory_chunk(in_offset, in_size)?;
        if self.invoke.by_testing_suite {
            let gas = self.gas;
            self.result.add_spawned_call(SpawnedCall {
                destination: None,
                value: *value,
                gas,
                input: init_code,
            });
            self.stack.push(DataWord::ZERO);
            return Ok(());
        }

        let owner = self.invoke.owner;
        let endowment = value.as_u128().unwrap_or(u128::MAX);
        if self.repo.balance(&owner) < endowment {
            self.stack.push(DataWord::ZERO);
            return Ok(());
        }

        let nonce = self.repo.nonce(&owner);
        let new_address = derive_contract_address(&owner, nonce);
        self.repo.increment_nonce(&owner);

        // The child runs with everything this frame has left; the caller
        // is charged afterwards for what the child used.
        let gas_limit = self.gas;
        let config = self.config.clone();
        let child_invoke = self.invoke.child(new_address, owner, *value, Vec::new(), gas_limit);
        let precompiles = self.precompiles;

        let (child_result, gas_left) = {
            let mut track = RepositoryTrack::new(&mut *self.repo);
            track.transfer(&owner, &new_address, endowment);
            if init_code.is_empty() {
                track.commit();
                (None, gas_limit)
            } else {
                let mut child =
                    Program::new(init_code, child_invoke, &mut track, precompiles, config.clone());
                let mut vm = Vm::with_config(config);
                vm.play(&mut child);
                let (result, gas_left) = child.into_parts();
                if result.failure().is_none() {
                    track.set_code(&new_address, result.h_return().to_vec());
                    track.commit();
                } else {
                    track.rollback();
                }
                (Some(result), gas_left)
            }
        };

        self.spend_gas(gas_limit - gas_left, "contract creation")?;
        match child_result {
            None => self.stack.push(DataWord::from(new_address)),
            Some(result) if result.failure().is_none() => {
                self.result.merge(result);
                self.stack.push(DataWord::from(new_address));
            }
            Some(_) => self.stack.push(DataWord::ZERO),
        }
        Ok(())
    }

    /// Dispatch a CALL or CALLCODE to contract code. The forwarded gas is
    /// withdrawn up front; a successful child refunds what it did not use
    /// and merges its side effects, a failed child leaves only a zero on
    /// the stack.
    pub fn call_to_address(&mut self, msg: MessageCall) -> Result<(), VmError> {
        let in_data = self.memory_chunk(&msg.in_offset, &msg.in_size)?;
        if self.invoke.by_testing_suite {
            self.result.add_spawned_call(SpawnedCall {
                destination: Some(msg.code_address.last20()),
                value: msg.value,
                gas: msg.gas,
                input: in_data,
            });
            self.stack.push(DataWord::ONE);
            return Ok(());
        }

        self.spend_gas(msg.gas, "forwarded call gas")?;
        let owner = self.invoke.owner;
        let code_address = msg.code_address.last20();
        let endowment = match msg.value.as_u128() {
            Some(v) if self.repo.balance(&owner) >= v => v,
            _ => {
                self.refund_gas(msg.gas);
                self.stack.push(DataWord::ZERO);
                return Ok(());
            }
        };

        let context_address = match msg.kind {
            MsgKind::Call => code_address,
            MsgKind::Stateless => owner,
        };
        let code = self.repo.code(&code_address);
        let config = self.config.clone();
        let child_invoke = self
            .invoke
            .child(context_address, owner, msg.value, in_data, msg.gas);
        let precompiles = self.precompiles;

        let (child_result, gas_left) = {
            let mut track = RepositoryTrack::new(&mut *self.repo);
            track.transfer(&owner, &context_address, endowment);
            if code.is_empty() {
                track.commit();
                (None, msg.gas)
            } else {
                let mut child =
                    Program::new(code, child_invoke, &mut track, precompiles, config.clone());
                let mut vm = Vm::with_config(config);
                vm.play(&mut child);
                let (result, gas_left) = child.into_parts();
                if result.failure().is_none() {
                    track.commit();
                } else {
                    track.rollback();
                }
                (Some(result), gas_left)
            }
        };

        match child_result {
            None => {
                self.refund_gas(gas_left);
                self.stack.push(DataWord::ONE);
            }
            Some(result) if result.failure().is_none() => {
                let output = result.h_return().to_vec();
                self.memory_save_limited(&msg.out_offset, &msg.out_size, &output)?;
                self.refund_gas(gas_left);
                self.result.merge(result);
                self.stack.push(DataWord::ONE);
            }
            Some(_) => self.stack.push(DataWord::ZERO),
        }
        Ok(())
    }

    /// Run a precompiled contract directly instead of spinning up a frame
    pub fn call_to_precompiled(
        &mut self,
        msg: MessageCall,
        contract: &dyn PrecompiledContract,
    ) -> Result<(), VmError> {
        let in_data = self.memory_chunk(&msg.in_offset, &msg.in_size)?;
        self.spend_gas(msg.gas, "forwarded call gas")?;
        let owner = self.invoke.owner;
        let code_address = msg.code_address.last20();
        let endowment = match msg.value.as_u128() {
            Some(v) if self.repo.balance(&owner) >= v => v,
            _ => {
                self.refund_gas(msg.gas);
                self.stack.push(DataWord::ZERO);
                return Ok(());
            }
        };

        let required = contract.gas_for_data(&in_data);
        if msg.gas < required {
            self.stack.push(DataWord::ZERO);
            return Ok(());
        }
        self.repo.transfer(&owner, &code_address, endowment);
        let output = contract.execute(&in_data);
        self.memory_save_limited(&msg.out_offset, &msg.out_size, &output)?;
        self.refund_gas(msg.gas - required);
        self.stack.push(DataWord::ONE);
        Ok(())
    }

    /// The precompile registered for `address`, if any
    pub fn precompile_for(&self, address: &DataWord) -> Option<&'a dyn PrecompiledContract> {
        self.precompiles.contract_for_address(address)
    }
}

/// Scan code for JUMPDEST positions, skipping push immediates so a
/// destination inside one is never valid.
fn analyze_jump_dests(code: &[u8]) -> Vec<bool> {
    let mut dests = vec![false; code.len()];
    let mut i = 0;
    while i < code.len() {
        let op = code[i];
        if op == 0x5B {
            dests[i] = true;
        }
        if (0x60..=0x7F).contains(&op) {
            i += (op - 0x5F) as usize;
        }
        i += 1;
    }
    dests
}

/// Address of a contract created by `sender` at `nonce`
fn derive_contract_address(sender: &Address, nonce: u64) -> Address {
    let mut seed = Vec::with_capacity(28);
    seed.extend_from_slice(sender.as_bytes());
    seed.extend_from_slice(&nonce.to_be_bytes());
    let hash = keccak256(&seed);
    let mut out = [0u8; 20];
    out.copy_from_slice(&hash.as_bytes()[12..32]);
    Address::from_bytes(out)
}

fn word_to_slot(word: &DataWord) -> H256 {
    H256::from_bytes(word.to_be_bytes())
}

fn slot_to_word(slot: H256) -> DataWord {
    DataWord::from_be_bytes(*slot.as_bytes())
}
