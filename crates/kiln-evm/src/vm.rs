//! The fetch/decode/meter/execute loop

use crate::config::{DumpStyle, VmConfig};
use crate::error::VmError;
use crate::gas::{self, cost};
use crate::opcode::OpCode;
use crate::program::{MessageCall, MsgKind, Program};
use crate::result::LogEntry;
use kiln_crypto::keccak256;
use kiln_primitives::{DataWord, H256};
use tracing::{trace, warn};

/// The interpreter. [`step`](Vm::step) runs one instruction;
/// [`play`](Vm::play) is the outer driver that charges transaction entry
/// costs and loops until the program halts.
///
/// Execution is strictly single-threaded and synchronous: an opcode either
/// completes, halts the machine, or faults. Sub-calls recurse through a
/// fresh `Vm` carrying the same configuration.
pub struct Vm {
    config: VmConfig,
    vm_counter: u64,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// An interpreter with default configuration
    pub fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    /// An interpreter with the given configuration
    pub fn with_config(config: VmConfig) -> Self {
        Vm {
            config,
            vm_counter: 0,
        }
    }

    /// Execute a single instruction.
    ///
    /// On any fault the machine burns all remaining gas, stops, and the
    /// fault is returned for the caller to classify.
    pub fn step(&mut self, program: &mut Program) -> Result<(), VmError> {
        if self.config.vm_trace {
            program.save_op_trace();
        }
        match self.exec_step(program) {
            Ok(()) => Ok(()),
            Err(error) => {
                warn!(target: "vm", %error, "VM halted");
                program.spend_all_gas();
                program.stop();
                Err(error)
            }
        }
    }

    fn exec_step(&mut self, program: &mut Program) -> Result<(), VmError> {
        use OpCode::*;

        let op_byte = program.current_op();
        let op = OpCode::from_byte(op_byte).ok_or(VmError::InvalidInstruction(op_byte))?;
        program.set_last_op(op_byte);
        program.stack_require(op.require())?;

        let old_mem_size = program.mem_size();
        let mut new_mem_size: u128 = 0;
        let mut copy_size: u64 = 0;
        let mut gas_cost = cost::STEP;
        let mut call_gas = 0u64;
        let gas_before = program.gas();
        let pc_before = program.pc();
        let op_name = format!("{op:?}");

        // Fee calculation: base cost plus the memory and copy windows this
        // opcode will touch.
        match op {
            STOP | SUICIDE => gas_cost = cost::STOP,
            SSTORE => {
                let key = *program.stack().peek()?;
                let new_value = *program.stack().peek_at(1)?;
                let old_nonzero = program
                    .storage_load(&key)
                    .is_some_and(|v| !v.is_zero());
                gas_cost = if !old_nonzero && !new_value.is_zero() {
                    cost::SSTORE
                } else if old_nonzero && new_value.is_zero() {
                    program.future_refund_gas(cost::REFUND_SSTORE);
                    0
                } else {
                    cost::RESET_SSTORE
                };
            }
            SLOAD => gas_cost = cost::SLOAD,
            BALANCE => gas_cost = cost::BALANCE,
            MLOAD | MSTORE => {
                new_mem_size = mem_needed(program.stack().peek()?, &DataWord::from(32u64))?;
            }
            MSTORE8 => {
                new_mem_size = mem_needed(program.stack().peek()?, &DataWord::ONE)?;
            }
            RETURN => {
                new_mem_size = mem_needed(program.stack().peek()?, program.stack().peek_at(1)?)?;
            }
            SHA3 => {
                gas_cost = cost::SHA3;
                new_mem_size = mem_needed(program.stack().peek()?, program.stack().peek_at(1)?)?;
                let len = word_to_len(program.stack().peek_at(1)?)?;
                gas_cost += gas::sha3_word_gas(len);
            }
            CALLDATACOPY | CODECOPY => {
                copy_size = word_to_len(program.stack().peek_at(2)?)?;
                new_mem_size = mem_needed(program.stack().peek()?, program.stack().peek_at(2)?)?;
            }
            EXTCODECOPY => {
                copy_size = word_to_len(program.stack().peek_at(3)?)?;
                new_mem_size =
                    mem_needed(program.stack().peek_at(1)?, program.stack().peek_at(3)?)?;
            }
            CALL | CALLCODE => {
                gas_cost = cost::CALL;
                let call_gas_word = program.stack().peek()?;
                if call_gas_word.as_u64().map_or(true, |g| g > program.gas()) {
                    return Err(VmError::OutOfGas);
                }
                call_gas = call_gas_word.low_u64();
                let needed_in =
                    mem_needed(program.stack().peek_at(3)?, program.stack().peek_at(4)?)?;
                let needed_out =
                    mem_needed(program.stack().peek_at(5)?, program.stack().peek_at(6)?)?;
                new_mem_size = needed_in.max(needed_out);
            }
            CREATE => {
                gas_cost = cost::CREATE;
                new_mem_size =
                    mem_needed(program.stack().peek_at(1)?, program.stack().peek_at(2)?)?;
            }
            LOG0 | LOG1 | LOG2 | LOG3 | LOG4 => {
                new_mem_size = mem_needed(program.stack().peek()?, program.stack().peek_at(1)?)?;
                let data_len = word_to_len(program.stack().peek_at(1)?)?;
                // The data cost alone is checked before the full cost is
                // assembled and charged.
                let data_cost = cost::LOG_DATA
                    .checked_mul(data_len)
                    .ok_or(VmError::OutOfGas)?;
                if data_cost > program.gas() {
                    return Err(VmError::OutOfGas);
                }
                gas_cost = gas::log_gas(op.log_topics(), data_len);
            }
            EXP => {
                gas_cost = gas::exp_gas(program.stack().peek_at(1)?.bytes_occupied());
            }
            _ => {}
        }
        program.spend_gas(gas_cost, &op_name)?;

        let mem_gas = gas::memory_expansion_gas(old_mem_size, new_mem_size);
        let mut mem_gas_charged = 0u64;
        if mem_gas > 0 {
            mem_gas_charged = u64::try_from(mem_gas).map_err(|_| VmError::OutOfGas)?;
            program.spend_gas(mem_gas_charged, "memory expansion")?;
        }

        if copy_size > 0 {
            program.spend_gas(gas::copy_gas(copy_size), "copy")?;
        }

        if self.config.dump_block == Some(program.invoke().number) {
            self.dump_line(op, gas_before, gas_cost + mem_gas_charged + call_gas, program);
        }

        // Execute
        match op {
            STOP => {
                program.set_h_return(Vec::new());
                program.stop();
            }
            ADD => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a.wrapping_add(&b));
                program.advance();
            }
            MUL => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a.wrapping_mul(&b));
                program.advance();
            }
            SUB => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a.wrapping_sub(&b));
                program.advance();
            }
            DIV => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a.div(&b));
                program.advance();
            }
            SDIV => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a.sdiv(&b));
                program.advance();
            }
            MOD => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a.rem(&b));
                program.advance();
            }
            SMOD => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a.smod(&b));
                program.advance();
            }
            EXP => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a.exp(&b));
                program.advance();
            }
            SIGNEXTEND => {
                let k = program.stack_pop()?;
                let x = program.stack_pop()?;
                let extended = match k.as_usize() {
                    Some(k) if k < 32 => x.sign_extend(k),
                    _ => x,
                };
                program.stack_push(extended);
                program.advance();
            }
            NOT => {
                let a = program.stack_pop()?;
                program.stack_push(!a);
                program.advance();
            }
            LT => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(bool_word(a < b));
                program.advance();
            }
            GT => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(bool_word(a > b));
                program.advance();
            }
            SLT => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(bool_word(a.slt(&b)));
                program.advance();
            }
            SGT => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(bool_word(a.sgt(&b)));
                program.advance();
            }
            EQ => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(bool_word(a == b));
                program.advance();
            }
            ISZERO => {
                let a = program.stack_pop()?;
                program.stack_push(bool_word(a.is_zero()));
                program.advance();
            }
            AND => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a & b);
                program.advance();
            }
            OR => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a | b);
                program.advance();
            }
            XOR => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                program.stack_push(a ^ b);
                program.advance();
            }
            BYTE => {
                let i = program.stack_pop()?;
                let x = program.stack_pop()?;
                program.stack_push(x.byte(&i));
                program.advance();
            }
            ADDMOD => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                let n = program.stack_pop()?;
                program.stack_push(a.addmod(&b, &n));
                program.advance();
            }
            MULMOD => {
                let a = program.stack_pop()?;
                let b = program.stack_pop()?;
                let n = program.stack_pop()?;
                program.stack_push(a.mulmod(&b, &n));
                program.advance();
            }
            SHA3 => {
                let offset = program.stack_pop()?;
                let size = program.stack_pop()?;
                let data = program.memory_chunk(&offset, &size)?;
                let hash = keccak256(&data);
                program.stack_push(DataWord::from_be_bytes(*hash.as_bytes()));
                program.advance();
            }
            ADDRESS => {
                program.stack_push(DataWord::from(program.invoke().owner));
                program.advance();
            }
            BALANCE => {
                let address = program.stack_pop()?;
                let balance = program.get_balance(&address);
                program.stack_push(balance);
                program.advance();
            }
            ORIGIN => {
                program.stack_push(DataWord::from(program.invoke().origin));
                program.advance();
            }
            CALLER => {
                program.stack_push(DataWord::from(program.invoke().caller));
                program.advance();
            }
            CALLVALUE => {
                program.stack_push(program.invoke().value);
                program.advance();
            }
            CALLDATALOAD => {
                let offset = program.stack_pop()?;
                program.stack_push(program.invoke().data_value(&offset));
                program.advance();
            }
            CALLDATASIZE => {
                program.stack_push(program.invoke().data_size());
                program.advance();
            }
            CALLDATACOPY => {
                let mem_offset = program.stack_pop()?;
                let data_offset = program.stack_pop()?;
                let size = program.stack_pop()?;
                let size = size.as_usize().ok_or(VmError::BadInstructionOperand)?;
                let data = program.invoke().data_copy(&data_offset, size);
                program.memory_save(&mem_offset, &data)?;
                program.advance();
            }
            CODESIZE => {
                program.stack_push(DataWord::from(program.code().len()));
                program.advance();
            }
            CODECOPY => {
                let mem_offset = program.stack_pop()?;
                let code_offset = program.stack_pop()?;
                let size = program.stack_pop()?;
                let size = size.as_usize().ok_or(VmError::BadInstructionOperand)?;
                let data = copy_padded(program.code(), &code_offset, size);
                program.memory_save(&mem_offset, &data)?;
                program.advance();
            }
            EXTCODESIZE => {
                let address = program.stack_pop()?;
                let length = program.get_code_at(&address).len();
                program.stack_push(DataWord::from(length));
                program.advance();
            }
            EXTCODECOPY => {
                let address = program.stack_pop()?;
                let code = program.get_code_at(&address);
                let mem_offset = program.stack_pop()?;
                let code_offset = program.stack_pop()?;
                let size = program.stack_pop()?;
                let size = size.as_usize().ok_or(VmError::BadInstructionOperand)?;
                let data = copy_padded(&code, &code_offset, size);
                program.memory_save(&mem_offset, &data)?;
                program.advance();
            }
            GASPRICE => {
                program.stack_push(program.invoke().gas_price);
                program.advance();
            }
            BLOCKHASH => {
                let number = program.stack_pop()?;
                let hash = program.block_hash(number.as_u64().unwrap_or(u64::MAX));
                program.stack_push(hash);
                program.advance();
            }
            COINBASE => {
                program.stack_push(DataWord::from(program.invoke().coinbase));
                program.advance();
            }
            TIMESTAMP => {
                program.stack_push(DataWord::from(program.invoke().timestamp));
                program.advance();
            }
            NUMBER => {
                program.stack_push(DataWord::from(program.invoke().number));
                program.advance();
            }
            DIFFICULTY => {
                program.stack_push(program.invoke().difficulty);
                program.advance();
            }
            GASLIMIT => {
                program.stack_push(DataWord::from(program.invoke().gas_limit));
                program.advance();
            }
            POP => {
                program.stack_pop()?;
                program.advance();
            }
            MLOAD => {
                let addr = program.stack_pop()?;
                let value = program.memory_load(&addr)?;
                program.stack_push(value);
                program.advance();
            }
            MSTORE => {
                let addr = program.stack_pop()?;
                let value = program.stack_pop()?;
                program.memory_save_word(&addr, &value)?;
                program.advance();
            }
            MSTORE8 => {
                let addr = program.stack_pop()?;
                let value = program.stack_pop()?;
                program.memory_save_byte(&addr, value.to_be_bytes()[31])?;
                program.advance();
            }
            SLOAD => {
                let key = program.stack_pop()?;
                let value = program.storage_load(&key).unwrap_or(DataWord::ZERO);
                program.stack_push(value);
                program.advance();
            }
            SSTORE => {
                let key = program.stack_pop()?;
                let value = program.stack_pop()?;
                program.storage_save(&key, &value);
                program.advance();
            }
            JUMP => {
                let pos = program.stack_pop()?;
                let dest = program.validate_jump_dest(&pos)?;
                program.set_pc(dest);
            }
            JUMPI => {
                let pos = program.stack_pop()?;
                let condition = program.stack_pop()?;
                if !condition.is_zero() {
                    let dest = program.validate_jump_dest(&pos)?;
                    program.set_pc(dest);
                } else {
                    program.advance();
                }
            }
            PC => {
                program.stack_push(DataWord::from(pc_before));
                program.advance();
            }
            MSIZE => {
                program.stack_push(DataWord::from(program.mem_size()));
                program.advance();
            }
            GAS => {
                program.stack_push(DataWord::from(program.gas()));
                program.advance();
            }
            JUMPDEST => {
                program.advance();
            }
            op if op.is_push() => {
                program.advance();
                let data = program.sweep(op.push_size());
                program.stack_push(DataWord::from_big_endian(&data));
            }
            op if op.dup_depth() > 0 => {
                program.stack_dup(op.dup_depth())?;
                program.advance();
            }
            op if op.swap_depth() > 0 => {
                program.stack_swap(op.swap_depth())?;
                program.advance();
            }
            LOG0 | LOG1 | LOG2 | LOG3 | LOG4 => {
                let address = program.invoke().owner;
                let mem_start = program.stack_pop()?;
                // The second operand is the byte length of the log data.
                let mem_len = program.stack_pop()?;
                let mut topics = Vec::with_capacity(op.log_topics());
                for _ in 0..op.log_topics() {
                    let topic = program.stack_pop()?;
                    topics.push(H256::from_bytes(topic.to_be_bytes()));
                }
                let data = program.memory_chunk(&mem_start, &mem_len)?;
                program.result_mut().add_log(LogEntry {
                    address,
                    topics,
                    data,
                });
                program.advance();
            }
            CREATE => {
                let value = program.stack_pop()?;
                let in_offset = program.stack_pop()?;
                let in_size = program.stack_pop()?;
                program.create_contract(&value, &in_offset, &in_size)?;
                program.advance();
            }
            CALL | CALLCODE => {
                let _gas_word = program.stack_pop()?;
                let code_address = program.stack_pop()?;
                let value = program.stack_pop()?;
                let in_offset = program.stack_pop()?;
                let in_size = program.stack_pop()?;
                let out_offset = program.stack_pop()?;
                let out_size = program.stack_pop()?;

                program.memory_expand(&out_offset, &out_size)?;
                let msg = MessageCall {
                    kind: if op == CALL {
                        MsgKind::Call
                    } else {
                        MsgKind::Stateless
                    },
                    gas: call_gas,
                    code_address,
                    value,
                    in_offset,
                    in_size,
                    out_offset,
                    out_size,
                };
                match program.precompile_for(&code_address) {
                    Some(contract) => program.call_to_precompiled(msg, contract)?,
                    None => program.call_to_address(msg)?,
                }
                program.advance();
            }
            RETURN => {
                let offset = program.stack_pop()?;
                let size = program.stack_pop()?;
                let data = program.memory_chunk(&offset, &size)?;
                program.set_h_return(data);
                program.advance();
                program.stop();
            }
            SUICIDE => {
                let address = program.stack_pop()?;
                program.suicide(&address);
                program.stop();
            }
            _ => return Err(VmError::InvalidInstruction(op_byte)),
        }

        program.set_previously_executed_op(op_byte);
        program.count_step();
        self.vm_counter += 1;
        trace!(
            target: "vm",
            pc = pc_before,
            op = %op_name,
            category = ?op.category(),
            gas = program.gas(),
            depth = program.invoke().call_depth,
            "step"
        );
        Ok(())
    }

    /// The outer driver: charge transaction entry costs when the frame was
    /// invoked by a transaction, honour the testing-suite early return,
    /// then step until the program halts. Faults are recorded on the
    /// result.
    pub fn play(&mut self, program: &mut Program) {
        if program.invoke().by_transaction {
            if let Err(error) = self.charge_transaction_costs(program) {
                program.stop();
                program.set_runtime_failure(error);
                return;
            }
        }

        if program.invoke().by_testing_suite {
            return;
        }

        while !program.is_stopped() {
            if let Err(error) = self.step(program) {
                program.set_runtime_failure(error);
                return;
            }
        }
    }

    fn charge_transaction_costs(&mut self, program: &mut Program) -> Result<(), VmError> {
        program.spend_gas(cost::TRANSACTION, "TRANSACTION")?;
        let data_size = program.invoke().data.len() as u64;
        let non_zero = program.invoke().count_non_zero_data();
        let zero = data_size - non_zero;
        program.spend_gas(cost::TX_NO_ZERO_DATA * non_zero, "DATA")?;
        program.spend_gas(cost::TX_ZERO_DATA * zero, "DATA")?;
        Ok(())
    }

    /// Per-step state dump, emitted while executing in the configured
    /// block. `standard+` is one line per step (owner, pc, op, gas), with
    /// a storage listing on halting opcodes; `pretty` is a full stack,
    /// memory and storage rendering.
    fn dump_line(&self, op: OpCode, gas_before: u64, gas_cost: u64, program: &Program) {
        match self.config.dump_style {
            DumpStyle::StandardPlus => {
                if matches!(op, OpCode::STOP | OpCode::RETURN | OpCode::SUICIDE) {
                    let mut entries = program.storage_dump();
                    entries.sort();
                    for (key, value) in entries {
                        trace!(
                            target: "dump",
                            "{} {}",
                            hex::encode(key.as_bytes()),
                            hex::encode(value.as_bytes())
                        );
                    }
                }
                trace!(
                    target: "dump",
                    "{} {:x} {:02x} {:x}",
                    program.invoke().owner,
                    program.pc(),
                    op.byte(),
                    gas_before
                );
            }
            DumpStyle::Pretty => {
                trace!(target: "dump", "    STACK");
                for item in program.stack().as_slice() {
                    trace!(target: "dump", "{item}");
                }
                trace!(target: "dump", "    MEMORY");
                let memory = program.memory().hex_dump();
                if !memory.is_empty() {
                    trace!(target: "dump", "{memory}");
                }
                trace!(target: "dump", "    STORAGE");
                let mut entries = program.storage_dump();
                entries.sort();
                for (key, value) in entries {
                    trace!(target: "dump", "{key}: {value}");
                }
                trace!(
                    target: "dump",
                    depth = program.invoke().call_depth,
                    contract = %program.invoke().owner,
                    counter = self.vm_counter,
                    steps = program.step_count(),
                    op = ?op,
                    gas_before,
                    gas_cost,
                    "step"
                );
            }
        }
    }
}

/// Total memory an access needs: `offset + size`, or zero for a
/// zero-length access. Anything that cannot be priced in the gas width is
/// an immediate out-of-gas.
fn mem_needed(offset: &DataWord, size: &DataWord) -> Result<u128, VmError> {
    if size.is_zero() {
        return Ok(0);
    }
    let offset = offset.as_u128().ok_or(VmError::OutOfGas)?;
    let size = size.as_u128().ok_or(VmError::OutOfGas)?;
    let needed = offset.checked_add(size).ok_or(VmError::OutOfGas)?;
    if needed > cost::MAX_MEM_NEEDED {
        return Err(VmError::OutOfGas);
    }
    Ok(needed)
}

/// A byte length that feeds a gas formula; lengths past the memory ceiling
/// can never be paid for
fn word_to_len(word: &DataWord) -> Result<u64, VmError> {
    match word.as_u128() {
        Some(len) if len <= cost::MAX_MEM_NEEDED => Ok(len as u64),
        _ => Err(VmError::OutOfGas),
    }
}

fn bool_word(value: bool) -> DataWord {
    if value {
        DataWord::ONE
    } else {
        DataWord::ZERO
    }
}

/// Copy `len` bytes out of `source` at `offset`, zero-padded where the
/// source runs out
fn copy_padded(source: &[u8], offset: &DataWord, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    if let Some(offset) = offset.as_usize() {
        if offset < source.len() {
            let end = (offset + len).min(source.len());
            out[..end - offset].copy_from_slice(&source[offset..end]);
        }
    }
    out
}
