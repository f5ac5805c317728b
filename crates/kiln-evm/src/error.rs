//! Execution faults

use thiserror::Error;

/// The ways a frame can halt exceptionally.
///
/// Every variant is uniformly fatal to the current frame: the machine burns
/// all remaining gas, sets the stopped flag, and the failure is recorded on
/// the frame's result for the caller to classify. Normal halts (STOP,
/// RETURN, SUICIDE, running off the end of code) are not faults.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// The gas counter would go negative
    #[error("out of gas")]
    OutOfGas,

    /// The byte at the program counter does not decode to an opcode
    #[error("invalid instruction: 0x{0:02x}")]
    InvalidInstruction(u8),

    /// The stack holds fewer items than the opcode requires
    #[error("stack underflow: opcode requires {required}, stack has {found}")]
    StackUnderflow {
        /// Items the opcode requires
        required: usize,
        /// Items actually on the stack
        found: usize,
    },

    /// The jump target is not a JUMPDEST, or lies inside a push immediate
    #[error("invalid jump destination: {0}")]
    InvalidJumpDestination(usize),

    /// An operand cannot be represented (e.g. a memory offset past the
    /// addressable range)
    #[error("bad instruction operand")]
    BadInstructionOperand,
}
