//! # kiln-evm
//!
//! A deterministic, gas-metered, stack-based byte-code interpreter for
//! Ethereum-style smart contracts.
//!
//! The machine executes over 256-bit words ([`kiln_primitives::DataWord`])
//! against an external account/storage view
//! ([`kiln_storage::Repository`]). A [`Program`] carries the mutable state
//! of one call frame (stack, memory, gas counter, program counter, result);
//! [`Vm::play`] drives [`Vm::step`] until the frame halts, normally or
//! exceptionally. Sub-calls and contract creation run nested frames against
//! a [`kiln_storage::RepositoryTrack`], so a failing child leaves no trace
//! in the parent state.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
pub mod gas;
mod invoke;
mod memory;
mod opcode;
mod precompiled;
mod program;
mod result;
mod stack;
mod vm;

pub use config::{DumpStyle, VmConfig};
pub use error::VmError;
pub use invoke::ProgramInvoke;
pub use memory::Memory;
pub use opcode::{OpCategory, OpCode};
pub use precompiled::{EmptyRegistry, PrecompileRegistry, PrecompiledContract};
pub use program::{MessageCall, MsgKind, OpTrace, Program};
pub use result::{LogEntry, ProgramResult, SpawnedCall};
pub use stack::Stack;
pub use vm::Vm;
