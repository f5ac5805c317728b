//! Per-engine configuration

/// How a per-step dump is rendered when `dump_block` matches.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DumpStyle {
    /// One line per step: owner address, program counter, opcode, gas left
    #[default]
    StandardPlus,
    /// Full stack, memory and storage dump per step
    Pretty,
}

/// Engine configuration, passed explicitly to [`crate::Vm`] and threaded to
/// nested frames. Swapping it never has process-wide side effects.
#[derive(Clone, Debug, Default)]
pub struct VmConfig {
    /// Record an [`crate::OpTrace`] on the program for every executed opcode
    pub vm_trace: bool,
    /// Emit per-step dumps while executing in this block number
    pub dump_block: Option<u64>,
    /// Rendering style for the per-step dumps
    pub dump_style: DumpStyle,
}
