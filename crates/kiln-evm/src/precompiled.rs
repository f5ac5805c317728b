//! Precompiled contract dispatch
//!
//! The engine only dispatches: when a CALL target resolves to a registered
//! precompile, it runs that contract natively instead of spinning up a
//! frame. The implementations themselves live with the host.

use kiln_primitives::DataWord;

/// A built-in contract: a pure function of its input.
pub trait PrecompiledContract {
    /// Gas required to run over this input
    fn gas_for_data(&self, data: &[u8]) -> u64;

    /// Produce the output for this input
    fn execute(&self, data: &[u8]) -> Vec<u8>;
}

/// Resolves call target addresses to precompiled contracts.
pub trait PrecompileRegistry {
    /// The precompile addressable at `address`, if any
    fn contract_for_address(&self, address: &DataWord) -> Option<&dyn PrecompiledContract>;
}

/// A registry with no precompiles; every call goes to byte-code.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyRegistry;

impl PrecompileRegistry for EmptyRegistry {
    fn contract_for_address(&self, _address: &DataWord) -> Option<&dyn PrecompiledContract> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = EmptyRegistry;
        assert!(registry.contract_for_address(&DataWord::ONE).is_none());
        assert!(registry.contract_for_address(&DataWord::ZERO).is_none());
    }
}
