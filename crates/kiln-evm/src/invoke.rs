//! The immutable per-call environment

use kiln_primitives::{Address, DataWord};

/// Everything a frame knows about the call that created it and the block it
/// runs in. Immutable for the lifetime of the frame; a child frame gets a
/// derived copy with its own owner, value, data and gas, and the call depth
/// incremented.
#[derive(Clone, Debug, Default)]
pub struct ProgramInvoke {
    /// The executing contract's address
    pub owner: Address,
    /// The externally-owned account the whole transaction came from
    pub origin: Address,
    /// The immediate caller of this frame
    pub caller: Address,
    /// Value attached to the call
    pub value: DataWord,
    /// Gas available to this frame
    pub gas: u64,
    /// Price the transaction pays per unit of gas
    pub gas_price: DataWord,
    /// Call input data
    pub data: Vec<u8>,
    /// Block coinbase
    pub coinbase: Address,
    /// Block timestamp
    pub timestamp: u64,
    /// Block number
    pub number: u64,
    /// Block difficulty
    pub difficulty: DataWord,
    /// Block gas limit
    pub gas_limit: u64,
    /// Nesting depth, zero for the top-level frame
    pub call_depth: usize,
    /// True only for the top-level entry from the transaction processor;
    /// the driver charges transaction base costs when set
    pub by_transaction: bool,
    /// Conformance-test entry: the driver returns before executing, and
    /// calls/creates are recorded instead of dispatched
    pub by_testing_suite: bool,
}

impl ProgramInvoke {
    /// A minimal invoke for driving a contract directly
    pub fn new(owner: Address, caller: Address, value: DataWord, data: Vec<u8>, gas: u64) -> Self {
        ProgramInvoke {
            owner,
            origin: caller,
            caller,
            value,
            gas,
            data,
            ..Default::default()
        }
    }

    /// Input length as a word
    pub fn data_size(&self) -> DataWord {
        DataWord::from(self.data.len())
    }

    /// A 32-byte read of the input at `offset`, zero-padded past the end.
    /// Offsets beyond the addressable range read as zero.
    pub fn data_value(&self, offset: &DataWord) -> DataWord {
        let mut bytes = [0u8; 32];
        if let Some(offset) = offset.as_usize() {
            if offset < self.data.len() {
                let end = (offset + 32).min(self.data.len());
                bytes[..end - offset].copy_from_slice(&self.data[offset..end]);
            }
        }
        DataWord::from_be_bytes(bytes)
    }

    /// Copy `size` input bytes starting at `offset`, zero-padded past the
    /// end of the input
    pub fn data_copy(&self, offset: &DataWord, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size];
        if let Some(offset) = offset.as_usize() {
            if offset < self.data.len() {
                let end = (offset + size).min(self.data.len());
                out[..end - offset].copy_from_slice(&self.data[offset..end]);
            }
        }
        out
    }

    /// Count of non-zero input bytes, for transaction data pricing
    pub fn count_non_zero_data(&self) -> u64 {
        self.data.iter().filter(|&&b| b != 0).count() as u64
    }

    /// Derive the invoke for a nested frame. Block context and origin carry
    /// over; the depth increments; the transaction flag clears.
    pub fn child(
        &self,
        owner: Address,
        caller: Address,
        value: DataWord,
        data: Vec<u8>,
        gas: u64,
    ) -> ProgramInvoke {
        ProgramInvoke {
            owner,
            origin: self.origin,
            caller,
            value,
            gas,
            gas_price: self.gas_price,
            data,
            coinbase: self.coinbase,
            timestamp: self.timestamp,
            number: self.number,
            difficulty: self.difficulty,
            gas_limit: self.gas_limit,
            call_depth: self.call_depth + 1,
            by_transaction: false,
            by_testing_suite: self.by_testing_suite,
        }
    }
}
