//! The gas cost schedule and the dynamic pricing helpers

/// Constant gas costs.
pub mod cost {
    /// Default cost of one step
    pub const STEP: u64 = 1;
    /// STOP is free
    pub const STOP: u64 = 0;
    /// SUICIDE is free
    pub const SUICIDE: u64 = 0;
    /// Storage read
    pub const SLOAD: u64 = 20;
    /// Balance read
    pub const BALANCE: u64 = 20;
    /// SHA3 base cost
    pub const SHA3: u64 = 10;
    /// SHA3 per 32-byte word of input
    pub const SHA3_WORD: u64 = 10;
    /// CALL / CALLCODE base cost, on top of the forwarded gas
    pub const CALL: u64 = 20;
    /// CREATE base cost
    pub const CREATE: u64 = 100;
    /// Memory cost per 32-byte word
    pub const MEMORY: u64 = 1;
    /// Writing a non-zero value into a zero slot
    pub const SSTORE: u64 = 300;
    /// Overwriting a slot without clearing it
    pub const RESET_SSTORE: u64 = 100;
    /// Gas scheduled back for clearing a non-zero slot
    pub const REFUND_SSTORE: u64 = 100;
    /// EXP base cost
    pub const EXP: u64 = 10;
    /// EXP per byte of exponent
    pub const EXP_BYTE: u64 = 10;
    /// Copy cost per 32-byte word
    pub const COPY: u64 = 1;
    /// LOG base cost
    pub const LOG: u64 = 32;
    /// LOG per topic
    pub const LOG_TOPIC: u64 = 32;
    /// LOG per byte of data
    pub const LOG_DATA: u64 = 1;
    /// Base cost of a top-level transaction
    pub const TRANSACTION: u64 = 500;
    /// Per non-zero byte of transaction input
    pub const TX_NO_ZERO_DATA: u64 = 5;
    /// Per zero byte of transaction input
    pub const TX_ZERO_DATA: u64 = 1;

    /// Ceiling on any memory size a frame may touch; derived from the gas
    /// representation so pricing below it can never overflow
    pub const MAX_MEM_NEEDED: u128 = i64::MAX as u128;
}

/// Cost of growing memory from `old_size` bytes (always word-aligned) to
/// cover `needed` bytes. Growth only: shrinking or staying within the
/// current size is free.
///
/// Charged as `MEMORY * ((new_words - old_words) + (new_words^2 -
/// old_words^2) / 1024)`, computed in 128-bit arithmetic.
pub fn memory_expansion_gas(old_size: usize, needed: u128) -> u128 {
    let new_aligned = needed.div_ceil(32) * 32;
    if new_aligned <= old_size as u128 {
        return 0;
    }
    let new_words = new_aligned / 32;
    let old_words = (old_size as u128) / 32;
    cost::MEMORY as u128
        * ((new_words - old_words) + (new_words * new_words - old_words * old_words) / 1024)
}

/// Cost of copying `size` bytes, per started 32-byte word
pub fn copy_gas(size: u64) -> u64 {
    cost::COPY * size.div_ceil(32)
}

/// SHA3 word surcharge for hashing `size` bytes (base cost excluded)
pub fn sha3_word_gas(size: u64) -> u64 {
    cost::SHA3_WORD * size.div_ceil(32)
}

/// Full LOG cost for `topics` topics over `data_size` bytes
pub fn log_gas(topics: usize, data_size: u64) -> u64 {
    cost::LOG + cost::LOG_TOPIC * topics as u64 + cost::LOG_DATA * data_size
}

/// Full EXP cost for an exponent occupying `bytes` bytes
pub fn exp_gas(bytes: usize) -> u64 {
    cost::EXP + cost::EXP_BYTE * bytes as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_gas_first_words() {
        // one word: 1 * (1 + 1/1024) = 1
        assert_eq!(memory_expansion_gas(0, 32), 1);
        assert_eq!(memory_expansion_gas(0, 1), 1);
        // two words from scratch: 2 + 4/1024 = 2
        assert_eq!(memory_expansion_gas(0, 64), 2);
        // growth only
        assert_eq!(memory_expansion_gas(64, 32), 0);
        assert_eq!(memory_expansion_gas(64, 64), 0);
        // 32 -> 64 bytes costs the difference
        assert_eq!(
            memory_expansion_gas(0, 64) - memory_expansion_gas(0, 32),
            memory_expansion_gas(32, 64)
        );
    }

    #[test]
    fn memory_gas_quadratic_term() {
        // 2048 words: 2048 + 2048^2/1024 = 2048 + 4096 = 6144
        assert_eq!(memory_expansion_gas(0, 2048 * 32), 6144);
        // the quadratic term is incremental across the boundary
        let total = memory_expansion_gas(0, 4096 * 32);
        let first = memory_expansion_gas(0, 2048 * 32);
        let second = memory_expansion_gas(2048 * 32, 4096 * 32);
        assert_eq!(first + second, total);
    }

    #[test]
    fn memory_gas_near_ceiling_does_not_overflow() {
        // pricing at the ceiling must stay within u128
        let gas = memory_expansion_gas(0, cost::MAX_MEM_NEEDED);
        assert!(gas > 0);
    }

    #[test]
    fn copy_gas_rounds_up() {
        assert_eq!(copy_gas(0), 0);
        assert_eq!(copy_gas(1), 1);
        assert_eq!(copy_gas(32), 1);
        assert_eq!(copy_gas(33), 2);
    }

    #[test]
    fn sha3_word_surcharge() {
        assert_eq!(sha3_word_gas(0), 0);
        assert_eq!(sha3_word_gas(32), cost::SHA3_WORD);
        assert_eq!(sha3_word_gas(64), 2 * cost::SHA3_WORD);
    }

    #[test]
    fn log_cost() {
        assert_eq!(log_gas(0, 0), cost::LOG);
        assert_eq!(log_gas(2, 0), cost::LOG + 2 * cost::LOG_TOPIC);
        assert_eq!(log_gas(0, 32), cost::LOG + 32 * cost::LOG_DATA);
    }

    #[test]
    fn exp_cost() {
        assert_eq!(exp_gas(0), cost::EXP);
        assert_eq!(exp_gas(1), cost::EXP + cost::EXP_BYTE);
        assert_eq!(exp_gas(32), cost::EXP + 32 * cost::EXP_BYTE);
    }
}
