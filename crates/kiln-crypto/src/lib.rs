//! # kiln-crypto
//!
//! Keccak-256 hashing, used by the SHA3 opcode and contract address
//! derivation.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;

pub use hash::keccak256;
