//! # kiln-primitives
//!
//! Fundamental types shared across the kiln workspace:
//! - [`Address`]: 20-byte account address
//! - [`H256`]: 32-byte hash / storage slot
//! - [`DataWord`]: the 256-bit machine word of the virtual machine

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod hash;
mod word;

pub use address::{Address, AddressError};
pub use hash::{H256, HashError};
pub use word::DataWord;
