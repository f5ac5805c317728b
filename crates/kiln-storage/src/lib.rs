//! # kiln-storage
//!
//! The account/storage view the virtual machine executes against:
//!
//! - [`Repository`]: the trait contract (balances, nonces, code, storage
//!   slots, block hashes)
//! - [`InMemoryRepository`]: a `HashMap`-backed implementation
//! - [`RepositoryTrack`]: a write-buffering overlay with `commit`/`rollback`,
//!   giving each call frame transactional isolation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod account;
mod repository;

pub use account::Account;
pub use repository::{InMemoryRepository, Repository, RepositoryTrack};
