//! Shared types for the faucet workspace.

pub mod error;
pub mod types;
pub mod utils;

pub use error::{AddressError, HashError};
pub use types::{Address, Hash, ADDRESS_LENGTH, HASH_LENGTH};
