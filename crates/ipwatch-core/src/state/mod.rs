// # Address Store Implementations
//
// This module provides implementations of the AddressStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileAddressStore, RECORD_FILE_NAME};
pub use memory::MemoryAddressStore;
