// # Address History Store Implementations
//
// This module provides implementations of the AddressHistoryStore trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileHistoryStore, FileHistoryStoreFactory};
pub use memory::{MemoryHistoryStore, MemoryHistoryStoreFactory};
