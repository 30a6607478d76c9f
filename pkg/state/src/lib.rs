pub mod client;
pub mod memory;
pub mod remote;
pub mod slate;
pub mod store;
pub mod sweeper;

#[cfg(test)]
mod contract;

pub use store::{LeaseStore, StoreError};
