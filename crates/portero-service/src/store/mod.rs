//! Credential stores.

mod memory;
mod sled_store;

pub use memory::MemoryCredentialStore;
pub use sled_store::{UserRecord, UserStore};
