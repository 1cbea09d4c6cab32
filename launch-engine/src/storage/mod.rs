//! Identity store adapters

pub mod memory;
pub mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PostgresIdentityStore;
