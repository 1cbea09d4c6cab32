//! Core abstractions shared across the engine

pub mod deadline;
pub mod error;
pub mod traits;
pub mod types;

pub use deadline::Deadline;
pub use error::{LaunchError, LaunchResult, LedgerError, StorageError};
pub use traits::{IdentityStore, LedgerClient, SignatureStatus};
pub use types::*;
