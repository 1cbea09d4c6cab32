//! Centralized error types for the launch engine

use thiserror::Error;

use crate::claims::ClaimSourceFailure;

/// Main engine error type
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("Mint identity pool exhausted after {attempts} attempts")]
    PoolExhausted { attempts: u32 },

    #[error("Signing window expired for mint {mint}")]
    SigningWindowExpired { mint: String },

    #[error("Blockhash expired before the transaction landed")]
    BlockhashExpired,

    #[error("Ledger rejected transaction: {0}")]
    LedgerRejection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Mint identity not found: {0}")]
    IdentityNotFound(String),

    #[error("No claim transaction could be built ({} source failures)", failures.len())]
    NoClaimableSources { failures: Vec<ClaimSourceFailure> },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LaunchError {
    /// Stable machine-readable code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            LaunchError::PoolExhausted { .. } => "POOL_EXHAUSTED",
            LaunchError::SigningWindowExpired { .. } => "KEYPAIR_EXPIRED",
            LaunchError::BlockhashExpired => "BLOCKHASH_EXPIRED",
            LaunchError::LedgerRejection(_) => "LEDGER_REJECTED",
            LaunchError::Configuration(_) => "CONFIGURATION_ERROR",
            LaunchError::InvalidParameters(_) => "INVALID_PARAMETERS",
            LaunchError::InvalidTransaction(_) => "INVALID_TRANSACTION",
            LaunchError::IdentityNotFound(_) => "IDENTITY_NOT_FOUND",
            LaunchError::NoClaimableSources { .. } => "NO_CLAIMABLE_SOURCES",
            LaunchError::Storage(_) => "STORAGE_ERROR",
            LaunchError::Ledger(_) => "LEDGER_UNAVAILABLE",
            LaunchError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether the caller may retry the same request later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LaunchError::PoolExhausted { .. }
                | LaunchError::SigningWindowExpired { .. }
                | LaunchError::BlockhashExpired
                | LaunchError::LedgerRejection(_)
                | LaunchError::Storage(_)
                | LaunchError::Ledger(_)
        )
    }
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Corrupt identity record {address}: {reason}")]
    CorruptRecord { address: String, reason: String },
}

/// Ledger (RPC) errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Blockhash not found or expired")]
    BlockhashExpired,

    #[error("Transaction already processed")]
    AlreadyProcessed,

    #[error("Transaction simulation failed: {0}")]
    Simulation(String),

    #[error("Transaction failed on chain: {0}")]
    TransactionFailed(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),
}

impl LedgerError {
    /// Transport-level failures worth retrying in place
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LedgerError::ConnectionFailed(_) | LedgerError::Rpc(_) | LedgerError::Timeout(_)
        )
    }
}

/// Result type alias for engine operations
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Helper to convert sqlx errors
impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<sqlx::Error> for LaunchError {
    fn from(err: sqlx::Error) -> Self {
        LaunchError::Storage(StorageError::from(err))
    }
}

/// Helper to convert serialization errors
impl From<bincode::Error> for LaunchError {
    fn from(err: bincode::Error) -> Self {
        LaunchError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for LaunchError {
    fn from(err: serde_json::Error) -> Self {
        LaunchError::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for LaunchError {
    fn from(err: base64::DecodeError) -> Self {
        LaunchError::InvalidTransaction(format!("invalid base64: {}", err))
    }
}

impl From<validator::ValidationErrors> for LaunchError {
    fn from(err: validator::ValidationErrors) -> Self {
        LaunchError::InvalidParameters(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_match_wire_contract() {
        let expired = LaunchError::SigningWindowExpired { mint: "m".to_string() };
        assert_eq!(expired.code(), "KEYPAIR_EXPIRED");
        assert!(expired.is_retryable());

        assert_eq!(LaunchError::BlockhashExpired.code(), "BLOCKHASH_EXPIRED");
        assert!(!LaunchError::Configuration("missing".into()).is_retryable());
    }

    #[test]
    fn test_transient_ledger_errors() {
        assert!(LedgerError::Timeout("confirmation".into()).is_transient());
        assert!(!LedgerError::BlockhashExpired.is_transient());
        assert!(!LedgerError::AlreadyProcessed.is_transient());
    }
}
