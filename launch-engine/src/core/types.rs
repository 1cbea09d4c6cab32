//! Domain types shared by the pool, the stores and the API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// `used_by` marker for identities found already initialized on the ledger
pub const STALE_ON_CHAIN: &str = "STALE_ON_CHAIN";

/// `used_by` marker for identities whose stored secret cannot be decoded
pub const CORRUPT_SECRET: &str = "CORRUPT_SECRET";

/// A pre-generated mint keypair as persisted by an identity store
#[derive(Clone, sqlx::FromRow)]
pub struct MintIdentity {
    pub id: Uuid,
    pub public_address: String,
    /// Base58 encoded 64-byte keypair
    pub secret_material: String,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by: Option<String>,
    pub queue_position: i64,
    pub assigned_wallet: Option<String>,
    pub assignment_note: Option<String>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub reserved_by: Option<String>,
    /// Wallet the prepared launch was built for
    pub reserved_for: Option<String>,
    /// Hash of the prepared launch message, base58
    pub launch_message_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for MintIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MintIdentity")
            .field("id", &self.id)
            .field("public_address", &self.public_address)
            .field("secret_material", &"<redacted>")
            .field("used", &self.used)
            .field("used_by", &self.used_by)
            .field("queue_position", &self.queue_position)
            .field("assigned_wallet", &self.assigned_wallet)
            .field("reserved_at", &self.reserved_at)
            .field("reserved_for", &self.reserved_for)
            .finish()
    }
}

impl MintIdentity {
    /// Whether the identity can currently be handed out
    pub fn is_available(&self) -> bool {
        !self.used && self.reserved_at.is_none()
    }

    pub(crate) fn clear_reservation(&mut self) {
        self.reserved_at = None;
        self.reserved_by = None;
        self.reserved_for = None;
        self.launch_message_hash = None;
    }

    pub fn summary(&self) -> IdentitySummary {
        IdentitySummary {
            public_address: self.public_address.clone(),
            queue_position: self.queue_position,
            used: self.used,
            used_at: self.used_at,
            used_by: self.used_by.clone(),
            assigned_wallet: self.assigned_wallet.clone(),
            assignment_note: self.assignment_note.clone(),
            reserved_at: self.reserved_at,
        }
    }
}

/// A freshly generated identity about to be inserted
#[derive(Clone)]
pub struct NewIdentity {
    pub id: Uuid,
    pub public_address: String,
    pub secret_material: String,
}

impl fmt::Debug for NewIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewIdentity")
            .field("id", &self.id)
            .field("public_address", &self.public_address)
            .finish_non_exhaustive()
    }
}

/// Identity view without secret material, for administrative listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentitySummary {
    pub public_address: String,
    pub queue_position: i64,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub used_by: Option<String>,
    pub assigned_wallet: Option<String>,
    pub assignment_note: Option<String>,
    pub reserved_at: Option<DateTime<Utc>>,
}

/// Pool supply counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SupplyStats {
    pub total: i64,
    /// Unused and not currently reserved
    pub available: i64,
    pub used: i64,
    pub reserved: i64,
    /// Unused and pre-assigned to a wallet
    pub assigned: i64,
}

/// Serde helper for `Pubkey` fields rendered as base58 strings
pub mod pubkey_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S>(pubkey: &Pubkey, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&pubkey.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Pubkey, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde helper for optional `Pubkey` fields
pub mod option_pubkey_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S>(pubkey: &Option<Pubkey>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match pubkey {
            Some(key) => serializer.serialize_some(&key.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Pubkey>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        match s {
            Some(s) if !s.trim().is_empty() => Pubkey::from_str(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}
