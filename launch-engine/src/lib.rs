//! Token launch and reward claim orchestration engine
//!
//! Hands out pre-generated mint keypairs from a pool, co-signs caller-signed
//! launch transactions, derives bonding-curve configurations and batches
//! creator reward claims.

pub mod api;
pub mod claims;
pub mod codec;
pub mod config;
pub mod core;
pub mod curve;
pub mod launch;
pub mod ledger;
pub mod pool;
pub mod storage;

pub use crate::core::{LaunchError, LaunchResult};
