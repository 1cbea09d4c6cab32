//! Shared setup for integration tests: in-memory store, mock ledger and a
//! fully wired coordinator.

#![allow(dead_code)]

use launch_engine::claims::ClaimTransactionBuilder;
use launch_engine::config::CurveConfigSettings;
use launch_engine::curve::CurveConfigCalculator;
use launch_engine::launch::{CoordinatorSettings, LaunchPrograms, LaunchRequest, LaunchTransactionCoordinator};
use launch_engine::ledger::{MockLedger, RetryPolicy};
use launch_engine::pool::{KeypairPool, PoolSettings};
use launch_engine::storage::MemoryIdentityStore;
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub store: Arc<MemoryIdentityStore>,
    pub ledger: Arc<MockLedger>,
    pub pool: Arc<KeypairPool>,
    pub coordinator: Arc<LaunchTransactionCoordinator>,
    pub claims: Arc<ClaimTransactionBuilder>,
    pub programs: LaunchPrograms,
    pub platform: Pubkey,
    pub platform_keypair: Arc<Keypair>,
}

pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(2, Duration::from_millis(5))
}

pub fn pool_settings() -> PoolSettings {
    PoolSettings {
        read_retry: fast_retry(),
        ..PoolSettings::default()
    }
}

pub fn test_programs() -> LaunchPrograms {
    LaunchPrograms {
        launch_program: Pubkey::new_unique(),
        pool_program: Some(Pubkey::new_unique()),
        default_curve_config: Some(Pubkey::new_unique()),
        quote_mint: spl_token::native_mint::id(),
    }
}

pub async fn harness(identities: usize) -> Harness {
    harness_with(pool_settings(), identities).await
}

pub async fn harness_with(settings: PoolSettings, identities: usize) -> Harness {
    let store = Arc::new(MemoryIdentityStore::new());
    let ledger = Arc::new(MockLedger::new());
    let pool = Arc::new(KeypairPool::new(store.clone(), ledger.clone(), settings));
    if identities > 0 {
        pool.generate_identities(identities)
            .await
            .expect("identities should generate");
    }

    let programs = test_programs();
    let platform = Arc::new(Keypair::new());
    let coordinator = coordinator_for(pool.clone(), ledger.clone(), platform.clone(), programs);
    let claims = Arc::new(ClaimTransactionBuilder::new(ledger.clone(), programs, fast_retry()));

    Harness {
        store,
        ledger,
        pool,
        coordinator,
        claims,
        programs,
        platform: platform.pubkey(),
        platform_keypair: platform,
    }
}

fn coordinator_for(
    pool: Arc<KeypairPool>,
    ledger: Arc<MockLedger>,
    platform: Arc<Keypair>,
    programs: LaunchPrograms,
) -> Arc<LaunchTransactionCoordinator> {
    let calculator = CurveConfigCalculator::new(
        CurveConfigSettings::default(),
        Some(Pubkey::new_unique()),
        Some(Pubkey::new_unique()),
    );
    Arc::new(LaunchTransactionCoordinator::new(
        pool,
        calculator,
        ledger,
        platform,
        programs,
        CoordinatorSettings {
            compute_unit_limit: 400_000,
            confirm_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
            read_retry: fast_retry(),
        },
    ))
}

/// A second engine process: its own pool cache and sessions over the same
/// store, ledger and platform authority
pub fn peer_coordinator(h: &Harness) -> Arc<LaunchTransactionCoordinator> {
    let pool = Arc::new(KeypairPool::new(h.store.clone(), h.ledger.clone(), pool_settings()));
    coordinator_for(pool, h.ledger.clone(), h.platform_keypair.clone(), h.programs)
}

pub fn launch_request(caller: &Pubkey) -> LaunchRequest {
    LaunchRequest {
        name: "Test Token".to_string(),
        symbol: "TEST".to_string(),
        description: "A token launched from the integration tests".to_string(),
        image_uri: "https://example.com/token.png".to_string(),
        caller_wallet: caller.to_string(),
        initial_buy_lamports: None,
        custom_config: None,
    }
}
