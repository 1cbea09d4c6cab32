//! Mint identity pool integration tests

mod common;

use common::{harness, pool_settings};
use launch_engine::core::{IdentityStore, LaunchError};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

async fn queue_head(h: &common::Harness) -> Pubkey {
    let queue = h.pool.queue(1, 0).await.unwrap();
    Pubkey::from_str(&queue[0].public_address).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_allocations_are_unique() {
    let h = harness(20).await;

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let pool = h.pool.clone();
            tokio::spawn(async move { pool.allocate(None).await })
        })
        .collect();

    let mut addresses = HashSet::new();
    let mut exhausted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(identity) => assert!(addresses.insert(identity.address), "identity handed out twice"),
            Err(LaunchError::PoolExhausted { .. }) => exhausted += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(addresses.len(), 20);
    assert_eq!(exhausted, 30);

    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.reserved, 20);
    assert_eq!(stats.available, 0);
}

#[tokio::test]
async fn test_identity_on_chain_is_quarantined() {
    let h = harness(2).await;
    let stale = queue_head(&h).await;
    h.ledger.create_account(stale);

    let identity = h.pool.allocate(None).await.unwrap();
    assert_ne!(identity.address, stale);

    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.used, 1);
    assert_eq!(stats.reserved, 1);
    assert!(h.store.find_unused(&stale.to_string()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_released_identity_is_allocated_again() {
    let h = harness(1).await;

    let first = h.pool.allocate(None).await.unwrap();
    assert!(matches!(
        h.pool.allocate(None).await,
        Err(LaunchError::PoolExhausted { .. })
    ));

    assert!(h.pool.release(&first.address).await.unwrap());
    let second = h.pool.allocate(None).await.unwrap();
    assert_eq!(second.address, first.address);
}

#[tokio::test]
async fn test_committed_identity_is_never_reallocated() {
    let h = harness(1).await;
    let wallet = Pubkey::new_unique();

    let identity = h.pool.allocate(Some(&wallet)).await.unwrap();
    assert!(h.pool.commit(&identity.address, &wallet).await.unwrap());
    assert!(!h.pool.commit(&identity.address, &wallet).await.unwrap());
    assert!(!h.pool.release(&identity.address).await.unwrap());

    assert!(matches!(
        h.pool.allocate(None).await,
        Err(LaunchError::PoolExhausted { .. })
    ));
    assert!(h.pool.retrieve_cached(&identity.address).await.unwrap().is_none());
}

#[tokio::test]
async fn test_abandoned_reservation_is_swept() {
    let h = harness(1).await;
    let identity = h.pool.allocate(None).await.unwrap();

    // Within the TTL nothing is released
    assert_eq!(h.pool.reap_expired_reservations().await.unwrap(), 0);

    assert!(
        h.store
            .backdate_reservation(&identity.address.to_string(), Duration::from_secs(61))
            .await
    );
    assert_eq!(h.pool.reap_expired_reservations().await.unwrap(), 1);

    let again = h.pool.allocate(None).await.unwrap();
    assert_eq!(again.address, identity.address);
}

#[tokio::test]
async fn test_failed_freshness_check_leaves_identity_reserved() {
    let h = harness(2).await;
    let unreadable = queue_head(&h).await;
    h.ledger.fail_reads_for(unreadable);

    let identity = h.pool.allocate(None).await.unwrap();
    assert_ne!(identity.address, unreadable);

    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.used, 0);
    assert_eq!(stats.reserved, 2);
    assert!(h.store.find_unused(&unreadable.to_string()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_allocation_gives_up_after_max_attempts() {
    let mut settings = pool_settings();
    settings.max_attempts = 2;
    let h = common::harness_with(settings, 3).await;

    let queue = h.pool.queue(3, 0).await.unwrap();
    for summary in &queue {
        h.ledger.create_account(Pubkey::from_str(&summary.public_address).unwrap());
    }

    let err = h.pool.allocate(None).await.unwrap_err();
    assert_eq!(err.code(), "POOL_EXHAUSTED");
    // Two attempts quarantined two identities; the third was never reserved
    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.used, 2);
    assert_eq!(stats.available, 1);
}

#[tokio::test]
async fn test_assigned_identity_goes_to_its_wallet() {
    let h = harness(3).await;
    let wallet = Pubkey::new_unique();
    let queue = h.pool.queue(3, 0).await.unwrap();
    let vip = Pubkey::from_str(&queue[2].public_address).unwrap();

    h.pool.assign_identity(&vip, &wallet, Some("partner launch")).await.unwrap();
    let assigned = h.pool.assigned_identities(&wallet).await.unwrap();
    assert_eq!(assigned.len(), 1);
    assert_eq!(assigned[0].assignment_note.as_deref(), Some("partner launch"));

    let other = h.pool.allocate(Some(&Pubkey::new_unique())).await.unwrap();
    assert_ne!(other.address, vip);
    let mine = h.pool.allocate(Some(&wallet)).await.unwrap();
    assert_eq!(mine.address, vip);
}

#[tokio::test]
async fn test_admin_operations_reject_bad_input() {
    let h = harness(1).await;

    let err = h.pool.generate_identities(0).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_PARAMETERS");
    let err = h.pool.generate_identities(100_000).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_PARAMETERS");

    let err = h.pool.unassign_identity(&Pubkey::new_unique()).await.unwrap_err();
    assert_eq!(err.code(), "IDENTITY_NOT_FOUND");
    assert!(h.pool.queue(0, 0).await.is_err());
}

#[tokio::test]
async fn test_generated_identities_join_the_queue_in_order() {
    let h = harness(0).await;
    let report = h.pool.generate_identities(5).await.unwrap();
    assert_eq!(report.inserted, 5);

    let queue = h.pool.queue(10, 0).await.unwrap();
    let queued: Vec<&str> = queue.iter().map(|s| s.public_address.as_str()).collect();
    let generated: Vec<&str> = report.addresses.iter().map(String::as_str).collect();
    assert_eq!(queued, generated);

    let first = h.pool.allocate(None).await.unwrap();
    assert_eq!(first.address.to_string(), report.addresses[0]);
    assert_eq!(first.queue_position, queue[0].queue_position);
}

#[tokio::test]
async fn test_reservation_outlives_signing_window() {
    let h = harness(1).await;
    let identity = h.pool.allocate(None).await.unwrap();
    let cached = h.pool.retrieve_cached(&identity.address).await.unwrap().unwrap();

    let signing = h.pool.signing_deadline(&cached);
    let reservation = h.pool.reservation_deadline(&cached);
    assert_eq!(signing, identity.expires);
    assert!(reservation > signing);
    assert_eq!(
        reservation.expires_at() - identity.reserved_at,
        chrono::Duration::from_std(pool_settings().reservation_ttl).unwrap()
    );
}

#[tokio::test]
async fn test_bind_requires_live_reservation() {
    let h = harness(1).await;
    let identity = h.pool.allocate(None).await.unwrap();
    let wallet = Pubkey::new_unique();
    let message = solana_sdk::message::Message::new(&[], Some(&wallet));
    let binding = launch_engine::pool::LaunchBinding::new(wallet, &message);

    h.pool.bind_launch(&identity.address, binding).await.unwrap();
    let cached = h.pool.retrieve_cached(&identity.address).await.unwrap().unwrap();
    assert_eq!(cached.launch, Some(binding));

    h.pool.release(&identity.address).await.unwrap();
    let err = h.pool.bind_launch(&identity.address, binding).await.unwrap_err();
    assert_eq!(err.code(), "IDENTITY_NOT_FOUND");
}
