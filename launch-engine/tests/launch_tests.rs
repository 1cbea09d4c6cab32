//! Launch prepare/submit integration tests against the mock ledger

mod common;

use base64::{engine::general_purpose::STANDARD, Engine};
use common::{harness, harness_with, launch_request, peer_coordinator, pool_settings};
use launch_engine::codec::{decode_transaction, encode_transaction};
use launch_engine::core::{LaunchError, LedgerError};
use launch_engine::curve::CustomCurveParams;
use launch_engine::launch::{instructions, LaunchPhase, PreparedLaunch, SubmitRequest};
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    message::Message,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    transaction::Transaction,
};
use std::str::FromStr;
use std::time::Duration;

/// Caller-side step: sign the prepared transaction and re-encode it
fn caller_sign(prepared: &PreparedLaunch, caller: &Keypair) -> String {
    let mut transaction = decode_transaction(&prepared.unsigned_tx_base64).unwrap();
    let blockhash = transaction.message.recent_blockhash;
    transaction.try_partial_sign(&[caller], blockhash).unwrap();
    encode_transaction(&transaction).unwrap()
}

fn submit_request(prepared: &PreparedLaunch, signed_tx_base64: String, caller: &Keypair) -> SubmitRequest {
    SubmitRequest {
        signed_tx_base64,
        mint_address: prepared.mint_address.clone(),
        caller_wallet: caller.pubkey().to_string(),
    }
}

#[tokio::test]
async fn test_prepare_sign_submit_commits_identity() {
    let h = harness(2).await;
    let caller = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let mint = Pubkey::from_str(&prepared.mint_address).unwrap();
    assert!(prepared.expires_at_epoch_ms > chrono::Utc::now().timestamp_millis());
    assert_eq!(
        h.coordinator.sessions().phase(&mint),
        Some(LaunchPhase::AwaitingUserSignature)
    );

    // Prepared transaction: caller pays, nobody has signed yet
    let unsigned = decode_transaction(&prepared.unsigned_tx_base64).unwrap();
    assert_eq!(unsigned.message.account_keys[0], caller.pubkey());
    assert!(!unsigned.is_signed());
    assert_eq!(unsigned.message.recent_blockhash, h.ledger.current_blockhash());

    let signed = caller_sign(&prepared, &caller);
    let submitted = h
        .coordinator
        .submit(submit_request(&prepared, signed, &caller))
        .await
        .unwrap();
    assert_eq!(submitted.mint_address, prepared.mint_address);

    let sent = h.ledger.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].verify().is_ok());
    assert_eq!(sent[0].signatures[0].to_string(), submitted.tx_signature);
    assert!(h.ledger.has_account(&mint));

    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.used, 1);
    assert_eq!(stats.available, 1);
    assert!(h.coordinator.sessions().is_empty());
}

#[tokio::test]
async fn test_duplicate_submission_is_treated_as_success() {
    let h = harness(1).await;
    let caller = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let signed = caller_sign(&prepared, &caller);
    let first = h
        .coordinator
        .submit(submit_request(&prepared, signed, &caller))
        .await
        .unwrap();

    // Resubmit the fully signed transaction that landed
    let landed = encode_transaction(&h.ledger.sent_transactions()[0]).unwrap();
    let second = h
        .coordinator
        .submit(submit_request(&prepared, landed, &caller))
        .await
        .unwrap();

    assert_eq!(first.tx_signature, second.tx_signature);
    assert_eq!(h.ledger.sent_transactions().len(), 1);
    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.used, 1);
    assert_eq!(stats.total, 1);
}

#[tokio::test]
async fn test_expired_signing_window_releases_identity() {
    let mut settings = pool_settings();
    settings.signing_window = Duration::from_millis(50);
    let h = harness_with(settings, 1).await;
    let caller = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let signed = caller_sign(&prepared, &caller);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = h
        .coordinator
        .submit(submit_request(&prepared, signed, &caller))
        .await
        .unwrap_err();
    assert!(matches!(err, LaunchError::SigningWindowExpired { .. }));
    assert_eq!(err.code(), "KEYPAIR_EXPIRED");
    assert!(err.is_retryable());

    assert!(h.ledger.sent_transactions().is_empty());
    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.available, 1);
    assert_eq!(stats.used, 0);
}

#[tokio::test]
async fn test_blockhash_expiry_is_typed_and_releases() {
    let h = harness(1).await;
    let caller = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let signed = caller_sign(&prepared, &caller);
    h.ledger.fail_next_send(LedgerError::BlockhashExpired);

    let err = h
        .coordinator
        .submit(submit_request(&prepared, signed, &caller))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "BLOCKHASH_EXPIRED");
    assert!(err.is_retryable());

    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.available, 1);
    assert!(h.coordinator.sessions().is_empty());
}

#[tokio::test]
async fn test_ledger_rejection_releases_identity() {
    let h = harness(1).await;
    let caller = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let signed = caller_sign(&prepared, &caller);
    h.ledger
        .fail_next_send(LedgerError::Simulation("custom program error: 0x1".into()));

    let err = h
        .coordinator
        .submit(submit_request(&prepared, signed, &caller))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "LEDGER_REJECTED");
    assert_eq!(h.pool.supply_stats().await.unwrap().available, 1);
}

#[tokio::test]
async fn test_submit_rejects_foreign_fee_payer() {
    let h = harness(1).await;
    let caller = Keypair::new();
    let intruder = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let signed = caller_sign(&prepared, &caller);

    let err = h
        .coordinator
        .submit(submit_request(&prepared, signed, &intruder))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSACTION");
    assert!(h.ledger.sent_transactions().is_empty());
}

/// A payer-signed transaction that names `mint` and the platform as signers
/// without being the prepared launch
fn forged_launch(payer: &Keypair, mint: &Pubkey, platform: &Pubkey, blockhash: solana_sdk::hash::Hash) -> String {
    let grab = Instruction {
        program_id: Pubkey::new_unique(),
        accounts: vec![AccountMeta::new(*mint, true), AccountMeta::new(payer.pubkey(), true)],
        data: vec![7],
    };
    let ixs = [grab, instructions::platform_marker(platform, mint)];
    let mut transaction = Transaction::new_unsigned(Message::new(&ixs, Some(&payer.pubkey())));
    transaction.try_partial_sign(&[payer], blockhash).unwrap();
    encode_transaction(&transaction).unwrap()
}

#[tokio::test]
async fn test_submit_on_another_process_commits_identity() {
    let h = harness(2).await;
    let peer = peer_coordinator(&h);
    let caller = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let mint = Pubkey::from_str(&prepared.mint_address).unwrap();
    assert!(peer.sessions().get(&mint).is_none());
    assert!(peer.pool().cache().get(&mint).await.is_none());

    let signed = caller_sign(&prepared, &caller);
    let submitted = peer
        .submit(submit_request(&prepared, signed, &caller))
        .await
        .unwrap();
    assert_eq!(submitted.mint_address, prepared.mint_address);

    let sent = h.ledger.sent_transactions();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].verify().is_ok());
    assert_eq!(sent[0].message.account_keys[0], caller.pubkey());

    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.used, 1);
    assert_eq!(stats.reserved, 0);
    assert_eq!(stats.available, 1);
}

#[tokio::test]
async fn test_foreign_payer_on_another_process_keeps_reservation() {
    let h = harness(1).await;
    let peer = peer_coordinator(&h);
    let owner = Keypair::new();
    let attacker = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&owner.pubkey())).await.unwrap();
    let mint = Pubkey::from_str(&prepared.mint_address).unwrap();

    let forged = forged_launch(&attacker, &mint, &h.platform, h.ledger.current_blockhash());
    let err = peer
        .submit(submit_request(&prepared, forged, &attacker))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSACTION");
    assert!(h.ledger.sent_transactions().is_empty());

    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.reserved, 1);
    assert_eq!(stats.used, 0);

    // The owner still completes the launch they prepared
    let signed = caller_sign(&prepared, &owner);
    assert!(peer.submit(submit_request(&prepared, signed, &owner)).await.is_ok());
    assert_eq!(h.pool.supply_stats().await.unwrap().used, 1);
}

#[tokio::test]
async fn test_altered_message_on_another_process_is_not_signed() {
    let h = harness(1).await;
    let peer = peer_coordinator(&h);
    let caller = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let mint = Pubkey::from_str(&prepared.mint_address).unwrap();

    let altered = forged_launch(&caller, &mint, &h.platform, h.ledger.current_blockhash());
    let err = peer
        .submit(submit_request(&prepared, altered, &caller))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSACTION");
    assert!(h.ledger.sent_transactions().is_empty());

    let stats = h.pool.supply_stats().await.unwrap();
    assert_eq!(stats.reserved, 1);
    assert_eq!(stats.used, 0);
}

#[tokio::test]
async fn test_submit_requires_caller_signature() {
    let h = harness(1).await;
    let caller = Keypair::new();

    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();
    let err = h
        .coordinator
        .submit(submit_request(&prepared, prepared.unsigned_tx_base64.clone(), &caller))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSACTION");

    // The reservation survives so the caller can still sign and submit
    let signed = caller_sign(&prepared, &caller);
    assert!(h
        .coordinator
        .submit(submit_request(&prepared, signed, &caller))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_submit_rejects_malformed_payload() {
    let h = harness(1).await;
    let caller = Keypair::new();
    let prepared = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap();

    let garbage = STANDARD.encode([1u8, 2, 3]);
    let err = h
        .coordinator
        .submit(submit_request(&prepared, garbage, &caller))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_TRANSACTION");
}

#[tokio::test]
async fn test_prepare_validates_before_allocating() {
    let h = harness(1).await;
    let caller = Keypair::new();

    let mut request = launch_request(&caller.pubkey());
    request.symbol = "WAYTOOLONGSYMBOL".to_string();
    let err = h.coordinator.prepare(request).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_PARAMETERS");

    let mut request = launch_request(&caller.pubkey());
    request.caller_wallet = "not-a-wallet".to_string();
    assert!(h.coordinator.prepare(request).await.is_err());

    assert_eq!(h.pool.supply_stats().await.unwrap().available, 1);
}

#[tokio::test]
async fn test_prepare_releases_when_blockhash_unavailable() {
    let h = harness(1).await;
    let caller = Keypair::new();
    for _ in 0..2 {
        h.ledger
            .fail_next_blockhash(LedgerError::ConnectionFailed("rpc down".into()));
    }

    let err = h.coordinator.prepare(launch_request(&caller.pubkey())).await.unwrap_err();
    assert_eq!(err.code(), "LEDGER_UNAVAILABLE");
    assert_eq!(h.pool.supply_stats().await.unwrap().available, 1);
}

#[tokio::test]
async fn test_custom_curve_and_initial_buy_build() {
    let h = harness(1).await;
    let caller = Keypair::new();

    let mut request = launch_request(&caller.pubkey());
    request.initial_buy_lamports = Some(500_000_000);
    request.custom_config = Some(CustomCurveParams {
        fee_tier_bps: 100,
        grace_period: true,
        vesting: None,
        graduation_threshold_sol: Some(40.0),
    });

    let prepared = h.coordinator.prepare(request).await.unwrap();
    let transaction = decode_transaction(&prepared.unsigned_tx_base64).unwrap();
    let launch_program = h.programs.launch_program;
    let launch_ixs = transaction
        .message
        .instructions
        .iter()
        .filter(|ix| transaction.message.account_keys[ix.program_id_index as usize] == launch_program)
        .count();
    // create config, initialize, swap
    assert_eq!(launch_ixs, 3);

    let signed = caller_sign(&prepared, &caller);
    assert!(h
        .coordinator
        .submit(submit_request(&prepared, signed, &caller))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_pool_exhaustion_surfaces_from_prepare() {
    let h = harness(1).await;
    let first = Keypair::new();
    let second = Keypair::new();

    h.coordinator.prepare(launch_request(&first.pubkey())).await.unwrap();
    let err = h.coordinator.prepare(launch_request(&second.pubkey())).await.unwrap_err();
    assert_eq!(err.code(), "POOL_EXHAUSTED");
}
