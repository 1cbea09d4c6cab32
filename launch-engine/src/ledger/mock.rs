//! Mock ledger for tests and local development
//!
//! Keeps accounts and processed signatures in memory and lets callers script
//! failures for individual calls.

use async_trait::async_trait;
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tracing::debug;

use crate::core::{LedgerClient, LedgerError, SignatureStatus};

fn mint_account() -> Account {
    Account {
        lamports: 1_461_600,
        data: vec![0; 82],
        owner: spl_token::id(),
        executable: false,
        rent_epoch: 0,
    }
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<Pubkey, Account>,
    processed: HashSet<Signature>,
    sent: Vec<Transaction>,
    send_failures: VecDeque<LedgerError>,
    blockhash_failures: VecDeque<LedgerError>,
    failing_reads: HashSet<Pubkey>,
}

pub struct MockLedger {
    state: Mutex<MockState>,
    blockhash: Mutex<Hash>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            blockhash: Mutex::new(Hash::new_unique()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Place an account at `address`
    pub fn set_account(&self, address: Pubkey, account: Account) {
        self.state().accounts.insert(address, account);
    }

    /// Place an initialized mint account at `address`
    pub fn create_account(&self, address: Pubkey) {
        self.set_account(address, mint_account());
    }

    pub fn has_account(&self, address: &Pubkey) -> bool {
        self.state().accounts.contains_key(address)
    }

    /// Make every read of `address` fail with a transport error
    pub fn fail_reads_for(&self, address: Pubkey) {
        self.state().failing_reads.insert(address);
    }

    /// Fail the next `send_transaction` with `error`
    pub fn fail_next_send(&self, error: LedgerError) {
        self.state().send_failures.push_back(error);
    }

    /// Fail the next `get_latest_blockhash` with `error`
    pub fn fail_next_blockhash(&self, error: LedgerError) {
        self.state().blockhash_failures.push_back(error);
    }

    /// Transactions that landed
    pub fn sent_transactions(&self) -> Vec<Transaction> {
        self.state().sent.clone()
    }

    pub fn current_blockhash(&self) -> Hash {
        *self.blockhash.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError> {
        let state = self.state();
        if state.failing_reads.contains(address) {
            return Err(LedgerError::ConnectionFailed(format!("read of {} failed", address)));
        }
        Ok(state.accounts.get(address).cloned())
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
        if let Some(error) = self.state().blockhash_failures.pop_front() {
            return Err(error);
        }
        Ok(self.current_blockhash())
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let mut state = self.state();
        if let Some(error) = state.send_failures.pop_front() {
            return Err(error);
        }

        transaction
            .verify()
            .map_err(|e| LedgerError::Simulation(format!("signature verification failed: {}", e)))?;

        let Some(&signature) = transaction.signatures.first() else {
            return Err(LedgerError::Simulation("transaction carries no signatures".into()));
        };
        if !state.processed.insert(signature) {
            return Err(LedgerError::AlreadyProcessed);
        }

        // Writable signers after the fee payer name new accounts
        let header = &transaction.message.header;
        let writable_signers =
            header.num_required_signatures.saturating_sub(header.num_readonly_signed_accounts) as usize;
        for key in transaction.message.account_keys.iter().take(writable_signers).skip(1) {
            state.accounts.entry(*key).or_insert_with(mint_account);
        }
        state.sent.push(transaction.clone());
        debug!("Mock ledger processed {}", signature);
        Ok(signature)
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        Ok(self
            .state()
            .processed
            .contains(signature)
            .then_some(SignatureStatus::Confirmed))
    }
}
