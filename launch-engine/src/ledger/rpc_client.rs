//! Lightweight Solana RPC client
//!
//! Implements only the four methods the engine needs over plain JSON-RPC,
//! avoiding the dependency chain of solana-client.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::{
    account::Account, hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::config::LedgerConfig;
use crate::core::{LedgerClient, LedgerError, SignatureStatus};

/// JSON-RPC code for a failed preflight simulation
const SEND_TRANSACTION_PREFLIGHT_FAILURE: i64 = -32002;

/// Lightweight RPC client for Solana
pub struct RpcLedgerClient {
    url: String,
    commitment: String,
    agent: ureq::Agent,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Account data response from RPC
#[derive(Debug, Deserialize)]
struct AccountInfo {
    lamports: u64,
    data: (String, String), // (data, encoding)
    owner: String,
    executable: bool,
    #[serde(rename = "rentEpoch")]
    rent_epoch: u64,
}

#[derive(Debug, Deserialize)]
struct SignatureStatusInfo {
    err: Option<Value>,
    #[serde(rename = "confirmationStatus")]
    confirmation_status: Option<String>,
}

/// Map an RPC error payload onto the ledger error taxonomy
fn classify_rpc_error(code: i64, message: &str) -> LedgerError {
    let lower = message.to_lowercase();
    if lower.contains("blockhash not found") || lower.contains("block height exceeded") {
        LedgerError::BlockhashExpired
    } else if lower.contains("already been processed") || lower.contains("alreadyprocessed") {
        LedgerError::AlreadyProcessed
    } else if code == SEND_TRANSACTION_PREFLIGHT_FAILURE {
        LedgerError::Simulation(message.to_string())
    } else {
        LedgerError::Rpc(format!("{}: {}", code, message))
    }
}

impl RpcLedgerClient {
    pub fn new(url: String, commitment: String, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(timeout)
            .build();

        Self { url, commitment, agent }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        Self::new(
            config.rpc_url.clone(),
            config.commitment.clone(),
            config.request_timeout(),
        )
    }

    /// Make a JSON-RPC call
    async fn call<T>(&self, method: &str, params: Value) -> Result<T, LedgerError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        debug!("RPC call: {}", method);

        // Use blocking call since ureq is sync
        let response_body = tokio::task::spawn_blocking({
            let agent = self.agent.clone();
            let url = self.url.clone();
            let body = request_body.to_string();

            move || {
                let response = agent
                    .post(&url)
                    .set("Content-Type", "application/json")
                    .send_string(&body)?;
                response.into_string().map_err(ureq::Error::from)
            }
        })
        .await
        .map_err(|e| LedgerError::ConnectionFailed(e.to_string()))?
        .map_err(|e| match e {
            ureq::Error::Transport(t) => LedgerError::ConnectionFailed(t.to_string()),
            ureq::Error::Status(code, _) => LedgerError::Rpc(format!("HTTP {}", code)),
        })?;

        let rpc_response: RpcResponse<T> = serde_json::from_str(&response_body)
            .map_err(|e| LedgerError::Rpc(format!("malformed response: {}", e)))?;

        if let Some(error) = rpc_response.error {
            return Err(classify_rpc_error(error.code, &error.message));
        }

        rpc_response
            .result
            .ok_or_else(|| LedgerError::Rpc("no result in RPC response".into()))
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, LedgerError> {
        let params = json!([
            address.to_string(),
            {
                "encoding": "base64",
                "commitment": self.commitment
            }
        ]);

        let response: Value = self.call("getAccountInfo", params).await?;

        if response["value"].is_null() {
            return Ok(None);
        }

        let account_info: AccountInfo = serde_json::from_value(response["value"].clone())
            .map_err(|e| LedgerError::Rpc(format!("malformed account: {}", e)))?;

        if account_info.data.1 != "base64" {
            return Err(LedgerError::Rpc(format!("unsupported data encoding: {}", account_info.data.1)));
        }
        let data = base64::engine::general_purpose::STANDARD
            .decode(&account_info.data.0)
            .map_err(|e| LedgerError::Rpc(format!("failed to decode account data: {}", e)))?;

        let owner = Pubkey::from_str(&account_info.owner)
            .map_err(|e| LedgerError::Rpc(format!("failed to parse owner: {}", e)))?;

        Ok(Some(Account {
            lamports: account_info.lamports,
            data,
            owner,
            executable: account_info.executable,
            rent_epoch: account_info.rent_epoch,
        }))
    }

    async fn get_latest_blockhash(&self) -> Result<Hash, LedgerError> {
        let response: Value = self
            .call("getLatestBlockhash", json!([{ "commitment": self.commitment }]))
            .await?;

        let blockhash = response["value"]["blockhash"]
            .as_str()
            .ok_or_else(|| LedgerError::Rpc("invalid blockhash in response".into()))?;

        Hash::from_str(blockhash).map_err(|e| LedgerError::Rpc(format!("failed to parse blockhash: {}", e)))
    }

    async fn send_transaction(&self, transaction: &Transaction) -> Result<Signature, LedgerError> {
        let tx_data = bincode::serialize(transaction)
            .map_err(|e| LedgerError::Rpc(format!("failed to serialize transaction: {}", e)))?;
        let tx_base64 = base64::engine::general_purpose::STANDARD.encode(tx_data);

        let params = json!([
            tx_base64,
            {
                "encoding": "base64",
                "preflightCommitment": self.commitment
            }
        ]);

        let signature: String = self.call("sendTransaction", params).await?;
        Signature::from_str(&signature)
            .map_err(|e| LedgerError::Rpc(format!("failed to parse signature: {}", e)))
    }

    async fn get_signature_status(
        &self,
        signature: &Signature,
    ) -> Result<Option<SignatureStatus>, LedgerError> {
        let params = json!([[signature.to_string()], { "searchTransactionHistory": true }]);
        let response: Value = self.call("getSignatureStatuses", params).await?;

        let Some(entry) = response["value"].get(0).filter(|v| !v.is_null()) else {
            return Ok(None);
        };
        let info: SignatureStatusInfo = serde_json::from_value(entry.clone())
            .map_err(|e| LedgerError::Rpc(format!("malformed signature status: {}", e)))?;

        if let Some(err) = info.err {
            return Ok(Some(SignatureStatus::Failed(err.to_string())));
        }
        Ok(match info.confirmation_status.as_deref() {
            Some("finalized") => Some(SignatureStatus::Finalized),
            Some("confirmed") => Some(SignatureStatus::Confirmed),
            _ => Some(SignatureStatus::Processed),
        })
    }
}
