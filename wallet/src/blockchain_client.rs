//! Solana JSON-RPC client
//!
//! This module provides HTTP-based JSON-RPC 2.0 communication with Solana cluster
//! nodes, implementing the methods needed for wallet functionality.
use crate::blockchain::{Hash, Pubkey, Signature};
use crate::errors::{WalletError, WalletResult};
use crate::transaction::{Message, Transaction};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Confirmation level of a block or transaction
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl std::fmt::Display for Commitment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Commitment {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(WalletError::ValidationError(format!(
                "Unknown commitment '{}': expected processed, confirmed or finalized",
                other
            ))),
        }
    }
}

/// Options for `sendTransaction`
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: Commitment,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            skip_preflight: false,
            preflight_commitment: Commitment::Confirmed,
        }
    }
}

/// How long and how often to poll for confirmation
#[derive(Debug, Clone, Copy)]
pub struct ConfirmOptions {
    pub commitment: Commitment,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmOptions {
    fn default() -> Self {
        Self {
            commitment: Commitment::Confirmed,
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestBlockhash {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    pub confirmations: Option<u64>,
    pub err: Option<Value>,
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Whether the status has reached at least `commitment`.
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        match self.confirmation_status {
            Some(status) => status >= commitment,
            // Older nodes omit the status; null confirmations means rooted.
            None => match commitment {
                Commitment::Finalized => self.confirmations.is_none(),
                _ => true,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    pub err: Option<Value>,
    pub memo: Option<String>,
    pub block_time: Option<i64>,
    pub confirmation_status: Option<Commitment>,
}

/// JSON-RPC request structure
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// JSON-RPC response structure
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Results wrapped with the slot they were evaluated at
#[derive(Debug, Deserialize)]
struct RpcContextual<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcBlockhash {
    blockhash: String,
    last_valid_block_height: u64,
}

/// HTTP client for one RPC endpoint
pub struct BlockchainClient {
    client: Client,
    url: String,
    next_id: AtomicU64,
}

impl BlockchainClient {
    /// Create a new blockchain client
    pub fn new(url: impl Into<String>, timeout: Duration) -> WalletResult<Self> {
        let url = url.into().trim().to_string();
        if url.is_empty() {
            return Err(WalletError::ValidationError(
                "RPC endpoint cannot be empty".to_string(),
            ));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(BlockchainClient {
            client,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get account balance in lamports
    pub async fn get_balance(&self, pubkey: &Pubkey, commitment: Commitment) -> WalletResult<u64> {
        let params = json!([pubkey.to_string(), { "commitment": commitment }]);
        let response: RpcContextual<u64> = self.rpc_call("getBalance", params).await?;
        Ok(response.value)
    }

    pub async fn get_latest_blockhash(
        &self,
        commitment: Commitment,
    ) -> WalletResult<LatestBlockhash> {
        let params = json!([{ "commitment": commitment }]);
        let response: RpcContextual<RpcBlockhash> =
            self.rpc_call("getLatestBlockhash", params).await?;
        Ok(LatestBlockhash {
            blockhash: response.value.blockhash.parse()?,
            last_valid_block_height: response.value.last_valid_block_height,
        })
    }

    /// Fee in lamports the cluster would charge for `message`.
    ///
    /// `None` means the node no longer knows the message's blockhash.
    pub async fn get_fee_for_message(
        &self,
        message: &Message,
        commitment: Commitment,
    ) -> WalletResult<Option<u64>> {
        let params = json!([message.to_base64()?, { "commitment": commitment }]);
        let response: RpcContextual<Option<u64>> =
            self.rpc_call("getFeeForMessage", params).await?;
        Ok(response.value)
    }

    pub async fn get_block_height(&self, commitment: Commitment) -> WalletResult<u64> {
        let params = json!([{ "commitment": commitment }]);
        self.rpc_call("getBlockHeight", params).await
    }

    /// Submit a signed transaction
    pub async fn send_transaction(
        &self,
        transaction: &Transaction,
        options: &SendOptions,
    ) -> WalletResult<Signature> {
        if !transaction.is_signed() {
            return Err(WalletError::SignatureError(
                "Transaction is not fully signed".to_string(),
            ));
        }

        let params = json!([
            transaction.to_base64()?,
            {
                "encoding": "base64",
                "skipPreflight": options.skip_preflight,
                "preflightCommitment": options.preflight_commitment,
            }
        ]);
        let signature: String = self.rpc_call("sendTransaction", params).await?;
        let signature: Signature = signature
            .parse()
            .map_err(|_| WalletError::InvalidResponse("Malformed signature".to_string()))?;

        if transaction.signature() != Some(&signature) {
            log::warn!(
                "Node returned signature {} that differs from the submitted transaction",
                signature
            );
        }
        Ok(signature)
    }

    pub async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> WalletResult<Vec<Option<SignatureStatus>>> {
        let encoded: Vec<String> = signatures.iter().map(|s| s.to_string()).collect();
        let params = json!([encoded, { "searchTransactionHistory": false }]);
        let response: RpcContextual<Vec<Option<SignatureStatus>>> =
            self.rpc_call("getSignatureStatuses", params).await?;
        Ok(response.value)
    }

    /// Recent signatures touching `pubkey`, newest first
    pub async fn get_signatures_for_address(
        &self,
        pubkey: &Pubkey,
        limit: Option<usize>,
        before: Option<&Signature>,
    ) -> WalletResult<Vec<SignatureInfo>> {
        let mut config = serde_json::Map::new();
        if let Some(limit) = limit {
            config.insert("limit".to_string(), json!(limit));
        }
        if let Some(before) = before {
            config.insert("before".to_string(), json!(before.to_string()));
        }
        let params = json!([pubkey.to_string(), config]);
        self.rpc_call("getSignaturesForAddress", params).await
    }

    pub async fn request_airdrop(
        &self,
        pubkey: &Pubkey,
        lamports: u64,
        commitment: Commitment,
    ) -> WalletResult<Signature> {
        let params = json!([pubkey.to_string(), lamports, { "commitment": commitment }]);
        let signature: String = self.rpc_call("requestAirdrop", params).await?;
        signature
            .parse()
            .map_err(|_| WalletError::InvalidResponse("Malformed signature".to_string()))
    }

    /// Returns Ok when the node reports itself healthy
    pub async fn get_health(&self) -> WalletResult<()> {
        let status: String = self.rpc_call("getHealth", Value::Null).await?;
        if status == "ok" {
            Ok(())
        } else {
            Err(WalletError::InvalidResponse(format!(
                "Node reported '{}'",
                status
            )))
        }
    }

    /// Submit, then poll until the transaction reaches the requested commitment.
    pub async fn send_and_confirm(
        &self,
        transaction: &Transaction,
        last_valid_block_height: u64,
        send: &SendOptions,
        confirm: &ConfirmOptions,
    ) -> WalletResult<Signature> {
        let signature = self.send_transaction(transaction, send).await?;
        log::info!("Submitted transaction {} to {}", signature, self.url);
        self.confirm_signature(&signature, last_valid_block_height, confirm)
            .await?;
        Ok(signature)
    }

    pub async fn confirm_signature(
        &self,
        signature: &Signature,
        last_valid_block_height: u64,
        confirm: &ConfirmOptions,
    ) -> WalletResult<()> {
        let started = Instant::now();
        loop {
            let status = self
                .get_signature_statuses(std::slice::from_ref(signature))
                .await?
                .into_iter()
                .next()
                .flatten();

            match status {
                Some(status) => {
                    if let Some(err) = status.err {
                        return Err(WalletError::TransactionFailed(err.to_string()));
                    }
                    if status.satisfies(confirm.commitment) {
                        log::info!(
                            "Transaction {} reached {} at slot {}",
                            signature,
                            confirm.commitment,
                            status.slot
                        );
                        return Ok(());
                    }
                }
                None => {
                    let height = self.get_block_height(confirm.commitment).await?;
                    if height > last_valid_block_height {
                        return Err(WalletError::BlockhashExpired);
                    }
                }
            }

            if started.elapsed() >= confirm.timeout {
                return Err(WalletError::ConnectionTimeout);
            }
            tokio::time::sleep(confirm.poll_interval).await;
        }
    }

    /// Make a JSON-RPC call to the node
    async fn rpc_call<T: DeserializeOwned>(&self, method: &str, params: Value) -> WalletResult<T> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        log::debug!("RPC {} (id {}) -> {}", method, request.id, self.url);
        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            // Nodes still return a JSON-RPC error body on some 4xx/5xx responses.
            if let Ok(parsed) = serde_json::from_str::<JsonRpcResponse>(&body) {
                if parsed.error.is_some() {
                    return decode_response(parsed);
                }
            }
            return Err(WalletError::NetworkError(format!("HTTP error: {}", status)));
        }

        let parsed: JsonRpcResponse = serde_json::from_str(&body)
            .map_err(|e| WalletError::InvalidResponse(format!("Failed to parse response: {}", e)))?;
        decode_response(parsed)
    }
}

fn decode_response<T: DeserializeOwned>(response: JsonRpcResponse) -> WalletResult<T> {
    if let Some(error) = response.error {
        if let Some(logs) = error
            .data
            .as_ref()
            .and_then(|d| d.get("logs"))
            .and_then(|l| l.as_array())
        {
            for line in logs {
                log::debug!("program log: {}", line);
            }
        }
        return Err(WalletError::RpcError {
            code: error.code,
            message: error.message,
        });
    }

    let result = response
        .result
        .ok_or_else(|| WalletError::InvalidResponse("No result in RPC response".to_string()))?;
    serde_json::from_value(result)
        .map_err(|e| WalletError::InvalidResponse(format!("Unexpected result shape: {}", e)))
}

pub type RpcFuture<T> = Pin<Box<dyn Future<Output = WalletResult<T>>>>;

/// Ordered list of endpoints tried one after another.
///
/// Only transport failures move on to the next endpoint; an answer from a node
/// (including an RPC error) is final.
#[derive(Debug, Clone)]
pub struct RpcEndpoints {
    endpoints: Vec<String>,
    timeout: Duration,
}

impl RpcEndpoints {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> WalletResult<Self> {
        let endpoints: Vec<String> = endpoints
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect();
        if endpoints.is_empty() {
            return Err(WalletError::ValidationError(
                "No RPC endpoints configured".to_string(),
            ));
        }
        Ok(Self { endpoints, timeout })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn primary(&self) -> &str {
        &self.endpoints[0]
    }

    /// Run `op` against each endpoint in order. Returns the result together with
    /// the endpoint that produced it.
    pub async fn run<T, F>(&self, mut op: F) -> WalletResult<(T, String)>
    where
        F: FnMut(BlockchainClient) -> RpcFuture<T>,
    {
        let mut last_error: Option<WalletError> = None;
        for endpoint in &self.endpoints {
            let client = match BlockchainClient::new(endpoint.clone(), self.timeout) {
                Ok(client) => client,
                Err(err) => {
                    last_error = Some(err);
                    continue;
                }
            };

            match op(client).await {
                Ok(value) => return Ok((value, endpoint.clone())),
                Err(err) if err.is_transport() => {
                    log::warn!("Endpoint {} failed: {}", endpoint, err);
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            WalletError::NetworkError("All RPC endpoints failed".to_string())
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> JsonRpcResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn rpc_error_is_surfaced_with_code() {
        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32002,"message":"Transaction simulation failed","data":{"logs":["log a"]}}}"#;
        let result: WalletResult<u64> = decode_response(parse(body));
        assert_eq!(
            result.unwrap_err(),
            WalletError::RpcError {
                code: -32002,
                message: "Transaction simulation failed".to_string()
            }
        );
    }

    #[test]
    fn contextual_results_decode() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":5},"value":1500000000}}"#;
        let result: RpcContextual<u64> = decode_response(parse(body)).unwrap();
        assert_eq!(result.value, 1_500_000_000);

        let body = r#"{"jsonrpc":"2.0","id":2,"result":{"context":{"slot":5},"value":null}}"#;
        let result: RpcContextual<Option<u64>> = decode_response(parse(body)).unwrap();
        assert_eq!(result.value, None);
    }

    #[test]
    fn missing_or_mistyped_result_is_invalid_response() {
        let result: WalletResult<u64> = decode_response(parse(r#"{"jsonrpc":"2.0","id":1}"#));
        assert!(matches!(result, Err(WalletError::InvalidResponse(_))));

        let result: WalletResult<u64> =
            decode_response(parse(r#"{"jsonrpc":"2.0","id":1,"result":"abc"}"#));
        assert!(matches!(result, Err(WalletError::InvalidResponse(_))));
    }

    #[test]
    fn commitment_ordering_and_parsing() {
        assert!(Commitment::Finalized > Commitment::Confirmed);
        assert!(Commitment::Confirmed > Commitment::Processed);
        assert_eq!("Finalized".parse::<Commitment>().unwrap(), Commitment::Finalized);
        assert!("max".parse::<Commitment>().is_err());
        assert_eq!(
            serde_json::to_string(&Commitment::Confirmed).unwrap(),
            "\"confirmed\""
        );
    }

    #[test]
    fn signature_status_satisfies_commitment() {
        let status: SignatureStatus = serde_json::from_value(json!({
            "slot": 10,
            "confirmations": 3,
            "err": null,
            "confirmationStatus": "confirmed"
        }))
        .unwrap();
        assert!(status.satisfies(Commitment::Processed));
        assert!(status.satisfies(Commitment::Confirmed));
        assert!(!status.satisfies(Commitment::Finalized));

        let legacy: SignatureStatus = serde_json::from_value(json!({
            "slot": 10,
            "confirmations": null,
            "err": null
        }))
        .unwrap();
        assert!(legacy.satisfies(Commitment::Finalized));
    }

    #[test]
    fn endpoint_list_rejects_blank_entries() {
        assert!(RpcEndpoints::new(vec![" ".to_string()], DEFAULT_REQUEST_TIMEOUT).is_err());
        let endpoints = RpcEndpoints::new(
            vec![" http://a ".to_string(), String::new(), "http://b".to_string()],
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        assert_eq!(endpoints.endpoints(), &["http://a", "http://b"]);
        assert_eq!(endpoints.primary(), "http://a");
    }

    #[tokio::test]
    async fn unreachable_endpoints_fall_through_to_last_error() {
        let endpoints = RpcEndpoints::new(
            vec!["http://127.0.0.1:1".to_string()],
            Duration::from_secs(2),
        )
        .unwrap();
        let result = endpoints
            .run(|client| Box::pin(async move { client.get_health().await }))
            .await;
        assert!(result.unwrap_err().is_transport());
    }

    #[tokio::test]
    #[ignore = "requires a local validator at 127.0.0.1:8899"]
    async fn local_validator_is_healthy() {
        let client = BlockchainClient::new("http://127.0.0.1:8899", DEFAULT_REQUEST_TIMEOUT).unwrap();
        assert!(client.get_health().await.is_ok());
    }
}
