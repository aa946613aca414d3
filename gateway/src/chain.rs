use async_trait::async_trait;
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use sower_lib::signature;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Chain-side view of one erasure-coded segment: the segment hash and its row
/// of fragment hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentDataInfo {
    pub segment_hash: String,
    pub fragment_hashes: Vec<String>,
}

/// Payload of a storage-order registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageOrder {
    pub fid: String,
    pub file_name: String,
    pub territory: String,
    pub segments: Vec<SegmentDataInfo>,
    pub owner: String,
    pub file_size: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// No deal map exists for the file on chain. Peer gateways string-match
    /// the word "empty" in this message, so it is part of the wire contract.
    #[error("deal map is empty")]
    EmptyDealMap,

    #[error("rpc error: {0}")]
    Rpc(String),

    /// None of the configured endpoints answered the liveness probe.
    #[error("no usable rpc endpoint")]
    NoEndpoint,
}

impl ChainError {
    pub fn is_empty_deal_map(&self) -> bool {
        matches!(self, ChainError::EmptyDealMap)
    }
}

/// The two chain operations the provide workflow needs, plus a cheap
/// liveness probe used by the self-healing client slot.
#[async_trait]
pub trait StorageChain: Send + Sync {
    async fn query_block_number(&self) -> Result<u64, ChainError>;

    /// Register a storage order; returns the transaction hash.
    async fn create_storage_order(&self, order: StorageOrder) -> Result<String, ChainError>;

    /// Settled group ids for `fid`, **1-based** on chain.
    async fn query_deal_map(&self, fid: &str) -> Result<HashSet<i32>, ChainError>;
}

#[derive(Serialize)]
struct RpcRequest<'a, P: Serialize> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

/// JSON-RPC client over HTTP against one of the configured chain endpoints.
pub struct RpcStorageChain {
    client: reqwest::Client,
    url: String,
    secret: SecretKey,
    signer: String,
}

impl RpcStorageChain {
    /// Probe the candidate endpoints in order and settle on the first one
    /// that answers a block-number query.
    pub async fn connect(rpcs: &[String], secret: SecretKey) -> Result<Self, ChainError> {
        let signer =
            signature::public_key_to_address(&signature::public_key(&secret)).to_checksum(None);
        let client = reqwest::Client::new();
        for url in rpcs {
            let candidate = Self {
                client: client.clone(),
                url: url.clone(),
                secret,
                signer: signer.clone(),
            };
            match candidate.query_block_number().await {
                Ok(number) => {
                    debug!("chain rpc {url} usable at block {number}");
                    return Ok(candidate);
                }
                Err(err) => warn!("chain rpc {url} unusable: {err}"),
            }
        }
        Err(ChainError::NoEndpoint)
    }

    async fn call<P, T>(&self, method: &str, params: P) -> Result<Option<T>, ChainError>
    where
        P: Serialize + Send,
        T: serde::de::DeserializeOwned,
    {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };
        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Rpc(format!("failed to send request: {e}")))?;
        if !response.status().is_success() {
            return Err(ChainError::Rpc(format!(
                "request failed with status: {}",
                response.status()
            )));
        }
        let decoded: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::Rpc(format!("failed to parse response: {e}")))?;
        if let Some(err) = decoded.error {
            if err.message.contains("empty") {
                return Err(ChainError::EmptyDealMap);
            }
            return Err(ChainError::Rpc(format!(
                "rpc error {}: {}",
                err.code, err.message
            )));
        }
        Ok(decoded.result)
    }
}

#[async_trait]
impl StorageChain for RpcStorageChain {
    async fn query_block_number(&self) -> Result<u64, ChainError> {
        self.call("chain_blockNumber", ())
            .await?
            .ok_or_else(|| ChainError::Rpc("missing result".to_string()))
    }

    async fn create_storage_order(&self, order: StorageOrder) -> Result<String, ChainError> {
        let payload = serde_json::to_vec(&order)
            .map_err(|e| ChainError::Rpc(format!("failed to serialize order: {e}")))?;
        let sign = hex::encode(signature::sign_message(&self.secret, &payload));
        self.call("storage_registerOrder", (order, self.signer.clone(), sign))
            .await?
            .ok_or_else(|| ChainError::Rpc("missing result".to_string()))
    }

    async fn query_deal_map(&self, fid: &str) -> Result<HashSet<i32>, ChainError> {
        let groups: Option<Vec<i32>> = self.call("storage_queryDealMap", (fid,)).await?;
        match groups {
            Some(groups) => Ok(groups.into_iter().collect()),
            None => Err(ChainError::EmptyDealMap),
        }
    }
}
