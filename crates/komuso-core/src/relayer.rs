//! relayer api client
//!
//! the relayer indexes the commitment tree, serves the encrypted-output
//! stream, answers nullifier existence checks, and lands transactions on
//! chain. responses are schema-less at the source, so everything is parsed
//! into strict types at this boundary; `/utxos/range` in particular has two
//! known shapes and both are accepted.

use ark_bn254::Fr;
use async_trait::async_trait;
use komuso_pool::field;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{classify_submit_error, EngineError, Result};
use crate::http::RetryingClient;
use crate::wire::WithdrawParams;

/// (root, next leaf index) pair maintained by the relayer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeState {
    pub root: Fr,
    pub next_index: u64,
}

/// inclusion proof for one commitment
#[derive(Clone, Debug)]
pub struct MerkleProof {
    pub path_elements: Vec<Fr>,
    pub path_indices: Vec<u8>,
    /// authoritative leaf position of the commitment
    pub index: u64,
    pub root: Fr,
    pub next_index: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SubmitResponse {
    pub signature: String,
    #[serde(default)]
    pub success: bool,
}

#[derive(Clone, Debug)]
pub struct DelayedWithdrawal {
    pub id: u64,
    pub execute_at: String,
    pub delay_minutes: u32,
}

#[derive(Clone, Debug)]
pub struct RelayerInfo {
    pub public_key: String,
}

/// the relayer endpoints the engine depends on
#[async_trait]
pub trait RelayerApi: Send + Sync {
    async fn tree_state(&self) -> Result<TreeState>;

    /// inclusion proof by commitment (decimal field-element string on the wire)
    async fn merkle_proof(&self, commitment: &Fr) -> Result<MerkleProof>;

    /// encrypted outputs for leaf positions `[start, end)`
    async fn utxo_range(&self, start: u64, end: u64) -> Result<Vec<String>>;

    /// per-nullifier spent flags, aligned with the input order
    async fn check_nullifiers(&self, nullifiers: &[Fr]) -> Result<Vec<bool>>;

    /// submit a serialized deposit payload (base64)
    async fn submit_deposit(&self, payload: &str, spl: bool) -> Result<SubmitResponse>;

    async fn submit_withdraw(&self, params: &WithdrawParams, spl: bool) -> Result<SubmitResponse>;

    async fn submit_delayed_withdraw(
        &self,
        params: &WithdrawParams,
        delay_minutes: u32,
        spl: bool,
    ) -> Result<DelayedWithdrawal>;

    async fn relayer_info(&self) -> Result<RelayerInfo>;
}

// ---------------------------------------------------------------------------
// wire types

#[derive(Deserialize)]
struct TreeStateRaw {
    root: String,
    #[serde(rename = "nextIndex")]
    next_index: u64,
}

#[derive(Deserialize)]
struct MerkleProofRaw {
    #[serde(rename = "pathElements")]
    path_elements: Vec<String>,
    #[serde(rename = "pathIndices")]
    path_indices: Vec<u8>,
    index: u64,
    root: String,
    #[serde(rename = "nextIndex")]
    next_index: u64,
}

/// `/utxos/range` answers either `{encrypted_outputs: [...]}` or a bare
/// list of per-leaf records
#[derive(Deserialize)]
#[serde(untagged)]
enum RangeRaw {
    Outputs {
        encrypted_outputs: Vec<String>,
        #[serde(rename = "hasMore", default)]
        #[allow(dead_code)]
        has_more: bool,
    },
    Records(Vec<RangeRecord>),
}

#[derive(Deserialize)]
struct RangeRecord {
    encrypted_output: String,
    #[serde(default)]
    #[allow(dead_code)]
    commitment: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    index: Option<u64>,
}

#[derive(Serialize)]
struct NullifierCheckRequest {
    nullifiers: Vec<String>,
}

#[derive(Deserialize)]
struct NullifierCheckRaw {
    nullifiers: std::collections::HashMap<String, bool>,
}

#[derive(Serialize)]
struct DepositRequest<'a> {
    #[serde(rename = "signedTransaction")]
    signed_transaction: &'a str,
}

#[derive(Deserialize)]
struct DelayedWithdrawRaw {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
    #[serde(rename = "delayedWithdrawalId")]
    delayed_withdrawal_id: u64,
    #[serde(rename = "executeAt")]
    execute_at: String,
    #[serde(rename = "delayMinutes")]
    delay_minutes: u32,
}

#[derive(Deserialize)]
struct RelayerInfoRaw {
    #[serde(default)]
    #[allow(dead_code)]
    success: bool,
    relayer: RelayerInfoInner,
}

#[derive(Deserialize)]
struct RelayerInfoInner {
    #[serde(rename = "publicKey")]
    public_key: String,
}

/// parse a field element that may arrive as decimal or hex
fn parse_field(s: &str) -> Result<Fr> {
    field::fr_from_decimal(s)
        .or_else(|_| field::fr_from_hex(s))
        .map_err(|_| EngineError::MalformedResponse(format!("bad field element {:?}", s)))
}

// ---------------------------------------------------------------------------
// http implementation

pub struct HttpRelayer {
    base_url: String,
    client: RetryingClient,
}

impl HttpRelayer {
    pub fn new(base_url: &str, client: RetryingClient) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_submit(&self, path: &str, params: &WithdrawParams) -> Result<SubmitResponse> {
        match self.client.post_json(&self.url(path), params).await {
            Ok(response) => Ok(response),
            Err(EngineError::Http { status, body }) => Err(classify_submit_error(status, &body)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl RelayerApi for HttpRelayer {
    async fn tree_state(&self) -> Result<TreeState> {
        let raw: TreeStateRaw = self.client.get_json(&self.url("/merkle/root")).await?;
        Ok(TreeState {
            root: parse_field(&raw.root)?,
            next_index: raw.next_index,
        })
    }

    async fn merkle_proof(&self, commitment: &Fr) -> Result<MerkleProof> {
        let path = format!("/merkle/proof/{}", field::fr_to_decimal(commitment));
        let raw: MerkleProofRaw = self.client.get_json(&self.url(&path)).await?;

        let path_elements = raw
            .path_elements
            .iter()
            .map(|s| parse_field(s))
            .collect::<Result<Vec<_>>>()?;
        if path_elements.len() != komuso_pool::TREE_DEPTH {
            return Err(EngineError::MalformedResponse(format!(
                "merkle proof has {} path elements",
                path_elements.len()
            )));
        }

        Ok(MerkleProof {
            path_elements,
            path_indices: raw.path_indices,
            index: raw.index,
            root: parse_field(&raw.root)?,
            next_index: raw.next_index,
        })
    }

    async fn utxo_range(&self, start: u64, end: u64) -> Result<Vec<String>> {
        let path = format!("/utxos/range?start={}&end={}", start, end);
        let raw: RangeRaw = self.client.get_json(&self.url(&path)).await?;
        let outputs = match raw {
            RangeRaw::Outputs { encrypted_outputs, .. } => encrypted_outputs,
            RangeRaw::Records(records) => {
                records.into_iter().map(|r| r.encrypted_output).collect()
            }
        };
        debug!("fetched {} encrypted outputs in [{}, {})", outputs.len(), start, end);
        Ok(outputs)
    }

    async fn check_nullifiers(&self, nullifiers: &[Fr]) -> Result<Vec<bool>> {
        let keys: Vec<String> = nullifiers
            .iter()
            .map(|n| hex::encode(field::fr_to_be_bytes(n)))
            .collect();
        let request = NullifierCheckRequest { nullifiers: keys.clone() };
        let raw: NullifierCheckRaw = self
            .client
            .post_json(&self.url("/nullifiers/check"), &request)
            .await?;

        // absent keys count as unspent
        Ok(keys
            .iter()
            .map(|k| raw.nullifiers.get(k).copied().unwrap_or(false))
            .collect())
    }

    async fn submit_deposit(&self, payload: &str, spl: bool) -> Result<SubmitResponse> {
        let path = if spl { "/deposit/spl" } else { "/deposit" };
        let request = DepositRequest { signed_transaction: payload };
        match self.client.post_json(&self.url(path), &request).await {
            Ok(response) => Ok(response),
            Err(EngineError::Http { status, body }) => Err(classify_submit_error(status, &body)),
            Err(e) => Err(e),
        }
    }

    async fn submit_withdraw(&self, params: &WithdrawParams, spl: bool) -> Result<SubmitResponse> {
        let path = if spl { "/withdraw/spl" } else { "/withdraw" };
        self.post_submit(path, params).await
    }

    async fn submit_delayed_withdraw(
        &self,
        params: &WithdrawParams,
        delay_minutes: u32,
        spl: bool,
    ) -> Result<DelayedWithdrawal> {
        let path = if spl { "/withdraw/spl/delayed" } else { "/withdraw/delayed" };
        let mut body = serde_json::to_value(params)?;
        body["delayMinutes"] = serde_json::json!(delay_minutes);

        let raw: DelayedWithdrawRaw = match self.client.post_json(&self.url(path), &body).await {
            Ok(response) => response,
            Err(EngineError::Http { status, body }) => {
                return Err(classify_submit_error(status, &body))
            }
            Err(e) => return Err(e),
        };
        Ok(DelayedWithdrawal {
            id: raw.delayed_withdrawal_id,
            execute_at: raw.execute_at,
            delay_minutes: raw.delay_minutes,
        })
    }

    async fn relayer_info(&self) -> Result<RelayerInfo> {
        let raw: RelayerInfoRaw = self.client.get_json(&self.url("/relayer")).await?;
        Ok(RelayerInfo { public_key: raw.relayer.public_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_shape_outputs() {
        let json = r#"{"encrypted_outputs": ["aaa", "bbb"], "total": 2, "hasMore": false}"#;
        let raw: RangeRaw = serde_json::from_str(json).unwrap();
        match raw {
            RangeRaw::Outputs { encrypted_outputs, .. } => {
                assert_eq!(encrypted_outputs, vec!["aaa", "bbb"]);
            }
            _ => panic!("expected outputs shape"),
        }
    }

    #[test]
    fn test_range_shape_records() {
        let json = r#"[
            {"commitment": "123", "encrypted_output": "aaa", "index": 0},
            {"commitment": "456", "encrypted_output": "bbb", "index": 1, "nullifier": "789"}
        ]"#;
        let raw: RangeRaw = serde_json::from_str(json).unwrap();
        match raw {
            RangeRaw::Records(records) => {
                assert_eq!(records.len(), 2);
                assert_eq!(records[0].encrypted_output, "aaa");
            }
            _ => panic!("expected records shape"),
        }
    }

    #[test]
    fn test_parse_field_decimal_and_hex() {
        assert_eq!(parse_field("42").unwrap(), Fr::from(42u64));
        assert_eq!(parse_field("0x2a").unwrap(), Fr::from(42u64));
        // hex without prefix still parses when decimal fails
        assert_eq!(parse_field("ff").unwrap(), Fr::from(255u64));
        assert!(parse_field("not-a-number").is_err());
    }

    #[test]
    fn test_tree_state_parse() {
        let json = r#"{"root": "12345", "nextIndex": 42}"#;
        let raw: TreeStateRaw = serde_json::from_str(json).unwrap();
        assert_eq!(raw.next_index, 42);
        assert_eq!(parse_field(&raw.root).unwrap(), Fr::from(12345u64));
    }
}
