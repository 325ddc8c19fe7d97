use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{FaucetError, DUPLICATE_CLAIM_MARKER};

/// 20-byte account address, rendered as 0x-prefixed lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Address(pub [u8; 20]);

impl FromStr for Address {
    type Err = FaucetError;

    /// Accepts `0x` + 40 hex digits in any case. Checksum casing is not
    /// verified; the check is syntactic only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").ok_or(FaucetError::InvalidAddress)?;
        if digits.len() != 40 {
            return Err(FaucetError::InvalidAddress);
        }
        let bytes = hex::decode(digits).map_err(|_| FaucetError::InvalidAddress)?;
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// JSON-RPC quantities are hex strings of arbitrary width; eligibility only
/// needs to know whether the value is zero, so no big-integer parsing.
pub fn quantity_is_zero(quantity: &str) -> bool {
    let digits = quantity.strip_prefix("0x").unwrap_or(quantity);
    digits.chars().all(|c| c == '0')
}

/// Maps an upstream node error message onto the error taxonomy. The only
/// structured signal the contract gives for a repeat claim is its revert
/// reason text, so this is a substring match by necessity.
pub fn classify_node_error(message: &str) -> FaucetError {
    if message.contains(DUPLICATE_CLAIM_MARKER) {
        FaucetError::AlreadyClaimed
    } else {
        FaucetError::Node(message.to_string())
    }
}

/// The node-side collaborator: one read (balance) plus the calls needed to
/// assemble and submit the claim transaction. Behind a trait so the request
/// path can be exercised against a mock node.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Current balance as the raw hex quantity string.
    async fn get_balance(&self, address: &Address) -> Result<String, FaucetError>;

    async fn get_transaction_count(&self, address: &Address) -> Result<u64, FaucetError>;

    async fn chain_id(&self) -> Result<u64, FaucetError>;

    async fn gas_price(&self) -> Result<u128, FaucetError>;

    /// Contract reverts (including the duplicate-claim guard) surface here as
    /// node errors before anything is signed.
    async fn estimate_gas(
        &self,
        from: &Address,
        to: &Address,
        data: &[u8],
    ) -> Result<u64, FaucetError>;

    /// Returns the transaction hash on acceptance. Acceptance is submission
    /// only; nothing waits for a receipt or confirmation.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, FaucetError>;
}

/// reqwest-backed JSON-RPC client against an Ethereum-style node.
pub struct HttpNodeClient {
    rpc_url: String,
    client: reqwest::Client,
}

impl HttpNodeClient {
    pub fn new(rpc_url: String) -> Self {
        Self {
            rpc_url,
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, FaucetError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| FaucetError::Node(format!("{method} request failed: {e}")))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| FaucetError::Node(format!("{method} returned invalid JSON: {e}")))?;

        if let Some(error) = body.get("error") {
            return Err(classify_node_error(&error.to_string()));
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn expect_quantity_str<'a>(value: &'a Value, method: &str) -> Result<&'a str, FaucetError> {
    value
        .as_str()
        .ok_or_else(|| FaucetError::Node(format!("{method} returned a non-string quantity")))
}

fn parse_quantity_u64(value: &Value, method: &str) -> Result<u64, FaucetError> {
    let digits = expect_quantity_str(value, method)?.trim_start_matches("0x");
    u64::from_str_radix(digits, 16)
        .map_err(|e| FaucetError::Node(format!("{method} returned a malformed quantity: {e}")))
}

fn parse_quantity_u128(value: &Value, method: &str) -> Result<u128, FaucetError> {
    let digits = expect_quantity_str(value, method)?.trim_start_matches("0x");
    u128::from_str_radix(digits, 16)
        .map_err(|e| FaucetError::Node(format!("{method} returned a malformed quantity: {e}")))
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn get_balance(&self, address: &Address) -> Result<String, FaucetError> {
        let result = self
            .call("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        expect_quantity_str(&result, "eth_getBalance").map(str::to_owned)
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<u64, FaucetError> {
        let result = self
            .call(
                "eth_getTransactionCount",
                json!([address.to_string(), "latest"]),
            )
            .await?;
        parse_quantity_u64(&result, "eth_getTransactionCount")
    }

    async fn chain_id(&self) -> Result<u64, FaucetError> {
        let result = self.call("eth_chainId", json!([])).await?;
        parse_quantity_u64(&result, "eth_chainId")
    }

    async fn gas_price(&self) -> Result<u128, FaucetError> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        parse_quantity_u128(&result, "eth_gasPrice")
    }

    async fn estimate_gas(
        &self,
        from: &Address,
        to: &Address,
        data: &[u8],
    ) -> Result<u64, FaucetError> {
        let call = json!([{
            "from": from.to_string(),
            "to": to.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        }]);
        let result = self.call("eth_estimateGas", call).await?;
        parse_quantity_u64(&result, "eth_estimateGas")
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, FaucetError> {
        let result = self
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        expect_quantity_str(&result, "eth_sendRawTransaction").map(str::to_owned)
    }
}
