use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Revert reason the faucet contract emits when an address claims twice.
///
/// The contract gives us no structured signal; the revert text travels inside
/// the node's JSON-RPC error payload and is matched as a substring in
/// [`crate::chain::classify_node_error`]. If the contract rewords it,
/// duplicate claims fall through to [`FaucetError::Node`] and surface as a
/// generic 500.
pub const DUPLICATE_CLAIM_MARKER: &str = "Address has already claimed faucet";

#[derive(Debug, Error)]
pub enum FaucetError {
    /// Required chain configuration values are missing or unusable. The names
    /// are for the server log only; the client never learns which ones.
    #[error("missing or invalid configuration values: {0:?}")]
    Config(Vec<&'static str>),

    /// The request body carried no syntactically valid recipient address.
    #[error("recipient address missing or not valid")]
    InvalidAddress,

    /// The recipient already holds a nonzero balance.
    #[error("recipient balance is nonzero")]
    NotEligible,

    /// The contract's replay guard rejected the claim.
    #[error("recipient has already claimed from the faucet")]
    AlreadyClaimed,

    /// Any other node, network, or signing failure.
    #[error("node call failed: {0}")]
    Node(String),
}

impl FaucetError {
    pub fn status(&self) -> StatusCode {
        match self {
            FaucetError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            FaucetError::InvalidAddress => StatusCode::BAD_REQUEST,
            FaucetError::NotEligible => StatusCode::FORBIDDEN,
            FaucetError::AlreadyClaimed => StatusCode::CONFLICT,
            FaucetError::Node(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        // Full detail stays server-side; the client only gets the
        // classification.
        tracing::error!(error = %self, "faucet request failed");
        let body = match &self {
            FaucetError::Config(_) => json!({"error": "Server configuration error."}),
            FaucetError::InvalidAddress => json!({"error": "address not valid."}),
            FaucetError::NotEligible => {
                json!({"message": "your not eligible (balance > 0)."})
            }
            FaucetError::AlreadyClaimed => {
                json!({"error": "address has already been claimed by faucet."})
            }
            FaucetError::Node(_) => {
                json!({"error": "An internal error occurred on the server."})
            }
        };
        (self.status(), Json(body)).into_response()
    }
}
