use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::chain::{quantity_is_zero, Address, HttpNodeClient, NodeClient};
use crate::error::FaucetError;
use crate::wallet::{request_faucet_calldata, LegacyTransaction, OperatorWallet};
use crate::Conf;

pub struct AppState {
    pub allowed_origin: HeaderValue,
    /// `Err` holds the names of the missing or unusable configuration values;
    /// a server in that state still answers, with a 500 per claim.
    pub chain: Result<ChainCtx, Vec<&'static str>>,
}

/// Everything a claim needs to reach the chain: the node client, the faucet
/// contract address, and the operator's signing identity.
pub struct ChainCtx {
    pub node: Arc<dyn NodeClient>,
    pub contract: Address,
    pub wallet: OperatorWallet,
}

impl ChainCtx {
    pub fn from_conf(conf: &Conf) -> Result<Self, Vec<&'static str>> {
        let mut missing = Vec::new();
        if conf.rpc_url.is_empty() {
            missing.push("rpc_url");
        }
        if conf.contract_address.is_empty() {
            missing.push("contract_address");
        }
        if conf.private_key.is_empty() {
            missing.push("private_key");
        }
        if !missing.is_empty() {
            return Err(missing);
        }

        let contract = conf
            .contract_address
            .parse::<Address>()
            .map_err(|_| vec!["contract_address"])?;
        let wallet =
            OperatorWallet::from_hex_key(&conf.private_key).map_err(|_| vec!["private_key"])?;

        Ok(ChainCtx {
            node: Arc::new(HttpNodeClient::new(conf.rpc_url.clone())),
            contract,
            wallet,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let faucet = post(request_faucet)
        .options(preflight)
        .fallback(method_not_allowed);

    Router::new()
        .route("/_health", get(health))
        .route("/", faucet.clone())
        .route("/{*path}", faucet)
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Every response shape carries the same CORS headers, the error paths
/// included, so browser clients can always read the body.
async fn cors(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        state.allowed_origin.clone(),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

// --------------------------------------------------------
//     Routes
// --------------------------------------------------------

#[derive(Deserialize)]
struct FaucetRequest {
    #[serde(rename = "userAddress")]
    user_address: Option<String>,
}

#[derive(Serialize)]
struct FaucetResponse {
    success: bool,
    message: String,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
}

async fn health() -> impl IntoResponse {
    Json("OK")
}

/// Preflight short-circuits before any validation; the CORS middleware adds
/// the headers on the way out.
async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, OPTIONS")],
        Json(serde_json::json!({"error": "Method Not Allowed"})),
    )
        .into_response()
}

async fn request_faucet(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FaucetRequest>, JsonRejection>,
) -> Result<Json<FaucetResponse>, FaucetError> {
    // Validation first: a bad request is answered before configuration or the
    // node are ever consulted.
    let recipient = parse_recipient(payload)?;

    let chain = state
        .chain
        .as_ref()
        .map_err(|missing| FaucetError::Config(missing.clone()))?;

    let balance = chain.node.get_balance(&recipient).await?;
    if !quantity_is_zero(&balance) {
        return Err(FaucetError::NotEligible);
    }

    // The balance check and the submission are deliberately not atomic; the
    // contract's own replay guard is the final deduplication authority.
    let tx_hash = submit_claim(chain, &recipient).await?;
    info!(recipient = %recipient, tx_hash = %tx_hash, "faucet claim submitted");

    Ok(Json(FaucetResponse {
        success: true,
        message: format!("faucet funds sent to {recipient}"),
        transaction_hash: tx_hash,
    }))
}

fn parse_recipient(
    payload: Result<Json<FaucetRequest>, JsonRejection>,
) -> Result<Address, FaucetError> {
    // A missing body, malformed JSON, and a missing field all collapse into
    // the same client error.
    let Ok(Json(body)) = payload else {
        return Err(FaucetError::InvalidAddress);
    };
    match body.user_address.as_deref() {
        Some(raw) if !raw.is_empty() => raw.parse(),
        _ => Err(FaucetError::InvalidAddress),
    }
}

async fn submit_claim(chain: &ChainCtx, recipient: &Address) -> Result<String, FaucetError> {
    let operator = chain.wallet.address();
    let data = request_faucet_calldata(recipient);

    let nonce = chain.node.get_transaction_count(&operator).await?;
    let chain_id = chain.node.chain_id().await?;
    let gas_price = chain.node.gas_price().await?;
    // A revert from the contract, the duplicate-claim guard included, stops
    // the request here.
    let gas_limit = chain
        .node
        .estimate_gas(&operator, &chain.contract, &data)
        .await?;

    let tx = LegacyTransaction {
        nonce,
        gas_price,
        gas_limit,
        to: chain.contract,
        value: 0,
        data,
    };
    let raw = chain.wallet.sign_transaction(&tx, chain_id)?;
    chain.node.send_raw_transaction(&raw).await
}
