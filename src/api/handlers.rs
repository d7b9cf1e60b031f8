//! REST API handlers for the multisig workflow
//!
//! Coordinator calls block on the node, so every handler runs them on the
//! blocking thread pool.

use crate::core::{Amount, ErrorKind, ExchangeError, Phase, TransactionState};
use crate::exchange::{MultisigCoordinator, Preview, ResolvedMultisig, SendReport, SignReport};
use crate::node::{NodeBackend, UnspentOutput};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Coordinator type served by the API
pub type SharedCoordinator = MultisigCoordinator<Box<dyn NodeBackend>>;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub coordinator: Arc<SharedCoordinator>,
    /// One lock per paying identifier, held for the whole of a create call
    create_locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ApiState {
    pub fn new(coordinator: SharedCoordinator) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            create_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn create_slot(&self, identifier: &str) -> CreateSlot<'_> {
        let mut locks = self.create_locks.lock().unwrap_or_else(|e| e.into_inner());
        let lock = locks.entry(identifier.to_string()).or_default().clone();
        CreateSlot {
            locks: &self.create_locks,
            identifier: identifier.to_string(),
            lock,
        }
    }

    /// Identifiers with a create in progress
    pub fn pending_creates(&self) -> usize {
        self.create_locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Handle on a per-identifier create lock; the map entry goes away with the
/// last handle
struct CreateSlot<'a> {
    locks: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    identifier: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for CreateSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // only the map and this slot still hold it
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.identifier);
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
}

type ApiFailure = (StatusCode, Json<ApiError>);
type ApiResult<T> = Result<Json<T>, ApiFailure>;

/// Readable view of a decoded token
#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub phase: Phase,
    pub from_address: String,
    pub participants: Vec<String>,
    pub complete: bool,
    pub sent: bool,
    pub network_tx_id: Option<String>,
    pub used_input_ids: Vec<String>,
    pub average_confirmations: i64,
    pub min_confirmations: u32,
    pub raw_hex: String,
}

impl From<&TransactionState> for TransactionView {
    fn from(state: &TransactionState) -> Self {
        Self {
            phase: state.phase(),
            from_address: state.from_address.clone(),
            participants: state.participant_addresses.clone(),
            complete: state.complete,
            sent: state.sent,
            network_tx_id: state.network_tx_id.clone(),
            used_input_ids: state.used_input_ids.clone(),
            average_confirmations: state.average_confirmations,
            min_confirmations: state.min_confirmations,
            raw_hex: state.raw_hex.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub token: String,
    pub transaction: TransactionView,
}

#[derive(Debug, Serialize)]
pub struct UnspentResponse {
    pub identifier: String,
    pub total: Amount,
    pub outputs: Vec<UnspentOutput>,
}

// ============================================================================
// Request Types
// ============================================================================

/// Amounts are decimal coin strings such as `"1.5"`
#[derive(Deserialize)]
pub struct CreateRequest {
    pub paying: String,
    pub destination: String,
    pub amount: String,
    pub fee: String,
    pub min_confirmations: Option<u32>,
}

#[derive(Deserialize)]
pub struct PreviewRequest {
    pub paying: String,
    pub amount: String,
    pub fee: String,
    pub min_confirmations: Option<u32>,
}

#[derive(Deserialize)]
pub struct SignRequest {
    pub token: String,
    pub max_signers: Option<usize>,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
}

// ============================================================================
// Helpers
// ============================================================================

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidAddressOrAccount | ErrorKind::InvalidAmount | ErrorKind::DecodeFailed => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::InsufficientFunds | ErrorKind::BuildFailed | ErrorKind::BroadcastRejected => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::AlreadyComplete | ErrorKind::AlreadySent | ErrorKind::NotComplete => {
            StatusCode::CONFLICT
        }
        ErrorKind::CollaboratorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
    }
}

fn exchange_failure(err: ExchangeError) -> ApiFailure {
    let kind = err.kind();
    (
        status_for(kind),
        Json(ApiError {
            error: err.to_string(),
            kind: Some(kind),
        }),
    )
}

fn parse_amount(field: &str, value: &str) -> Result<Amount, ApiFailure> {
    value.parse().map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                error: format!("Invalid {}: {}", field, e),
                kind: Some(ErrorKind::InvalidAmount),
            }),
        )
    })
}

async fn run_blocking<T, F>(state: &ApiState, op: F) -> Result<T, ApiFailure>
where
    T: Send + 'static,
    F: FnOnce(&SharedCoordinator) -> Result<T, ExchangeError> + Send + 'static,
{
    let coordinator = state.coordinator.clone();
    tokio::task::spawn_blocking(move || op(&coordinator))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError {
                    error: format!("Worker failed: {}", e),
                    kind: None,
                }),
            )
        })?
        .map_err(exchange_failure)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// POST /api/multisig/transactions - Create an unsigned spend
pub async fn create_transaction(
    State(state): State<ApiState>,
    Json(req): Json<CreateRequest>,
) -> ApiResult<CreateResponse> {
    let amount = parse_amount("amount", &req.amount)?;
    let fee = parse_amount("fee", &req.fee)?;

    let slot = state.create_slot(&req.paying);
    let _guard = slot.lock.lock().await;

    let (token, transaction) = run_blocking(&state, move |c| {
        let token = c.create(
            &req.paying,
            &req.destination,
            amount,
            fee,
            req.min_confirmations,
        )?;
        let view = TransactionView::from(&c.inspect(&token)?);
        Ok((token, view))
    })
    .await?;

    Ok(Json(CreateResponse { token, transaction }))
}

/// POST /api/multisig/transactions/preview - Show the coin selection for a spend
pub async fn preview_transaction(
    State(state): State<ApiState>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Preview> {
    let amount = parse_amount("amount", &req.amount)?;
    let fee = parse_amount("fee", &req.fee)?;

    let preview = run_blocking(&state, move |c| {
        c.preview(&req.paying, amount, fee, req.min_confirmations)
    })
    .await?;
    Ok(Json(preview))
}

/// POST /api/multisig/sign - Add this node's signatures
pub async fn sign_transaction(
    State(state): State<ApiState>,
    Json(req): Json<SignRequest>,
) -> ApiResult<SignReport> {
    let report = run_blocking(&state, move |c| c.sign(req.token.trim(), req.max_signers)).await?;
    Ok(Json(report))
}

/// POST /api/multisig/send - Broadcast a fully signed token
pub async fn send_transaction(
    State(state): State<ApiState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<SendReport> {
    let report = run_blocking(&state, move |c| c.send(req.token.trim())).await?;
    Ok(Json(report))
}

/// POST /api/multisig/sign-and-send - Sign and broadcast in one step
pub async fn sign_and_send_transaction(
    State(state): State<ApiState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<SendReport> {
    let report = run_blocking(&state, move |c| c.try_sign_and_send(req.token.trim())).await?;
    Ok(Json(report))
}

/// POST /api/multisig/decode - Show the content of a token
pub async fn decode_transaction(
    State(state): State<ApiState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<TransactionView> {
    let decoded = state
        .coordinator
        .inspect(req.token.trim())
        .map_err(exchange_failure)?;
    Ok(Json(TransactionView::from(&decoded)))
}

/// GET /api/multisig/{identifier}/unspent - Unspent outputs of a multisig address
pub async fn list_unspent(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
) -> ApiResult<UnspentResponse> {
    let lookup = identifier.clone();
    let outputs = run_blocking(&state, move |c| c.list_unspent(&lookup)).await?;
    Ok(Json(UnspentResponse {
        identifier,
        total: outputs.iter().map(|o| o.amount).sum(),
        outputs,
    }))
}

/// GET /api/multisig/{identifier} - Resolve an address or account
pub async fn resolve_multisig(
    State(state): State<ApiState>,
    Path(identifier): Path<String>,
) -> ApiResult<ResolvedMultisig> {
    let resolved = run_blocking(&state, move |c| c.resolve(&identifier)).await?;
    Ok(Json(resolved))
}
