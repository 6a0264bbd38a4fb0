//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the vault engine's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                        | Description                          |
//! |--------|-----------------------------|--------------------------------------|
//! | GET    | `/health`                   | Liveness probe                       |
//! | GET    | `/status`                   | Node status summary                  |
//! | GET    | `/vaults/:id`               | Vault projection by id               |
//! | GET    | `/users/:owner/vaults`      | Owner's vault ids, creation order    |
//! | GET    | `/events`                   | Raw event log for indexers           |
//! | GET    | `/activity`                 | Display-ready activity feed          |
//! | GET    | `/ws`                       | WebSocket for live block/vault events|
//! | POST   | `/vaults`                   | Create a vault (raw duration)        |
//! | POST   | `/vaults/preset`            | Create a vault from a lock preset    |
//! | POST   | `/vaults/:id/deposit`       | Deposit into a vault                 |
//! | POST   | `/vaults/:id/withdraw`      | Withdraw after unlock                |
//! | POST   | `/vaults/:id/early-withdraw`| Withdraw early, paying the penalty   |
//! | POST   | `/vaults/:id/harvest`       | Harvest accrued yield                |
//! | POST   | `/vaults/:id/compound`      | Compound accrued yield               |
//! | POST   | `/vaults/:id/renew`         | Renew a perpetual vault              |
//! | POST   | `/vaults/:id/close`         | Close a drained vault                |
//! | POST   | `/admin/pause`              | Toggle the emergency pause           |
//! | POST   | `/admin/rescue`             | Rescue stray tokens (paused only)    |
//! | POST   | `/admin/adapters/approve`   | Approve a registered yield adapter   |
//!
//! Error bodies carry the engine's stable rejection code alongside the
//! message, so clients can distinguish retry-later (`405` still-locked)
//! from fix-input (`400`/`402`) from wrong-wallet (`403`).
//!
//! The `caller` field in request bodies stands in for the transaction
//! sender the host chain would derive from a signature.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ember_ledger::events::{EventKind, VaultEvent};
use ember_ledger::{VaultError, VaultFactory, VaultView};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone — everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier (e.g., "devnet", "testnet", "mainnet").
    pub network: String,
    /// Current logical block height (advanced by the clock producer).
    pub block_height: Arc<AtomicU64>,
    /// The vault engine. One writer at a time reproduces the host
    /// chain's single-call atomicity.
    pub factory: Arc<RwLock<VaultFactory>>,
    /// Broadcast channel for live event notifications (blocks, vault ops).
    pub event_tx: broadcast::Sender<NodeEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// The height entry points execute against.
    pub fn height(&self) -> u64 {
        self.block_height.load(Ordering::Relaxed)
    }
}

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// A new block was produced by the local clock.
    NewBlock {
        height: u64,
        timestamp: u64,
    },
    /// A vault operation committed.
    VaultActivity(VaultEvent),
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
///
/// The returned router is ready to be served on the configured RPC port.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/vaults", post(create_vault_handler))
        .route("/vaults/preset", post(create_preset_handler))
        .route("/vaults/:id", get(vault_info_handler))
        .route("/vaults/:id/deposit", post(deposit_handler))
        .route("/vaults/:id/withdraw", post(withdraw_handler))
        .route("/vaults/:id/early-withdraw", post(early_withdraw_handler))
        .route("/vaults/:id/harvest", post(harvest_handler))
        .route("/vaults/:id/compound", post(compound_handler))
        .route("/vaults/:id/renew", post(renew_handler))
        .route("/vaults/:id/close", post(close_handler))
        .route("/users/:owner/vaults", get(user_vaults_handler))
        .route("/events", get(events_handler))
        .route("/activity", get(activity_handler))
        .route("/admin/pause", post(pause_handler))
        .route("/admin/rescue", post(rescue_handler))
        .route("/admin/adapters/approve", post(approve_adapter_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// Current logical block height.
    pub block_height: u64,
    /// Number of vaults ever created.
    pub vault_count: usize,
    /// Whether the emergency pause is set.
    pub paused: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Body for `POST /vaults`.
#[derive(Debug, Deserialize)]
pub struct CreateVaultRequest {
    /// The vault owner (and funding wallet).
    pub owner: String,
    /// Initial deposit in smallest units.
    pub amount: u64,
    /// Lock duration in blocks.
    pub duration_blocks: u64,
    /// Optional yield adapter id (must be approved).
    #[serde(default)]
    pub adapter: Option<String>,
    /// Perpetual flag; defaults to false.
    #[serde(default)]
    pub perpetual: bool,
}

/// Body for `POST /vaults/preset`.
#[derive(Debug, Deserialize)]
pub struct CreatePresetRequest {
    /// The vault owner (and funding wallet).
    pub owner: String,
    /// Initial deposit in smallest units.
    pub amount: u64,
    /// Lock preset label: `"7d"`, `"30d"`, `"90d"`, or `"180d"`.
    pub preset: String,
    /// Optional yield adapter id (must be approved).
    #[serde(default)]
    pub adapter: Option<String>,
    /// Perpetual flag; defaults to false.
    #[serde(default)]
    pub perpetual: bool,
}

/// Body for amount-carrying vault operations.
#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    /// The calling principal.
    pub caller: String,
    /// Amount in smallest units.
    pub amount: u64,
}

/// Body for caller-only vault operations (harvest, compound, renew, close).
#[derive(Debug, Deserialize)]
pub struct CallerRequest {
    /// The calling principal.
    pub caller: String,
}

/// Body for `POST /admin/pause`.
#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    /// The admin principal.
    pub caller: String,
    /// Desired pause state.
    pub paused: bool,
}

/// Body for `POST /admin/rescue`.
#[derive(Debug, Deserialize)]
pub struct RescueRequest {
    /// The admin principal.
    pub caller: String,
    /// Asset to rescue.
    pub asset: String,
    /// Amount in smallest units.
    pub amount: u64,
    /// Recipient of the rescued funds.
    pub to: String,
}

/// Body for `POST /admin/adapters/approve`.
#[derive(Debug, Deserialize)]
pub struct ApproveAdapterRequest {
    /// The admin principal.
    pub caller: String,
    /// Adapter to approve.
    pub adapter_id: String,
}

/// One display-ready activity feed entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityItem {
    /// Feed type: `Deposit`, `Withdrawal`, `Penalty`, `Harvest`, `Renewal`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Vault label.
    pub vault: String,
    /// Amount as a display string, in smallest units.
    pub amount: String,
    /// When, expressed as the commit height.
    pub time: String,
}

/// Error body returned by all endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// The engine's stable rejection code.
    pub code: u16,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Renders a [`VaultError`] as an HTTP response carrying its stable code.
fn error_response(err: VaultError) -> Response {
    let code = err.code();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    let body = ErrorResponse {
        error: err.to_string(),
        code,
    };
    (status, Json(body)).into_response()
}

/// Broadcasts the most recently committed vault event to subscribers.
fn publish_latest_event(state: &AppState, factory: &VaultFactory) {
    if let Some(event) = factory.events().all().last() {
        let _ = state
            .event_tx
            .send(NodeEvent::VaultActivity(event.clone()));
    }
}

// ---------------------------------------------------------------------------
// Read Handlers
// ---------------------------------------------------------------------------

/// `GET /health` — returns 200 if the node is alive.
///
/// This is the liveness probe for orchestrators. It intentionally does
/// not check internal subsystem health — that belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` — returns the node status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let factory = state.factory.read().await;
    let resp = StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        block_height: state.height(),
        vault_count: factory.ledger().vault_count(),
        paused: factory.ledger().is_paused(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /vaults/:id` — returns the vault projection, or 404.
async fn vault_info_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Response {
    let factory = state.factory.read().await;
    let view: Option<VaultView> = factory.get_vault_info(id, state.height());
    match view {
        Some(view) => (StatusCode::OK, Json(view)).into_response(),
        None => error_response(VaultError::NotFound(id)),
    }
}

/// `GET /users/:owner/vaults` — the owner's vault ids in creation order.
async fn user_vaults_handler(
    Path(owner): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let factory = state.factory.read().await;
    let vault_ids = factory.get_user_vaults(&owner);
    Json(serde_json::json!({ "owner": owner, "vault_ids": vault_ids }))
}

/// `GET /events` — the raw event log, oldest first. The schema indexers
/// consume: `{event_id, vault_id, kind, amount, penalty?, block_height}`.
async fn events_handler(State(state): State<AppState>) -> impl IntoResponse {
    let factory = state.factory.read().await;
    Json(factory.events().all().to_vec())
}

/// `GET /activity` — display-ready feed, newest first.
async fn activity_handler(State(state): State<AppState>) -> impl IntoResponse {
    let factory = state.factory.read().await;
    let activity: Vec<ActivityItem> = factory
        .events()
        .all()
        .iter()
        .rev()
        .map(|event| ActivityItem {
            kind: activity_type(event).to_string(),
            vault: format!("vault-{}", event.vault_id),
            amount: event.amount.to_string(),
            time: format!("block {}", event.block_height),
        })
        .collect();
    Json(serde_json::json!({ "ok": true, "activity": activity }))
}

/// Maps an event to the activity type a feed displays. Creation and
/// compounding both read as deposits to a balance-watching client.
fn activity_type(event: &VaultEvent) -> &'static str {
    match event.kind {
        EventKind::Created | EventKind::Deposit | EventKind::Compound => "Deposit",
        EventKind::Withdrawal => "Withdrawal",
        EventKind::Penalty => "Penalty",
        EventKind::Harvest => "Harvest",
        EventKind::Renewal => "Renewal",
    }
}

// ---------------------------------------------------------------------------
// Vault Operation Handlers
// ---------------------------------------------------------------------------

/// `POST /vaults` — creates a vault with an initial deposit.
async fn create_vault_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateVaultRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let now = state.height();
    let mut factory = state.factory.write().await;
    match factory.create_with_deposit(
        &req.owner,
        req.amount,
        req.duration_blocks,
        req.adapter.clone(),
        req.perpetual,
        now,
    ) {
        Ok(vault_id) => {
            state.metrics.vaults_created_total.inc();
            state.metrics.deposits_total.inc();
            publish_latest_event(&state, &factory);
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "vault_id": vault_id })),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/preset` — creates a vault from a lock-preset label.
async fn create_preset_handler(
    State(state): State<AppState>,
    Json(req): Json<CreatePresetRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let now = state.height();
    let mut factory = state.factory.write().await;
    match factory.create_with_preset(
        &req.owner,
        req.amount,
        &req.preset,
        req.adapter.clone(),
        req.perpetual,
        now,
    ) {
        Ok(vault_id) => {
            state.metrics.vaults_created_total.inc();
            state.metrics.deposits_total.inc();
            publish_latest_event(&state, &factory);
            (
                StatusCode::CREATED,
                Json(serde_json::json!({ "vault_id": vault_id })),
            )
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/:id/deposit` — deposits into an existing vault.
async fn deposit_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let now = state.height();
    let mut factory = state.factory.write().await;
    match factory.deposit(id, &req.caller, req.amount, now) {
        Ok(new_balance) => {
            state.metrics.deposits_total.inc();
            publish_latest_event(&state, &factory);
            Json(serde_json::json!({ "vault_id": id, "new_balance": new_balance }))
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/:id/withdraw` — penalty-free withdrawal after unlock.
async fn withdraw_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let now = state.height();
    let mut factory = state.factory.write().await;
    match factory.withdraw(id, &req.caller, req.amount, now) {
        Ok(remaining) => {
            state.metrics.withdrawals_total.inc();
            publish_latest_event(&state, &factory);
            Json(serde_json::json!({ "vault_id": id, "remaining": remaining })).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/:id/early-withdraw` — early exit, penalty deducted.
async fn early_withdraw_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<AmountRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let now = state.height();
    let mut factory = state.factory.write().await;
    match factory.early_withdraw(id, &req.caller, req.amount, now) {
        Ok(result) => {
            state.metrics.withdrawals_total.inc();
            state.metrics.penalties_collected_sats.inc_by(result.penalty);
            publish_latest_event(&state, &factory);
            Json(serde_json::json!({
                "vault_id": id,
                "penalty": result.penalty,
                "received": result.received,
            }))
            .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/:id/harvest` — pays out accrued yield.
async fn harvest_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let now = state.height();
    let mut factory = state.factory.write().await;
    match factory.harvest_yield(id, &req.caller, now) {
        Ok(harvested) => {
            state.metrics.yield_harvested_sats.inc_by(harvested);
            publish_latest_event(&state, &factory);
            Json(serde_json::json!({ "vault_id": id, "harvested": harvested })).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/:id/compound` — folds accrued yield into the balance.
async fn compound_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let now = state.height();
    let mut factory = state.factory.write().await;
    match factory.compound_yield(id, &req.caller, now) {
        Ok(new_balance) => {
            publish_latest_event(&state, &factory);
            Json(serde_json::json!({ "vault_id": id, "new_balance": new_balance }))
                .into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/:id/renew` — re-arms an expired perpetual vault.
async fn renew_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let now = state.height();
    let mut factory = state.factory.write().await;
    match factory.renew_perpetual(id, &req.caller, now) {
        Ok(()) => {
            publish_latest_event(&state, &factory);
            Json(serde_json::json!({ "vault_id": id, "renewed": true })).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// `POST /vaults/:id/close` — closes a drained vault.
async fn close_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<CallerRequest>,
) -> Response {
    let mut factory = state.factory.write().await;
    match factory.close_vault(id, &req.caller) {
        Ok(()) => Json(serde_json::json!({ "vault_id": id, "closed": true })).into_response(),
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// Admin Handlers
// ---------------------------------------------------------------------------

/// `POST /admin/pause` — toggles the emergency pause.
async fn pause_handler(
    State(state): State<AppState>,
    Json(req): Json<PauseRequest>,
) -> Response {
    let mut factory = state.factory.write().await;
    match factory.set_paused(&req.caller, req.paused) {
        Ok(()) => Json(serde_json::json!({ "paused": req.paused })).into_response(),
        Err(err) => error_response(err),
    }
}

/// `POST /admin/rescue` — rescues stray tokens while paused.
async fn rescue_handler(
    State(state): State<AppState>,
    Json(req): Json<RescueRequest>,
) -> Response {
    let mut factory = state.factory.write().await;
    match factory.rescue_token(&req.caller, &req.asset, req.amount, &req.to) {
        Ok(()) => Json(serde_json::json!({
            "asset": req.asset,
            "amount": req.amount,
            "to": req.to,
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

/// `POST /admin/adapters/approve` — approves a registered yield adapter.
async fn approve_adapter_handler(
    State(state): State<AppState>,
    Json(req): Json<ApproveAdapterRequest>,
) -> Response {
    let mut factory = state.factory.write().await;
    match factory.add_approved_adapter(&req.caller, &req.adapter_id) {
        Ok(added) => Json(serde_json::json!({
            "adapter_id": req.adapter_id,
            "approved": true,
            "newly_added": added,
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// `GET /ws` — WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`NodeEvent`] messages for each new block
/// and committed vault operation. The connection is read-only from the
/// server's perspective; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            // Client disconnected.
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {
                        // Client messages are ignored — this is a push-only channel.
                    }
                    _ => break, // Disconnected or error.
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use ember_ledger::adapter::{FixedApy, Strategy, YieldAdapter};
    use ember_ledger::config::{DEPLOYER_PRINCIPAL, LOCK_30_DAYS, PRIMARY_ASSET};
    use ember_ledger::VaultConfig;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const WALLET_1: &str = "ember:wallet-1";
    const WALLET_2: &str = "ember:wallet-2";
    const ADAPTER_ID: &str = "ember.fixed-yield-adapter";

    /// Creates a test AppState with funded wallets and an approved adapter.
    fn test_app_state() -> AppState {
        let mut factory = VaultFactory::new(VaultConfig::default());
        let adapter = YieldAdapter::new(
            ADAPTER_ID,
            DEPLOYER_PRINCIPAL,
            Strategy::FixedApy(FixedApy { apy_bps: 500 }),
        );
        factory.register_adapter(DEPLOYER_PRINCIPAL, adapter).unwrap();
        factory
            .add_approved_adapter(DEPLOYER_PRINCIPAL, ADAPTER_ID)
            .unwrap();
        let assets = factory.ledger_mut().assets_mut();
        assets
            .mint(PRIMARY_ASSET, WALLET_1, 1_000_000_000_000)
            .unwrap();
        assets
            .mint(PRIMARY_ASSET, WALLET_2, 1_000_000_000_000)
            .unwrap();

        let (event_tx, _) = broadcast::channel(16);
        AppState {
            version: "0.1.0-test".into(),
            network: "devnet".into(),
            block_height: Arc::new(AtomicU64::new(1)),
            factory: Arc::new(RwLock::new(factory)),
            event_tx,
            metrics: Arc::new(crate::metrics::NodeMetrics::new()),
        }
    }

    /// Sends a GET request and returns (status, body_bytes).
    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    /// Sends a POST request with a JSON body and returns (status, body_bytes).
    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body)
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body) = get(&router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn status_endpoint_reports_height_and_pause_flag() {
        let state = test_app_state();
        state.block_height.store(4_321, Ordering::Relaxed);
        let router = create_router(state);

        let (status, body) = get(&router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(resp.block_height, 4_321);
        assert_eq!(resp.network, "devnet");
        assert!(!resp.paused);
        assert_eq!(resp.vault_count, 0);
    }

    #[tokio::test]
    async fn create_vault_returns_first_id() {
        let router = create_router(test_app_state());
        let (status, body) = post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 100_000_000_000u64,
                "duration_blocks": LOCK_30_DAYS,
                "adapter": ADAPTER_ID,
            }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["vault_id"], 1);
    }

    #[tokio::test]
    async fn create_vault_with_zero_amount_returns_code_400() {
        let router = create_router(test_app_state());
        let (status, body) = post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 0,
                "duration_blocks": LOCK_30_DAYS,
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, 400);
    }

    #[tokio::test]
    async fn vault_info_roundtrip_and_404() {
        let router = create_router(test_app_state());
        post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 100_000_000_000u64,
                "duration_blocks": LOCK_30_DAYS,
            }),
        )
        .await;

        let (status, body) = get(&router, "/vaults/1").await;
        assert_eq!(status, StatusCode::OK);
        let view: VaultView = serde_json::from_slice(&body).unwrap();
        assert_eq!(view.id, 1);
        assert_eq!(view.owner, WALLET_1);
        assert_eq!(view.balance, 100_000_000_000);

        let (status, body) = get(&router, "/vaults/99").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, 404);
    }

    #[tokio::test]
    async fn withdraw_before_unlock_returns_code_405() {
        let router = create_router(test_app_state());
        post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 100_000_000_000u64,
                "duration_blocks": LOCK_30_DAYS,
            }),
        )
        .await;

        let (status, body) = post_json(
            &router,
            "/vaults/1/withdraw",
            serde_json::json!({ "caller": WALLET_1, "amount": 1_000 }),
        )
        .await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, 405);
    }

    #[tokio::test]
    async fn withdrawal_by_stranger_returns_code_403() {
        let state = test_app_state();
        let router = create_router(state.clone());
        post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 100_000_000_000u64,
                "duration_blocks": LOCK_30_DAYS,
            }),
        )
        .await;

        // Advance the clock past the lock so only ownership blocks the call.
        state
            .block_height
            .store(1 + LOCK_30_DAYS, Ordering::Relaxed);
        let (status, body) = post_json(
            &router,
            "/vaults/1/withdraw",
            serde_json::json!({ "caller": WALLET_2, "amount": 1_000 }),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, 403);
    }

    #[tokio::test]
    async fn early_withdraw_reports_penalty_and_received() {
        let router = create_router(test_app_state());
        post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 100_000_000_000u64,
                "duration_blocks": LOCK_30_DAYS,
            }),
        )
        .await;

        let (status, body) = post_json(
            &router,
            "/vaults/1/early-withdraw",
            serde_json::json!({ "caller": WALLET_1, "amount": 50_000_000_000u64 }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["penalty"], 500_000_000u64);
        assert_eq!(json["received"], 49_500_000_000u64);
    }

    #[tokio::test]
    async fn preset_and_raw_creation_produce_equivalent_vaults() {
        let router = create_router(test_app_state());
        post_json(
            &router,
            "/vaults/preset",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 100_000_000_000u64,
                "preset": "30d",
            }),
        )
        .await;
        post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_2,
                "amount": 100_000_000_000u64,
                "duration_blocks": 4_320,
            }),
        )
        .await;

        let (_, preset_body) = get(&router, "/vaults/1").await;
        let (_, raw_body) = get(&router, "/vaults/2").await;
        let preset_view: VaultView = serde_json::from_slice(&preset_body).unwrap();
        let raw_view: VaultView = serde_json::from_slice(&raw_body).unwrap();
        assert_eq!(preset_view.lock_duration_blocks, raw_view.lock_duration_blocks);
        assert_eq!(preset_view.lock_end_height, raw_view.lock_end_height);
    }

    #[tokio::test]
    async fn user_vaults_listed_in_creation_order() {
        let router = create_router(test_app_state());
        for amount in [100_000u64, 200_000u64] {
            post_json(
                &router,
                "/vaults",
                serde_json::json!({
                    "owner": WALLET_1,
                    "amount": amount,
                    "duration_blocks": LOCK_30_DAYS,
                }),
            )
            .await;
        }

        let (status, body) = get(&router, &format!("/users/{WALLET_1}/vaults")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["vault_ids"], serde_json::json!([1, 2]));
    }

    #[tokio::test]
    async fn activity_feed_lists_newest_first() {
        let router = create_router(test_app_state());
        post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 100_000_000_000u64,
                "duration_blocks": LOCK_30_DAYS,
            }),
        )
        .await;
        post_json(
            &router,
            "/vaults/1/early-withdraw",
            serde_json::json!({ "caller": WALLET_1, "amount": 10_000_000_000u64 }),
        )
        .await;

        let (status, body) = get(&router, "/activity").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["ok"], true);
        let activity = json["activity"].as_array().unwrap();
        assert_eq!(activity.len(), 2);
        assert_eq!(activity[0]["type"], "Penalty");
        assert_eq!(activity[0]["vault"], "vault-1");
        assert_eq!(activity[1]["type"], "Deposit");
    }

    #[tokio::test]
    async fn rescue_requires_pause_then_succeeds() {
        let state = test_app_state();
        state
            .factory
            .write()
            .await
            .ledger_mut()
            .assets_mut()
            .mint("WSTX", "ember.vault", 9_000)
            .unwrap();
        let router = create_router(state);

        let (status, body) = post_json(
            &router,
            "/admin/rescue",
            serde_json::json!({
                "caller": DEPLOYER_PRINCIPAL,
                "asset": "WSTX",
                "amount": 9_000,
                "to": "ember:ops",
            }),
        )
        .await;
        assert_eq!(status.as_u16(), 413);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, 413);

        post_json(
            &router,
            "/admin/pause",
            serde_json::json!({ "caller": DEPLOYER_PRINCIPAL, "paused": true }),
        )
        .await;
        let (status, _) = post_json(
            &router,
            "/admin/rescue",
            serde_json::json!({
                "caller": DEPLOYER_PRINCIPAL,
                "asset": "WSTX",
                "amount": 9_000,
                "to": "ember:ops",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn events_endpoint_serves_the_indexer_schema() {
        let router = create_router(test_app_state());
        post_json(
            &router,
            "/vaults",
            serde_json::json!({
                "owner": WALLET_1,
                "amount": 100_000_000_000u64,
                "duration_blocks": LOCK_30_DAYS,
            }),
        )
        .await;

        let (status, body) = get(&router, "/events").await;
        assert_eq!(status, StatusCode::OK);
        let events: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let first = &events.as_array().unwrap()[0];
        assert_eq!(first["vault_id"], 1);
        assert_eq!(first["kind"], "Created");
        assert_eq!(first["amount"], 100_000_000_000u64);
        assert_eq!(first["block_height"], 1);
    }
}
