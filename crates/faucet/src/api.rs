//! HTTP API for the faucet

use crate::error::{FaucetError, FaucetResult};
use crate::ledger::ClaimRecord;
use crate::service::{ClaimIssuer, ClaimRequest, FaucetStatus};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{error, warn};

const RECENT_CLAIMS: usize = 10;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub issuer: Arc<ClaimIssuer>,
    pub trust_proxy_headers: bool,
    pub metrics_enabled: bool,
}

/// Claim request body
#[derive(Debug, Deserialize)]
pub struct ClaimBody {
    pub address: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub captcha: Option<String>,
}

/// Claim success body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub success: bool,
    pub tx_hash: String,
}

#[derive(Debug, Serialize)]
pub struct RecentClaim {
    pub address: String,
    pub asset: String,
    pub amount: String,
    pub tx_hash: String,
    pub claimed_at: String,
}

impl From<ClaimRecord> for RecentClaim {
    fn from(record: ClaimRecord) -> Self {
        Self {
            claimed_at: record.datetime().to_rfc3339(),
            address: record.address,
            asset: record.asset.to_string(),
            amount: record.amount,
            tx_hash: record.tx_hash,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: FaucetStatus,
    pub recent_claims: Vec<RecentClaim>,
    pub timestamp: String,
}

/// Client IP: the first `X-Forwarded-For` hop when proxy headers are
/// trusted, otherwise the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trust_proxy_headers: bool) -> IpAddr {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if let Some(ip) = forwarded {
            return ip;
        }
    }
    peer.ip()
}

/// Claim handler
pub async fn claim_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<ClaimBody>, JsonRejection>,
) -> FaucetResult<Json<ClaimResponse>> {
    let Json(body) = body.map_err(|e| FaucetError::InvalidRequest(e.body_text()))?;

    let request = ClaimRequest {
        address: body.address,
        token: body.token,
        captcha: body.captcha.unwrap_or_default(),
        client_ip: client_ip(&headers, peer, state.trust_proxy_headers),
    };

    match state.issuer.claim(request).await {
        Ok(receipt) => Ok(Json(ClaimResponse {
            success: true,
            tx_hash: receipt.tx_hash.to_string(),
        })),
        Err(e) => {
            if e.status().is_server_error() {
                error!("Claim failed: {}", e);
            } else {
                warn!("Claim rejected: {}", e);
            }
            Err(e)
        }
    }
}

/// Status handler
pub async fn status_handler(State(state): State<AppState>) -> FaucetResult<Json<StatusResponse>> {
    let status = state.issuer.status().await?;
    let recent_claims = state
        .issuer
        .recent_claims(RECENT_CLAIMS)
        .await?
        .into_iter()
        .map(RecentClaim::from)
        .collect();

    Ok(Json(StatusResponse {
        status,
        recent_claims,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Root handler with info
pub async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Testnet Faucet",
        "version": env!("CARGO_PKG_VERSION"),
        "address": state.issuer.faucet_address().to_checksum(),
        "endpoints": {
            "POST /api/claim": "Request native coin or test tokens",
            "GET /api/status": "Get faucet status",
            "GET /health": "Health check",
            "GET /metrics": "Prometheus metrics"
        }
    }))
}

/// Prometheus text exposition
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    if !state.metrics_enabled {
        return (StatusCode::NOT_FOUND, "metrics disabled".to_string()).into_response();
    }
    match state.issuer.metrics().gather() {
        Ok(text) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => e.into_response(),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/status", get(status_handler))
        .route("/api/claim", post(claim_handler))
        .route("/claim", post(claim_handler))
        .with_state(state)
}
