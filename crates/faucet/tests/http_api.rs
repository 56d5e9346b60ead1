mod common;

use axum::{
    body::{to_bytes, Body},
    extract::connect_info::MockConnectInfo,
    http::{header, Request, StatusCode},
    Router,
};
use common::*;
use serde_json::{json, Value};
use std::net::SocketAddr;
use testnet_faucet::api::{router, AppState};
use tower::ServiceExt;

fn app(h: &Harness, trust_proxy_headers: bool) -> Router {
    router(AppState {
        issuer: h.issuer.clone(),
        trust_proxy_headers,
        metrics_enabled: true,
    })
    .layer(MockConnectInfo(SocketAddr::from(([192, 0, 2, 10], 40_000))))
}

fn post_claim(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_claim_then_cooldown() {
    let h = Harness::new();

    let (status, body) = send(
        app(&h, false),
        post_claim("/api/claim", json!({ "address": ALICE, "captcha": "ok" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let tx_hash = body["txHash"].as_str().unwrap();
    assert!(tx_hash.starts_with("0x") && tx_hash.len() == 66);

    let (status, body) = send(
        app(&h, false),
        post_claim("/claim", json!({ "address": ALICE, "captcha": "ok" })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "COOLDOWN_ACTIVE");
    assert_eq!(body["error"], "Please wait 1440 minutes before claiming again");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_invalid_address_is_bad_request() {
    let h = Harness::new();

    let (status, body) = send(
        app(&h, false),
        post_claim("/api/claim", json!({ "address": "0xZZZ", "captcha": "ok" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "INVALID_ADDRESS");
    assert_eq!(h.chain.sent_count(), 0);
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let h = Harness::new();

    let (status, body) = send(app(&h, false), post_claim("/api/claim", json!({ "wallet": ALICE }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_missing_captcha_is_rejected() {
    let h = Harness::new();

    let (status, body) = send(app(&h, false), post_claim("/api/claim", json!({ "address": ALICE }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid captcha");
}

#[tokio::test]
async fn test_token_field_selects_asset() {
    let h = Harness::new();

    let (status, _) = send(
        app(&h, false),
        post_claim(
            "/api/claim",
            json!({ "address": BOB, "token": "TOKEN_A", "captcha": "ok" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tx = decode_legacy(&h.chain.sent()[0]);
    assert_eq!(tx.to, address_bytes(TOKEN_A_CONTRACT));

    let (status, body) = send(
        app(&h, false),
        post_claim(
            "/api/claim",
            json!({ "address": CAROL, "token": "TOKEN_Z", "captcha": "ok" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_forwarded_for_keys_rate_limit_when_trusted() {
    let h = Harness::new();

    let forwarded = |address: &str, ip: &str| {
        let mut request = post_claim("/api/claim", json!({ "address": address, "captcha": "ok" }));
        request
            .headers_mut()
            .insert("x-forwarded-for", ip.parse().unwrap());
        request
    };

    for address in [ALICE, BOB, CAROL] {
        let (status, _) = send(app(&h, true), forwarded(address, "203.0.113.9")).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, body) = send(app(&h, true), forwarded(DAVE, "203.0.113.9")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");

    // a different forwarded client still has quota
    let (status, _) = send(app(&h, true), forwarded(DAVE, "203.0.113.10")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_status_health_and_metrics() {
    let h = Harness::new();
    send(
        app(&h, false),
        post_claim("/api/claim", json!({ "address": ALICE, "captcha": "ok" })),
    )
    .await;

    let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

    let (status, body) = send(app(&h, false), get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["statistics"]["total_claims"], 1);
    assert_eq!(body["recent_claims"][0]["address"], ALICE.to_lowercase());

    let (status, body) = send(app(&h, false), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(app(&h, false), get("/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["address"], FAUCET_ADDRESS);

    let response = app(&h, false).oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(text.to_vec()).unwrap();
    assert!(text.contains("faucet_claims_total"));
}
