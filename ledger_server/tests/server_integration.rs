//! Integration tests for the ledger HTTP API.
//!
//! Every test builds a router over a fresh in-memory engine and drives it
//! with `oneshot`, so no database or socket is needed.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use ledger_server::api::{AppState, create_router};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method
use wager_ledger::{LedgerConfig, WagerEngine, db::MemoryLedgerStore};

/// Helper to create a router and the engine behind it
fn create_test_server() -> (axum::Router, Arc<WagerEngine>) {
    let engine = Arc::new(WagerEngine::new(
        Arc::new(MemoryLedgerStore::new()),
        LedgerConfig::default(),
    ));
    let app = create_router(AppState {
        engine: engine.clone(),
    });
    (app, engine)
}

fn post(uri: &str, body: Value, role: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(role) = role {
        builder = builder.header("x-operator-role", role);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check_endpoint() {
    let (app, _) = create_test_server();

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], true);
}

// ============================================================================
// Wager Tests
// ============================================================================

#[tokio::test]
async fn test_losing_then_winning_wager() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 1, "amount": "100", "outcome_effect": "-100", "game": "dice"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);
    assert_eq!(body["balance_after"], "900");
    assert_eq!(body["multiplier"], "0");
    assert_eq!(body["outcome_description"], "Lost 100 on dice");

    let (status, body) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 1, "amount": "100", "outcome_effect": "200", "game": "dice"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance_after"], "1100");
    assert_eq!(body["multiplier"], "3");
}

#[tokio::test]
async fn test_numeric_amounts_are_accepted() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 1, "amount": 25, "outcome_effect": -25, "game": "slots"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance_after"], "975");
}

#[tokio::test]
async fn test_insufficient_balance_is_rejected() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 1, "amount": "5000", "outcome_effect": "-5000", "game": "dice"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["accepted"], false);
    assert_eq!(body["reason"], "InsufficientBalance");

    let (_, account) = send(&app, get("/api/v1/users/1/account")).await;
    assert_eq!(account["balance"], "1000");
}

#[tokio::test]
async fn test_invalid_wager_is_rejected() {
    let (app, _) = create_test_server();

    let (status, body) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 1, "amount": "0", "outcome_effect": "0", "game": "dice"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["reason"], "InvalidWager");
}

#[tokio::test]
async fn test_pending_wager_resolution() {
    let (app, _) = create_test_server();

    let (_, placed) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 3, "amount": "50", "game": "mines", "is_complete": false}),
            None,
        ),
    )
    .await;
    assert_eq!(placed["balance_after"], "950");
    let wager_id = placed["wager_id"].as_str().unwrap().to_string();

    let (status, resolved) = send(
        &app,
        post(
            &format!("/api/v1/wagers/{wager_id}/resolve"),
            json!({"final_effect": "20"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resolved["balance_after"], "1020");
    assert_eq!(resolved["multiplier"], "1.4");

    let (status, _) = send(
        &app,
        post(
            &format!("/api/v1/wagers/{wager_id}/resolve"),
            json!({"final_effect": "20"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, wager) = send(&app, get(&format!("/api/v1/wagers/{wager_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wager["is_complete"], true);
}

// ============================================================================
// Account Tests
// ============================================================================

#[tokio::test]
async fn test_account_lookup_never_creates() {
    let (app, engine) = create_test_server();

    let (status, _) = send(&app, get("/api/v1/users/77/account")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(engine.accounts().accounts(77).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_account_view_hides_seed() {
    let (app, engine) = create_test_server();
    let account = engine
        .accounts()
        .resolve_or_create(5, true)
        .await
        .unwrap()
        .unwrap();

    let (status, body) = send(&app, get(&format!("/api/v1/accounts/{}", account.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert!(body.get("random_seed").is_none());
}

#[tokio::test]
async fn test_transactions_and_audit() {
    let (app, _) = create_test_server();

    let (_, placed) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 1, "amount": "10", "outcome_effect": "5", "game": "coinflip"}),
            None,
        ),
    )
    .await;
    let account_id = placed["account_id"].as_i64().unwrap();

    let (status, history) =
        send(&app, get(&format!("/api/v1/accounts/{account_id}/transactions"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 2);

    let (status, audit) = send(&app, get(&format!("/api/v1/accounts/{account_id}/audit"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["balance"], "1005");
    assert_eq!(audit["ledger_sum"], "1005");
    assert_eq!(audit["broken_chain_at"], json!([]));
}

// ============================================================================
// Operator Tests
// ============================================================================

#[tokio::test]
async fn test_exclusion_requires_role() {
    let (app, engine) = create_test_server();
    let account = engine
        .accounts()
        .resolve_or_create(1, true)
        .await
        .unwrap()
        .unwrap();
    let uri = format!("/api/v1/accounts/{}/exclusions", account.id);

    let (status, _) = send(&app, post(&uri, json!({"duration_secs": 3600}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, post(&uri, json!({"duration_secs": 3600}), Some("croupier"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post(&uri, json!({"duration_secs": 3600}), Some("gambler"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, post(&uri, json!({"duration_secs": 3600}), Some("hostess"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "hostess");

    let (status, body) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 1, "amount": "10", "outcome_effect": "-10", "game": "dice"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "Excluded");
}

#[tokio::test]
async fn test_oversized_exclusion_is_bad_request() {
    let (app, engine) = create_test_server();
    let account = engine
        .accounts()
        .resolve_or_create(1, true)
        .await
        .unwrap()
        .unwrap();
    let uri = format!("/api/v1/accounts/{}/exclusions", account.id);

    for duration_secs in [i64::MAX, i64::MIN, i64::MAX / 1000] {
        let (status, _) = send(
            &app,
            post(&uri, json!({"duration_secs": duration_secs}), Some("admin")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "duration_secs = {duration_secs}");
    }

    assert!(!engine.exclusions().is_excluded(account.id).await.unwrap());
}

#[tokio::test]
async fn test_adjustment_is_admin_only() {
    let (app, engine) = create_test_server();
    let account = engine
        .accounts()
        .resolve_or_create(1, true)
        .await
        .unwrap()
        .unwrap();
    let uri = format!("/api/v1/accounts/{}/adjustments", account.id);
    let body = json!({"effect": "250", "event_source": "deposit", "comment": "top up"});

    let (status, _) = send(&app, post(&uri, body.clone(), Some("hostess"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, tx) = send(&app, post(&uri, body, Some("admin"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tx["new_balance"], "1250");
    assert_eq!(tx["event_source"], "deposit");

    let (status, body) = send(
        &app,
        post(&uri, json!({"effect": "-5000"}), Some("owner")),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("Insufficient"));
}

#[tokio::test]
async fn test_ban_blocks_wagers() {
    let (app, _) = create_test_server();

    let (status, body) = send(&app, post("/api/v1/users/9/ban", json!({}), Some("owner"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "permanently_banned");

    let (status, body) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 9, "amount": "1", "outcome_effect": "-1", "game": "dice"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "PermanentBan");
}

#[tokio::test]
async fn test_disabled_account_is_inactive() {
    let (app, engine) = create_test_server();
    let account = engine
        .accounts()
        .resolve_or_create(2, true)
        .await
        .unwrap()
        .unwrap();

    let (status, _) = send(
        &app,
        post(
            &format!("/api/v1/accounts/{}/state", account.id),
            json!({"state": "administratively_disabled"}),
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        post(
            "/api/v1/wagers",
            json!({"user_id": 2, "amount": "1", "outcome_effect": "-1", "game": "dice"}),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "AccountInactive");
}

#[tokio::test]
async fn test_transfer_between_accounts() {
    let (app, engine) = create_test_server();
    let a = engine.accounts().resolve_or_create(1, true).await.unwrap().unwrap();
    let b = engine.accounts().resolve_or_create(2, true).await.unwrap().unwrap();

    let (status, body) = send(
        &app,
        post(
            "/api/v1/transfers",
            json!({"from_account_id": a.id, "to_account_id": b.id, "amount": "40"}),
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["debit"]["new_balance"], "960");
    assert_eq!(body["credit"]["new_balance"], "1040");

    let (status, _) = send(
        &app,
        post(
            "/api/v1/transfers",
            json!({"from_account_id": a.id, "to_account_id": a.id, "amount": "1"}),
            Some("admin"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_opens_fresh_account() {
    let (app, engine) = create_test_server();
    let old = engine.accounts().resolve_or_create(4, true).await.unwrap().unwrap();

    let (status, body) = send(&app, post("/api/v1/users/4/reset", json!({}), Some("admin"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["id"].as_i64().unwrap(), old.id);
    assert_eq!(body["balance"], "1000");
}
