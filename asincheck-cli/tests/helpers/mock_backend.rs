//! Mock backend bound to 127.0.0.1:0
//!
//! - `POST /api/auth/login`: `SELLER_EMAIL`/`PASSWORD` succeed,
//!   `UNVERIFIED_EMAIL` needs verification, anything else is 401
//! - `POST /api/auth/refresh`: `refresh-1` rotates the valid token to `access-2`,
//!   `OUTAGE_REFRESH_TOKEN` answers 503, anything else is 401
//! - `POST /api/asin/check`: `B0APPROVAL*` needs approval, `B0MISSING*`
//!   returns no results, everything else is eligible; bumps usage
//! - `GET /api/user/subscription-data`, `GET /api/subscription/billing-info`

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use asincheck_common::api::CheckRequest;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

pub const SELLER_EMAIL: &str = "seller@example.com";
pub const UNVERIFIED_EMAIL: &str = "new@example.com";
pub const PASSWORD: &str = "hunter2";
pub const OUTAGE_REFRESH_TOKEN: &str = "refresh-outage";

pub const USAGE_LIMIT: i64 = 100;

pub struct MockState {
    pub valid_token: Mutex<String>,
    pub usage: AtomicI64,
    pub check_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub unauthorized_hits: AtomicUsize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            valid_token: Mutex::new("access-1".to_string()),
            usage: AtomicI64::new(10),
            check_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            unauthorized_hits: AtomicUsize::new(0),
        }
    }
}

type Reply = (StatusCode, Json<Value>);

fn unauthorized(state: &MockState) -> Reply {
    state.unauthorized_hits.fetch_add(1, Ordering::SeqCst);
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "message": "Invalid token" })),
    )
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    bearer == Some(state.valid_token.lock().unwrap().as_str())
}

async fn login(Json(body): Json<Value>) -> Reply {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    if email == UNVERIFIED_EMAIL {
        return (
            StatusCode::OK,
            Json(json!({ "success": false, "requiresVerification": true })),
        );
    }
    if email != SELLER_EMAIL || password != PASSWORD {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Invalid credentials" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "token": "access-1",
            "refreshToken": "refresh-1",
            "user": { "id": "user-1", "email": SELLER_EMAIL, "name": "Sam Seller" }
        })),
    )
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Reply {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if body["refreshToken"].as_str() == Some(OUTAGE_REFRESH_TOKEN) {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "success": false, "message": "Service unavailable" })),
        );
    }
    if body["refreshToken"].as_str() != Some("refresh-1") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Refresh token expired" })),
        );
    }
    *state.valid_token.lock().unwrap() = "access-2".to_string();
    (
        StatusCode::OK,
        Json(json!({ "success": true, "token": "access-2", "refreshToken": "refresh-2" })),
    )
}

async fn check(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<CheckRequest>,
) -> Reply {
    if !authorized(&state, &headers) {
        return unauthorized(&state);
    }
    state.check_calls.fetch_add(1, Ordering::SeqCst);

    let results: Vec<Value> = body
        .asins
        .iter()
        .filter(|asin| !asin.starts_with("B0MISSING"))
        .map(|asin| {
            if asin.starts_with("B0APPROVAL") {
                json!({
                    "asin": asin,
                    "details": { "itemName": format!("Gated {}", asin), "brand": "Acme" },
                    "detailedStatus": "APPROVAL REQUIRED",
                    "sellable": false
                })
            } else {
                json!({
                    "asin": asin,
                    "title": format!("Product {}", asin),
                    "brand": "Acme",
                    "detailedStatus": "Eligible",
                    "sellable": true,
                    "imageUrl": format!("https://images.example.com/{}.jpg", asin)
                })
            }
        })
        .collect();

    let current = state.usage.fetch_add(1, Ordering::SeqCst) + 1;
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "results": results,
            "usage": { "current": current, "limit": USAGE_LIMIT }
        })),
    )
}

async fn subscription_data(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if !authorized(&state, &headers) {
        return unauthorized(&state);
    }
    let current = state.usage.load(Ordering::SeqCst);
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "data": {
                "plan": {
                    "code": "pro",
                    "name": "Pro",
                    "monthlyLimit": USAGE_LIMIT,
                    "price": 29.0,
                    "features": ["bulk"],
                    "isActive": true
                },
                "usage": {
                    "current": current,
                    "limit": USAGE_LIMIT,
                    "percentage": current as f64,
                    "resetDate": "2026-11-01"
                },
                "statistics": {
                    "thisMonth": {
                        "breakdown": {
                            "eligible": { "count": 7, "percentage": 70.0 },
                            "restricted": { "count": 3, "percentage": 30.0 }
                        }
                    }
                },
                "subscription": { "endDate": "2026-11-01", "isActive": true }
            }
        })),
    )
}

async fn billing_info(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Reply {
    if !authorized(&state, &headers) {
        return unauthorized(&state);
    }
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "currentPlan": "pro",
            "subscriptionEndDate": "2026-11-01",
            "remainingDays": 13,
            "pendingChange": {
                "targetPlan": "basic",
                "effectiveDate": "2026-11-01",
                "status": "scheduled"
            }
        })),
    )
}

/// Start the mock backend; returns its base URL (ending in `/api`)
pub async fn spawn_mock_backend() -> (String, Arc<MockState>) {
    let state = Arc::new(MockState::default());
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/asin/check", post(check))
        .route("/api/user/subscription-data", get(subscription_data))
        .route("/api/subscription/billing-info", get(billing_info))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("mock backend");
    });

    (format!("http://{}/api", addr), state)
}
