#![allow(dead_code)]

use actix_web::dev::ServiceResponse;
use actix_web::{test, web};
use chrono::{TimeZone, Utc};
use hstar_server::clock::ManualClock;
use hstar_server::db::{BoardStore, MemoryStore};
use hstar_server::{AppState, Settings, Stores};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct TestContext {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub state: web::Data<AppState>,
}

pub fn context() -> TestContext {
    let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    let store = Arc::new(MemoryStore::new(clock.clone()));
    let config = Settings::new_for_test().expect("Failed to load test config");
    let state = AppState::with_stores(config, Stores::single(store.clone()), clock.clone());
    TestContext {
        clock,
        store,
        state: web::Data::new(state),
    }
}

pub async fn create_board(ctx: &TestContext) -> i64 {
    ctx.store.create_board("free", None).await.unwrap().id
}

pub async fn body_json(resp: ServiceResponse) -> Value {
    test::read_body_json(resp).await
}

pub fn sign_up_body(username: &str) -> Value {
    json!({
        "username": username,
        "password": "password123",
        "email": format!("{}@example.com", username)
    })
}

pub fn login_body(username: &str) -> Value {
    json!({ "username": username, "password": "password123" })
}

/// Signs `$username` up with the shared test password, logs in and
/// evaluates to the issued bearer token.
macro_rules! sign_up_and_login {
    ($app:expr, $username:expr) => {{
        let resp = actix_web::test::TestRequest::post()
            .uri("/api/users/signUp")
            .set_json($crate::common::sign_up_body($username))
            .send_request(&$app)
            .await;
        assert_eq!(resp.status(), 201, "sign-up of {} failed", $username);

        let resp = actix_web::test::TestRequest::post()
            .uri("/api/users/login")
            .set_json($crate::common::login_body($username))
            .send_request(&$app)
            .await;
        assert_eq!(resp.status(), 200, "login of {} failed", $username);
        let body = $crate::common::body_json(resp).await;
        body["data"].as_str().expect("token in login response").to_string()
    }};
}
