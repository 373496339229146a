//! Test utilities and fixtures for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use jwt_simple::algorithms::HS256Key;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub use recovery_shop::auth;
pub use recovery_shop::config::StripeConfig;
pub use recovery_shop::db::{init_db, queries, AppState};
pub use recovery_shop::email::EmailService;
pub use recovery_shop::handlers;
pub use recovery_shop::models::*;
pub use recovery_shop::payments::StripeClient;
pub use recovery_shop::recaptcha::RecaptchaVerifier;
pub use recovery_shop::receipts::ReceiptStore;

pub const TEST_SESSION_KEY: &[u8] = b"test-session-signing-key";
pub const TEST_INTERNAL_KEY: &str = "test-internal-key";
pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Test state plus the tempdir backing its receipt store.
pub struct TestEnv {
    pub state: AppState,
    pub receipts_dir: TempDir,
}

/// Create an AppState for testing with an in-memory database.
///
/// `stripe_base` points the Stripe client at a stub server;
/// `recaptcha_url` enables token verification against a stub siteverify
/// endpoint (left disabled when None).
pub fn test_state(stripe_base: Option<&str>, recaptcha_url: Option<&str>) -> TestEnv {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }

    let receipts_dir = TempDir::new().expect("Failed to create receipts tempdir");

    let mut stripe = StripeClient::new(&StripeConfig {
        secret_key: "sk_test_xxx".to_string(),
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
    });
    if let Some(base) = stripe_base {
        stripe = stripe.with_api_base(base);
    }

    let recaptcha = match recaptcha_url {
        Some(url) => {
            RecaptchaVerifier::new(Some("test-recaptcha-secret".to_string())).with_verify_url(url)
        }
        None => RecaptchaVerifier::new(None),
    };

    let state = AppState {
        db: pool,
        base_url: "http://localhost:3000".to_string(),
        success_url: "https://recoverytools.au/checkout?success=true".to_string(),
        cancel_url: "https://recoverytools.au/cart".to_string(),
        stripe,
        recaptcha,
        email: EmailService::new(None, "hello@recoverytools.au".to_string()),
        receipts: ReceiptStore::new(
            receipts_dir.path(),
            "test-url-signing-key",
            "http://localhost:3000",
        ),
        session_key: HS256Key::from_bytes(TEST_SESSION_KEY),
        internal_api_key: TEST_INTERNAL_KEY.to_string(),
    };

    TestEnv { state, receipts_dir }
}

/// Full application router, wired like main.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::shop::router(state.clone()))
        .merge(handlers::webhooks::router())
        .merge(handlers::internal::router())
        .with_state(state)
}

/// Issue a session token for a test buyer.
pub fn buyer_token(state: &AppState, uid: &str) -> String {
    auth::sign_session_token(
        &state.session_key,
        uid,
        Some("buyer@example.com"),
        Some("Test Buyer"),
    )
    .expect("Failed to sign test token")
}

pub fn create_test_user(
    conn: &Connection,
    id: &str,
    stripe_account_id: Option<&str>,
) -> User {
    queries::create_user(
        conn,
        &CreateUser {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            name: format!("User {}", id),
            stripe_account_id: stripe_account_id.map(String::from),
        },
    )
    .expect("Failed to create test user")
}

pub fn create_test_product(
    conn: &Connection,
    name: &str,
    product_type: &str,
    price_cents: i64,
    creator_id: Option<&str>,
) -> Product {
    queries::create_product(
        conn,
        &CreateProduct {
            name: name.to_string(),
            product_type: product_type.to_string(),
            price_cents: Some(price_cents),
            sale_price_cents: None,
            on_sale: false,
            image_url: None,
            creator_id: creator_id.map(String::from),
        },
    )
    .expect("Failed to create test product")
}

/// A fully-populated order as written by the confirmation path.
pub fn make_order(invoice_number: &str, uid: &str) -> Order {
    Order {
        invoice_number: invoice_number.to_string(),
        user_id: Some(uid.to_string()),
        user_email: Some("buyer@example.com".to_string()),
        products: vec![OrderProduct {
            product_id: "prod_a".to_string(),
            name: "Massage Gun".to_string(),
            quantity: 2,
            unit_price_cents: 5000,
            line_total_cents: 10000,
            product_type: "tool".to_string(),
            creator_id: Some("creator-1".to_string()),
            commission_rate: 0.10,
        }],
        subtotal_cents: 10000,
        gst_cents: 909,
        total_cents: 10000,
        stripe_transaction_id: Some("pi_test_1".to_string()),
        referred_by: None,
        referral_event: None,
        status: OrderStatus::Pending,
        shipping_name: None,
        shipping_address: None,
        purchased_at: Some(1705276800),
        created_at: 1705276800,
        updated_at: 1705276800,
    }
}

// ============ HTTP helpers ============

pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

// ============ Stub servers ============

/// In-test Stripe API stub. Captures session-creation form bodies and
/// serves a configurable session object for retrieval.
pub struct StripeStub {
    pub base_url: String,
    pub create_requests: Arc<Mutex<Vec<String>>>,
    pub session_json: Arc<Mutex<Value>>,
}

impl StripeStub {
    pub fn set_session(&self, session: Value) {
        *self.session_json.lock().unwrap() = session;
    }

    pub fn captured_forms(&self) -> Vec<String> {
        self.create_requests.lock().unwrap().clone()
    }
}

pub async fn spawn_stripe_stub(initial_session: Value) -> StripeStub {
    let create_requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let session_json = Arc::new(Mutex::new(initial_session));

    let requests = create_requests.clone();
    let sessions = session_json.clone();

    let router = Router::new()
        .route(
            "/v1/checkout/sessions",
            post(move |body: String| {
                let requests = requests.clone();
                async move {
                    requests.lock().unwrap().push(body);
                    axum::Json(json!({
                        "id": "cs_test_stub",
                        "url": "https://checkout.stripe.test/pay/cs_test_stub"
                    }))
                }
            }),
        )
        .route(
            "/v1/checkout/sessions/{id}",
            get(move || {
                let sessions = sessions.clone();
                async move { axum::Json(sessions.lock().unwrap().clone()) }
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    StripeStub {
        base_url: format!("http://{}", addr),
        create_requests,
        session_json,
    }
}

/// In-test siteverify stub returning a fixed verdict.
pub async fn spawn_recaptcha_stub(response: Value) -> String {
    let router = Router::new().route(
        "/siteverify",
        post(move || {
            let response = response.clone();
            async move { axum::Json(response) }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{}/siteverify", addr)
}

/// A stubbed retrieved session with two line items totaling 11000 cents.
pub fn stub_session(product_a: &str, product_b: &str) -> Value {
    json!({
        "id": "cs_test_stub",
        "payment_status": "paid",
        "payment_intent": "pi_test_1",
        "customer_email": "buyer@example.com",
        "customer_details": { "name": "Jess Buyer", "email": "buyer@example.com" },
        "amount_total": 11000,
        "metadata": {
            "buyer_uid": "user-1",
            "referrer_uid": "affiliate-9",
            "ref_event": "tool_purchase"
        },
        "line_items": { "data": [
            {
                "description": "Massage Gun",
                "quantity": 2,
                "amount_total": 7000,
                "price": { "product": product_a }
            },
            {
                "description": "Foam Roller",
                "quantity": 1,
                "amount_total": 4000,
                "price": { "product": product_b }
            }
        ]}
    })
}
