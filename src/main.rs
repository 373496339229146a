use axum::Router;
use clap::Parser;
use jwt_simple::algorithms::HS256Key;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use recovery_shop::auth;
use recovery_shop::config::Config;
use recovery_shop::db::{create_pool, init_db, queries, AppState};
use recovery_shop::email::EmailService;
use recovery_shop::handlers;
use recovery_shop::models::{CreateProduct, CreateUser};
use recovery_shop::payments::StripeClient;
use recovery_shop::recaptcha::RecaptchaVerifier;
use recovery_shop::receipts::ReceiptStore;

#[derive(Parser, Debug)]
#[command(name = "recovery-shop")]
#[command(about = "Checkout and order service for the Recovery Tools store")]
struct Cli {
    /// Seed the database with dev data (creator, buyer, products, rates)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seed a recognizable dev catalog and print a ready-to-use buyer token.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seed");

    let existing: i64 = conn
        .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
        .expect("Failed to count products");
    if existing > 0 {
        tracing::info!("Products already exist, skipping seed");
        return;
    }

    let creator = queries::create_user(
        &conn,
        &CreateUser {
            id: "dev-creator".to_string(),
            email: "creator@recoverytools.au".to_string(),
            name: "Dev Creator".to_string(),
            stripe_account_id: Some("acct_dev_creator".to_string()),
        },
    )
    .expect("Failed to seed creator");

    let buyer = queries::create_user(
        &conn,
        &CreateUser {
            id: "dev-buyer".to_string(),
            email: "buyer@recoverytools.au".to_string(),
            name: "Dev Buyer".to_string(),
            stripe_account_id: None,
        },
    )
    .expect("Failed to seed buyer");

    let gun = queries::create_product(
        &conn,
        &CreateProduct {
            name: "Massage Gun".to_string(),
            product_type: "tool".to_string(),
            price_cents: Some(5000),
            sale_price_cents: None,
            on_sale: false,
            image_url: None,
            creator_id: Some(creator.id.clone()),
        },
    )
    .expect("Failed to seed product");

    let course = queries::create_product(
        &conn,
        &CreateProduct {
            name: "Rehab Fundamentals Course".to_string(),
            product_type: "course".to_string(),
            price_cents: Some(12000),
            sale_price_cents: Some(9000),
            on_sale: true,
            image_url: None,
            creator_id: Some(creator.id.clone()),
        },
    )
    .expect("Failed to seed product");

    queries::set_commission_rate(&conn, "tool", 0.10).expect("Failed to seed rate");
    queries::set_commission_rate(&conn, "course", 0.15).expect("Failed to seed rate");

    let token = auth::sign_session_token(
        &state.session_key,
        &buyer.id,
        Some(&buyer.email),
        Some(&buyer.name),
    )
    .expect("Failed to sign dev token");

    println!("Seeded dev data:");
    println!("  Creator: {} (payout acct_dev_creator)", creator.id);
    println!("  Products: {} ({}), {} ({})", gun.name, gun.id, course.name, course.id);
    println!("  Buyer: {}", buyer.id);
    println!("  Buyer session token: {}", token);
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recovery_shop=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.stripe.secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY not set; checkout session creation will fail");
    }
    if config.recaptcha_secret.is_none() {
        tracing::warn!("RECAPTCHA_SECRET_KEY not set; bot checks are disabled");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        success_url: config.success_url.clone(),
        cancel_url: config.cancel_url.clone(),
        stripe: StripeClient::new(&config.stripe),
        recaptcha: RecaptchaVerifier::new(config.recaptcha_secret.clone()),
        email: EmailService::new(config.resend_api_key.clone(), config.email_from.clone()),
        receipts: ReceiptStore::new(
            config.receipts_dir.as_str(),
            config.url_signing_key.as_str(),
            config.base_url.as_str(),
        ),
        session_key: HS256Key::from_bytes(config.session_signing_key.as_bytes()),
        internal_api_key: config.internal_api_key.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set SHOP_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = Router::new()
        // Storefront endpoints (buyer session auth where required)
        .merge(handlers::shop::router(state.clone()))
        // Webhook endpoints (provider signature auth)
        .merge(handlers::webhooks::router())
        // Server-to-server endpoints (shared internal key)
        .merge(handlers::internal::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("Recovery Shop server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
