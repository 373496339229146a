mod from_row;
pub mod queries;
mod schema;

pub use schema::init_db;

use jwt_simple::algorithms::HS256Key;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::email::EmailService;
use crate::payments::StripeClient;
use crate::recaptcha::RecaptchaVerifier;
use crate::receipts::ReceiptStore;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Base URL of this service (e.g. https://api.recoverytools.au),
    /// used for receipt download links.
    pub base_url: String,
    /// Stripe redirect targets, fixed per deployment.
    pub success_url: String,
    pub cancel_url: String,
    pub stripe: StripeClient,
    pub recaptcha: RecaptchaVerifier,
    pub email: EmailService,
    pub receipts: ReceiptStore,
    /// HS256 key validating buyer session tokens.
    pub session_key: HS256Key,
    /// Shared key authenticating server-to-server /internal calls.
    pub internal_api_key: String,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
