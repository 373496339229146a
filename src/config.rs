use std::env;

/// Stripe platform account credentials.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Where Stripe redirects after a completed payment.
    pub success_url: String,
    /// Where Stripe redirects when the buyer abandons checkout.
    pub cancel_url: String,
    pub stripe: StripeConfig,
    /// reCAPTCHA server secret. Absent = verification skipped (dev only).
    pub recaptcha_secret: Option<String>,
    /// Resend API key. Absent = emails are logged, not sent.
    pub resend_api_key: Option<String>,
    pub email_from: String,
    /// Directory for generated receipt PDFs.
    pub receipts_dir: String,
    /// Key for signing time-limited receipt download URLs.
    pub url_signing_key: String,
    /// Key for buyer session tokens (HS256).
    pub session_signing_key: String,
    /// Shared key for server-to-server calls to /internal endpoints.
    pub internal_api_key: String,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("SHOP_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let success_url = env::var("CHECKOUT_SUCCESS_URL")
            .unwrap_or_else(|_| "https://recoverytools.au/checkout?success=true".to_string());
        let cancel_url = env::var("CHECKOUT_CANCEL_URL")
            .unwrap_or_else(|_| "https://recoverytools.au/cart".to_string());

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "shop.db".to_string()),
            base_url,
            success_url,
            cancel_url,
            stripe: StripeConfig {
                secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
                webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            },
            recaptcha_secret: env::var("RECAPTCHA_SECRET_KEY").ok(),
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "hello@recoverytools.au".to_string()),
            receipts_dir: env::var("RECEIPTS_DIR").unwrap_or_else(|_| "receipts".to_string()),
            url_signing_key: env::var("RECEIPT_URL_SIGNING_KEY")
                .unwrap_or_else(|_| "dev-receipt-url-key".to_string()),
            session_signing_key: env::var("SESSION_SIGNING_KEY")
                .unwrap_or_else(|_| "dev-session-signing-key".to_string()),
            internal_api_key: env::var("INTERNAL_API_KEY")
                .unwrap_or_else(|_| "dev-internal-key".to_string()),
            dev_mode,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
