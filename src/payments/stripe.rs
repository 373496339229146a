use std::collections::HashMap;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::StripeConfig;
use crate::error::{msg, AppError, Result};
use crate::models::{TransferInstruction, ValidatedItem};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

/// All charges are made in the shop's single locale currency.
pub const CURRENCY: &str = "aud";

/// Flat shipping fee in cents, applied when address collection is on.
pub const FLAT_SHIPPING_CENTS: i64 = 1000;

/// Everything needed to request a hosted checkout session. Line items
/// carry server-resolved prices only; metadata values are flat strings.
#[derive(Debug)]
pub struct CheckoutSessionParams<'a> {
    pub line_items: &'a [ValidatedItem],
    pub metadata: &'a [(String, String)],
    pub transfer: Option<&'a TransferInstruction>,
    pub collect_shipping: bool,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateCheckoutSessionResponse {
    id: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::new(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API host (test servers).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Create a one-time-payment checkout session with ad-hoc price data.
    ///
    /// Prices are passed inline (`price_data`) rather than as dashboard
    /// price ids because the catalog, sales and commission splits live in
    /// our own database.
    pub async fn create_checkout_session(
        &self,
        params: &CheckoutSessionParams<'_>,
    ) -> Result<String> {
        let form = build_session_form(params);

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        let session: CreateCheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe response: {}", e)))?;

        Ok(session.id)
    }

    /// Retrieve a completed session with its line items and their linked
    /// prices expanded. This is the authoritative record the confirmation
    /// path derives orders from.
    pub async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<StripeCheckoutSession> {
        let response = self
            .client
            .get(format!(
                "{}/v1/checkout/sessions/{}",
                self.api_base, session_id
            ))
            .query(&[
                ("expand[]", "line_items"),
                ("expand[]", "line_items.data.price"),
            ])
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Stripe API error: {}",
                error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to parse Stripe session: {}", e)))
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature
        let mut timestamp = None;
        let mut sig_v1 = None;

        for part in signature.split(',') {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                sig_v1 = Some(s);
            }
        }

        let timestamp_str =
            timestamp.ok_or_else(|| AppError::InvalidArgument(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        let sig_v1 =
            sig_v1.ok_or_else(|| AppError::InvalidArgument(msg::INVALID_SIGNATURE_FORMAT.into()))?;

        // Reject replayed webhooks outside the tolerance window.
        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::InvalidArgument(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let age = chrono::Utc::now().timestamp() - timestamp;
        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                "Stripe webhook rejected: timestamp too old (age={}s, max={}s)",
                age,
                Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS
            );
            return Ok(false);
        }
        // Future timestamps allow for 60 seconds of clock skew.
        if age < -60 {
            tracing::warn!("Stripe webhook rejected: timestamp in the future (age={}s)", age);
            return Ok(false);
        }

        let signed_payload = format!("{}.{}", timestamp_str, String::from_utf8_lossy(payload));

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
        mac.update(signed_payload.as_bytes());
        let expected = hex::encode(mac.finalize().into_bytes());

        // Constant-time comparison; the length check is fine in the clear
        // since SHA-256 signatures are always 64 hex chars.
        let expected_bytes = expected.as_bytes();
        let provided_bytes = sig_v1.as_bytes();
        if expected_bytes.len() != provided_bytes.len() {
            return Ok(false);
        }

        Ok(expected_bytes.ct_eq(provided_bytes).into())
    }
}

/// Build the form-encoded body for session creation. Split out so the
/// exact wire parameters are testable without network access.
pub fn build_session_form(params: &CheckoutSessionParams<'_>) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        ("success_url".into(), params.success_url.into()),
        ("cancel_url".into(), params.cancel_url.into()),
    ];

    for (i, item) in params.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        form.push((
            format!("{}[price_data][currency]", prefix),
            CURRENCY.into(),
        ));
        form.push((
            format!("{}[price_data][unit_amount]", prefix),
            item.unit_price_cents.to_string(),
        ));
        form.push((
            format!("{}[price_data][product_data][name]", prefix),
            item.name.clone(),
        ));
        form.push((
            format!("{}[price_data][product_data][images][0]", prefix),
            item.image_url.clone(),
        ));
        form.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
    }

    for (key, value) in params.metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }

    if let Some(transfer) = params.transfer {
        form.push((
            "payment_intent_data[transfer_data][destination]".into(),
            transfer.destination.clone(),
        ));
        form.push((
            "payment_intent_data[application_fee_amount]".into(),
            transfer.application_fee_cents.to_string(),
        ));
    }

    if params.collect_shipping {
        form.push((
            "shipping_address_collection[allowed_countries][0]".into(),
            "AU".into(),
        ));
        form.push(("phone_number_collection[enabled]".into(), "true".into()));
        let rate = "shipping_options[0][shipping_rate_data]";
        form.push((format!("{}[type]", rate), "fixed_amount".into()));
        form.push((
            format!("{}[fixed_amount][amount]", rate),
            FLAT_SHIPPING_CENTS.to_string(),
        ));
        form.push((format!("{}[fixed_amount][currency]", rate), CURRENCY.into()));
        form.push((format!("{}[display_name]", rate), "Standard Shipping".into()));
        form.push((
            format!("{}[delivery_estimate][minimum][unit]", rate),
            "business_day".into(),
        ));
        form.push((format!("{}[delivery_estimate][minimum][value]", rate), "2".into()));
        form.push((
            format!("{}[delivery_estimate][maximum][unit]", rate),
            "business_day".into(),
        ));
        form.push((format!("{}[delivery_estimate][maximum][value]", rate), "5".into()));
    }

    form
}

// ============ Retrieved session objects ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: String,
    pub payment_intent: Option<String>,
    pub customer_email: Option<String>,
    pub customer_details: Option<StripeCustomerDetails>,
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    pub line_items: Option<StripeList<StripeLineItem>>,
    pub shipping_details: Option<StripeShippingDetails>,
}

#[derive(Debug, Deserialize)]
pub struct StripeCustomerDetails {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeShippingDetails {
    pub name: Option<String>,
    pub address: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct StripeLineItem {
    pub description: Option<String>,
    pub quantity: Option<i64>,
    /// Line total in minor units (unit price x quantity).
    pub amount_total: i64,
    pub price: Option<StripePrice>,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    /// The provider-side product reference, equal to our catalog id for
    /// ad-hoc price data sessions.
    pub product: String,
}

// ============ Webhook events ============

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}
