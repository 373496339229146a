//! Email service for sending order confirmations.
//!
//! Sends via the Resend API when an API key is configured; otherwise the
//! message is logged and skipped so local development never needs real
//! credentials.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Result of attempting to send an order confirmation email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Email was sent successfully via Resend
    Sent,
    /// No API key configured; the send was logged and skipped
    Disabled,
}

/// An order confirmation email carrying the signed receipt link.
#[derive(Debug)]
pub struct OrderReceiptEmail<'a> {
    pub to: &'a str,
    pub invoice_id: &'a str,
    pub user_name: &'a str,
    pub receipt_url: &'a str,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

#[derive(Clone)]
pub struct EmailService {
    api_key: Option<String>,
    from_email: String,
    http_client: Client,
}

impl EmailService {
    pub fn new(api_key: Option<String>, from_email: String) -> Self {
        Self {
            api_key,
            from_email,
            http_client: Client::new(),
        }
    }

    /// Send the order confirmation with the receipt download link.
    pub async fn send_order_receipt(
        &self,
        email: OrderReceiptEmail<'_>,
    ) -> Result<EmailSendResult> {
        let Some(api_key) = &self.api_key else {
            tracing::info!(
                "Email disabled, skipping receipt for order {} to {}",
                email.invoice_id,
                email.to
            );
            return Ok(EmailSendResult::Disabled);
        };

        let subject = format!("Your Receipt - Order {}", email.invoice_id);
        let text = format!(
            "Hi {},\n\nThanks for your order. Download your receipt here:\n{}\n\n\
             If you have any questions, reply to this email or contact us at {}.\n\n\
             - Recovery Tools Team\n",
            email.user_name, email.receipt_url, self.from_email
        );
        let html = format!(
            "<p>Hi {},</p>\
             <p>Thanks for your order. You can download your receipt below:</p>\
             <p><a href=\"{}\" target=\"_blank\" rel=\"noopener\">Download Invoice PDF</a></p>\
             <p>If you have any questions, reply to this email or contact us at \
             <a href=\"mailto:{from}\">{from}</a>.</p>\
             <p>&ndash; Recovery Tools Team</p>",
            email.user_name,
            email.receipt_url,
            from = self.from_email,
        );

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![email.to],
            subject,
            text,
            html,
        };

        let response = self
            .http_client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Email send failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Email API returned {}: {}",
                status, body
            )));
        }

        let _: ResendEmailResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Email API response invalid: {}", e)))?;

        tracing::info!("Receipt email sent for order {} to {}", email.invoice_id, email.to);
        Ok(EmailSendResult::Sent)
    }
}
