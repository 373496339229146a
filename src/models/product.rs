use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Fallback image shown when a product has none uploaded.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// Product category ("tool", "course", "workshop"). Drives the
    /// per-type commission rate lookup.
    pub product_type: String,
    /// List price in cents.
    pub price_cents: Option<i64>,
    /// Discounted price in cents, charged while `on_sale` is set.
    pub sale_price_cents: Option<i64>,
    pub on_sale: bool,
    pub image_url: Option<String>,
    /// Creator whose connected account receives the payout.
    pub creator_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    /// Authoritative unit price: sale price if the sale flag is set and a
    /// sale price exists, otherwise the list price. Client-submitted
    /// prices are never consulted.
    pub fn unit_price_cents(&self) -> Result<i64> {
        let price = if self.on_sale && self.sale_price_cents.is_some() {
            self.sale_price_cents
        } else {
            self.price_cents
        };
        match price {
            Some(p) if p > 0 => Ok(p),
            _ => Err(AppError::InvalidArgument(format!(
                "Invalid price for: {}",
                self.name
            ))),
        }
    }

    pub fn image_or_placeholder(&self) -> String {
        self.image_url
            .clone()
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default = "default_product_type")]
    pub product_type: String,
    pub price_cents: Option<i64>,
    #[serde(default)]
    pub sale_price_cents: Option<i64>,
    #[serde(default)]
    pub on_sale: bool,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
}

fn default_product_type() -> String {
    "tool".to_string()
}
