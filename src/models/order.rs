use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Order lifecycle. Pending on creation by the confirmation path; the
/// webhook path sets Paid when Stripe reports settlement; Shipped and the
/// terminal states are set by admin tooling. No writer validates the
/// current state before transitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Paid" => Ok(OrderStatus::Paid),
            "Shipped" => Ok(OrderStatus::Shipped),
            "Completed" => Ok(OrderStatus::Completed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(()),
        }
    }
}

/// A resolved line item recorded on an order. Derived from the payment
/// provider's own session record, never from client-supplied cart data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProduct {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    pub product_type: String,
    pub creator_id: Option<String>,
    /// Commission fraction captured at purchase time for later payout
    /// aggregation.
    pub commission_rate: f64,
}

/// The durable record of a completed purchase. Two denormalized copies
/// are maintained (the buyer's personal collection and the global one);
/// both carry the same invoice number and totals at write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Equal to the provider's checkout session id.
    pub invoice_number: String,
    pub user_id: Option<String>,
    pub user_email: Option<String>,
    pub products: Vec<OrderProduct>,
    pub subtotal_cents: i64,
    pub gst_cents: i64,
    pub total_cents: i64,
    pub stripe_transaction_id: Option<String>,
    /// Affiliate attribution, copied from session metadata at creation
    /// time and never revalidated.
    pub referred_by: Option<String>,
    pub referral_event: Option<String>,
    pub status: OrderStatus,
    pub shipping_name: Option<String>,
    /// Raw address JSON as reported by the provider webhook.
    pub shipping_address: Option<String>,
    pub purchased_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Totals derived from the provider's line-item amounts.
///
/// Prices are GST-inclusive: the GST component is extracted as one
/// eleventh of the summed total rather than added on top, so the total
/// equals the subtotal.
pub fn order_totals(line_totals: &[i64]) -> (i64, i64, i64) {
    let subtotal: i64 = line_totals.iter().sum();
    let gst = (subtotal as f64 / 11.0).round() as i64;
    (subtotal, gst, subtotal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gst_is_one_eleventh_of_inclusive_total() {
        let (subtotal, gst, total) = order_totals(&[7000, 4000]);
        assert_eq!(subtotal, 11000);
        assert_eq!(gst, 1000);
        assert_eq!(total, 11000);
    }

    #[test]
    fn gst_rounds_half_up() {
        // 100 / 11 = 9.09... -> 9
        assert_eq!(order_totals(&[100]).1, 9);
        // 105 / 11 = 9.545... -> 10
        assert_eq!(order_totals(&[105]).1, 10);
    }

    #[test]
    fn empty_line_items_produce_zero_totals() {
        assert_eq!(order_totals(&[]), (0, 0, 0));
    }

    #[test]
    fn status_round_trips() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("paid".parse::<OrderStatus>().is_err());
    }
}
