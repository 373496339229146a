use serde::Deserialize;

use crate::models::CommissionRates;

/// Stripe caps metadata values at 500 characters; the product summary is
/// cut to fit with room for the ellipsis marker.
const SUMMARY_MAX_CHARS: usize = 450;

/// A client-submitted cart line. Only the product id and quantity are
/// trusted; price and existence are revalidated server-side every time.
/// Unknown fields (e.g. a client-injected price) are dropped on parse.
#[derive(Debug, Clone, Deserialize)]
pub struct CartLine {
    pub id: String,
    #[serde(default)]
    pub quantity: Option<i64>,
}

impl CartLine {
    /// Missing or non-positive quantities are treated as a single unit.
    pub fn effective_quantity(&self) -> i64 {
        match self.quantity {
            Some(q) if q >= 1 => q,
            _ => 1,
        }
    }
}

/// A cart line validated against the authoritative product record.
/// Exists only for the duration of session construction.
#[derive(Debug, Clone)]
pub struct ValidatedItem {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub product_type: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    pub creator_id: Option<String>,
    /// Connected payout account of the creator, if any.
    pub stripe_account_id: Option<String>,
}

/// A single destination-transfer attached to the checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferInstruction {
    pub destination: String,
    pub application_fee_cents: i64,
}

/// Aggregate platform fee across all items:
/// `round(unit_price * quantity * rate)` per item, summed.
pub fn platform_fee_cents(items: &[ValidatedItem], rates: &CommissionRates) -> i64 {
    items
        .iter()
        .map(|item| {
            let rate = rates.rate_for(&item.product_type);
            (item.unit_price_cents as f64 * item.quantity as f64 * rate).round() as i64
        })
        .sum()
}

/// Destination-transfer instruction for the session, if any item's
/// creator has a connected payout account.
///
/// Only one transfer is supported per session: the full aggregate fee is
/// routed to the first payout account found, even when the cart mixes
/// products from multiple creators.
pub fn transfer_instruction(
    items: &[ValidatedItem],
    rates: &CommissionRates,
) -> Option<TransferInstruction> {
    let destination = items.iter().find_map(|i| i.stripe_account_id.clone())?;
    Some(TransferInstruction {
        destination,
        application_fee_cents: platform_fee_cents(items, rates),
    })
}

/// Human-readable cart summary for the session metadata, e.g.
/// `"tool:Massage Gun x2; course:Rehab Basics x1"`, truncated to survive
/// the provider's metadata value limit.
pub fn product_summary(items: &[ValidatedItem]) -> String {
    let full = items
        .iter()
        .map(|i| format!("{}:{} x{}", i.product_type, i.name, i.quantity))
        .collect::<Vec<_>>()
        .join("; ");

    if full.chars().count() <= SUMMARY_MAX_CHARS {
        return full;
    }
    let cut: String = full.chars().take(SUMMARY_MAX_CHARS).collect();
    format!("{}…", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommissionRates;

    fn item(
        id: &str,
        product_type: &str,
        price: i64,
        quantity: i64,
        account: Option<&str>,
    ) -> ValidatedItem {
        ValidatedItem {
            id: id.to_string(),
            name: format!("Item {}", id),
            image_url: "https://example.com/img.png".to_string(),
            product_type: product_type.to_string(),
            unit_price_cents: price,
            quantity,
            creator_id: account.map(|_| "creator".to_string()),
            stripe_account_id: account.map(String::from),
        }
    }

    #[test]
    fn fee_uses_per_type_rate_with_default() {
        let rates = CommissionRates::from_pairs([("tool".to_string(), 0.10)]);
        // tool at configured 0.10, workshop falls back to the 0.10 default
        let items = vec![
            item("a", "tool", 5000, 2, Some("acct_1")),
            item("b", "workshop", 3333, 1, None),
        ];
        // round(5000*2*0.1) + round(3333*0.1) = 1000 + 333
        assert_eq!(platform_fee_cents(&items, &rates), 1333);
    }

    #[test]
    fn fee_scenario_from_single_tool() {
        let rates = CommissionRates::from_pairs([("tool".to_string(), 0.10)]);
        let items = vec![item("a", "tool", 5000, 2, Some("acct_1"))];
        let transfer = transfer_instruction(&items, &rates).unwrap();
        assert_eq!(transfer.application_fee_cents, 1000);
        assert_eq!(transfer.destination, "acct_1");
    }

    #[test]
    fn transfer_goes_to_first_account_even_for_mixed_carts() {
        let rates = CommissionRates::default();
        let items = vec![
            item("a", "tool", 1000, 1, None),
            item("b", "tool", 2000, 1, Some("acct_b")),
            item("c", "tool", 3000, 1, Some("acct_c")),
        ];
        let transfer = transfer_instruction(&items, &rates).unwrap();
        // Full aggregate fee routed to the first account found.
        assert_eq!(transfer.destination, "acct_b");
        assert_eq!(transfer.application_fee_cents, 100 + 200 + 300);
    }

    #[test]
    fn no_transfer_without_any_payout_account() {
        let rates = CommissionRates::default();
        let items = vec![item("a", "tool", 1000, 1, None)];
        assert!(transfer_instruction(&items, &rates).is_none());
    }

    #[test]
    fn summary_lists_and_truncates() {
        let items = vec![
            item("a", "tool", 1000, 2, None),
            item("b", "course", 2000, 1, None),
        ];
        assert_eq!(product_summary(&items), "tool:Item a x2; course:Item b x1");

        let many: Vec<ValidatedItem> = (0..100)
            .map(|i| item(&format!("product-{}", i), "tool", 1000, 1, None))
            .collect();
        let summary = product_summary(&many);
        assert!(summary.chars().count() <= SUMMARY_MAX_CHARS + 1);
        assert!(summary.ends_with('…'));
    }

    #[test]
    fn quantity_defaults_to_one() {
        let line = CartLine { id: "a".to_string(), quantity: None };
        assert_eq!(line.effective_quantity(), 1);
        let zero = CartLine { id: "a".to_string(), quantity: Some(0) };
        assert_eq!(zero.effective_quantity(), 1);
        let two = CartLine { id: "a".to_string(), quantity: Some(2) };
        assert_eq!(two.effective_quantity(), 2);
    }
}
