use serde::{Deserialize, Serialize};

/// A shop user. Buyers and product creators share this table; creators
/// additionally carry a connected Stripe payout account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Connected Stripe account receiving creator payouts (acct_xxx).
    pub stripe_account_id: Option<String>,
    /// Saved checkout contact details, merged on every checkout attempt.
    pub checkout_name: Option<String>,
    pub checkout_email: Option<String>,
    pub checkout_phone: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub stripe_account_id: Option<String>,
}

/// Structured customer-contact fields submitted with a checkout attempt.
/// Persisted onto the user's profile for reuse in future checkouts.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}
