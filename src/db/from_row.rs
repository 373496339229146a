//! Row mapping trait and helpers for reducing boilerplate in queries.

use rusqlite::{Connection, OptionalExtension, Row, ToSql};

use crate::models::*;

/// Trait for constructing a type from a database row.
///
/// Implementing this trait allows using the `query_one` and `query_all`
/// helper functions, reducing repetitive row mapping closures.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row)
        .optional()
        .map_err(Into::into)
}

/// Query for multiple results.
pub fn query_all<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> crate::error::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Parse a status column, converting unknown values to a column error
/// instead of panicking on corrupted data.
fn parse_status(row: &Row, col: usize) -> rusqlite::Result<OrderStatus> {
    row.get::<_, String>(col)?.parse().map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, "status".to_string(), rusqlite::types::Type::Text)
    })
}

/// Parse the products JSON column into resolved line items.
fn parse_products(row: &Row, col: usize) -> rusqlite::Result<Vec<OrderProduct>> {
    let raw: String = row.get(col)?;
    serde_json::from_str(&raw).map_err(|_| {
        rusqlite::Error::InvalidColumnType(col, "products".to_string(), rusqlite::types::Type::Text)
    })
}

// ============ SQL SELECT Constants ============

pub const USER_COLS: &str = "id, email, name, stripe_account_id, checkout_name, checkout_email, checkout_phone, created_at, updated_at";

pub const PRODUCT_COLS: &str = "id, name, product_type, price_cents, sale_price_cents, on_sale, image_url, creator_id, created_at, updated_at";

pub const ORDER_COLS: &str = "invoice_number, user_id, user_email, products, subtotal_cents, gst_cents, total_cents, stripe_transaction_id, referred_by, referral_event, status, shipping_name, shipping_address, purchased_at, created_at, updated_at";

/// user_orders selected in [`ORDER_COLS`] position order so a single
/// `FromRow` impl covers both tables.
pub const USER_ORDER_COLS: &str = "invoice_number, user_id, user_email, products, subtotal_cents, gst_cents, total_cents, stripe_transaction_id, referred_by, referral_event, status, shipping_name, shipping_address, purchased_at, created_at, updated_at";

// ============ FromRow Implementations ============

impl FromRow for User {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            stripe_account_id: row.get(3)?,
            checkout_name: row.get(4)?,
            checkout_email: row.get(5)?,
            checkout_phone: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

impl FromRow for Product {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Product {
            id: row.get(0)?,
            name: row.get(1)?,
            product_type: row.get(2)?,
            price_cents: row.get(3)?,
            sale_price_cents: row.get(4)?,
            on_sale: row.get::<_, i64>(5)? != 0,
            image_url: row.get(6)?,
            creator_id: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

impl FromRow for Order {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Order {
            invoice_number: row.get(0)?,
            user_id: row.get(1)?,
            user_email: row.get(2)?,
            products: parse_products(row, 3)?,
            subtotal_cents: row.get(4)?,
            gst_cents: row.get(5)?,
            total_cents: row.get(6)?,
            stripe_transaction_id: row.get(7)?,
            referred_by: row.get(8)?,
            referral_event: row.get(9)?,
            status: parse_status(row, 10)?,
            shipping_name: row.get(11)?,
            shipping_address: row.get(12)?,
            purchased_at: row.get(13)?,
            created_at: row.get(14)?,
            updated_at: row.get(15)?,
        })
    }
}
