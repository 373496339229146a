use chrono::Utc;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::*;

use super::from_row::{
    query_all, query_one, ORDER_COLS, PRODUCT_COLS, USER_COLS, USER_ORDER_COLS,
};

fn now() -> i64 {
    Utc::now().timestamp()
}

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

// ============ Users ============

pub fn create_user(conn: &Connection, input: &CreateUser) -> Result<User> {
    let now = now();
    let email = input.email.trim().to_lowercase();

    conn.execute(
        "INSERT INTO users (id, email, name, stripe_account_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![&input.id, &email, &input.name, &input.stripe_account_id, now, now],
    )?;

    Ok(User {
        id: input.id.clone(),
        email,
        name: input.name.clone(),
        stripe_account_id: input.stripe_account_id.clone(),
        checkout_name: None,
        checkout_email: None,
        checkout_phone: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>> {
    query_one(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLS),
        &[&id],
    )
}

/// Merge the submitted checkout contact fields onto the user's profile.
/// Fields the buyer did not submit keep their stored value; a missing
/// user row is created as a stub so the profile survives either way.
pub fn upsert_checkout_profile(conn: &Connection, uid: &str, info: &CustomerInfo) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, email, name, checkout_name, checkout_email, checkout_phone, created_at, updated_at)
         VALUES (?1, '', '', ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(id) DO UPDATE SET
             checkout_name = COALESCE(excluded.checkout_name, checkout_name),
             checkout_email = COALESCE(excluded.checkout_email, checkout_email),
             checkout_phone = COALESCE(excluded.checkout_phone, checkout_phone),
             updated_at = excluded.updated_at",
        params![uid, &info.name, &info.email, &info.phone, now()],
    )?;
    Ok(())
}

// ============ Products ============

pub fn create_product(conn: &Connection, input: &CreateProduct) -> Result<Product> {
    let id = gen_id();
    let now = now();

    conn.execute(
        "INSERT INTO products (id, name, product_type, price_cents, sale_price_cents, on_sale, image_url, creator_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            &id,
            &input.name,
            &input.product_type,
            &input.price_cents,
            &input.sale_price_cents,
            input.on_sale as i64,
            &input.image_url,
            &input.creator_id,
            now,
        ],
    )?;

    Ok(Product {
        id,
        name: input.name.clone(),
        product_type: input.product_type.clone(),
        price_cents: input.price_cents,
        sale_price_cents: input.sale_price_cents,
        on_sale: input.on_sale,
        image_url: input.image_url.clone(),
        creator_id: input.creator_id.clone(),
        created_at: now,
        updated_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

/// Validate a client cart against the authoritative product records.
///
/// Unit prices come from the product rows (sale price when active), the
/// creator's connected payout account is resolved from the users table.
/// Unknown product ids fail the whole cart.
pub fn resolve_cart_items(conn: &Connection, cart: &[CartLine]) -> Result<Vec<ValidatedItem>> {
    let mut items = Vec::with_capacity(cart.len());

    for line in cart {
        let product = get_product_by_id(conn, &line.id)?.ok_or_else(|| {
            AppError::NotFound(format!("Product not found: {}", line.id))
        })?;

        let unit_price_cents = product.unit_price_cents()?;

        let stripe_account_id = match &product.creator_id {
            Some(creator_id) => {
                get_user_by_id(conn, creator_id)?.and_then(|u| u.stripe_account_id)
            }
            None => None,
        };

        items.push(ValidatedItem {
            id: product.id.clone(),
            name: product.name.clone(),
            image_url: product.image_or_placeholder(),
            product_type: product.product_type.clone(),
            unit_price_cents,
            quantity: line.effective_quantity(),
            creator_id: product.creator_id.clone(),
            stripe_account_id,
        });
    }

    Ok(items)
}

// ============ Commission rates ============

pub fn set_commission_rate(conn: &Connection, product_type: &str, rate: f64) -> Result<()> {
    conn.execute(
        "INSERT INTO commission_rates (product_type, rate) VALUES (?1, ?2)
         ON CONFLICT(product_type) DO UPDATE SET rate = excluded.rate",
        params![product_type, rate],
    )?;
    Ok(())
}

pub fn get_commission_rates(conn: &Connection) -> Result<CommissionRates> {
    let mut stmt = conn.prepare("SELECT product_type, rate FROM commission_rates")?;
    let pairs = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(CommissionRates::from_pairs(pairs))
}

// ============ Orders ============

fn write_order(conn: &Connection, sql: &str, owner: &str, order: &Order) -> Result<()> {
    let products_json = serde_json::to_string(&order.products)?;
    conn.execute(
        sql,
        params![
            owner,
            &order.invoice_number,
            &order.user_email,
            &products_json,
            order.subtotal_cents,
            order.gst_cents,
            order.total_cents,
            &order.stripe_transaction_id,
            &order.referred_by,
            &order.referral_event,
            order.status.as_str(),
            &order.shipping_name,
            &order.shipping_address,
            &order.purchased_at,
            now(),
        ],
    )?;
    Ok(())
}

/// Write (or fully overwrite) the global order record. Whole-row
/// replacement, matching the confirmation path's unconditional set.
pub fn put_global_order(conn: &Connection, order: &Order) -> Result<()> {
    write_order(
        conn,
        "INSERT OR REPLACE INTO orders
             (user_id, invoice_number, user_email, products, subtotal_cents, gst_cents, total_cents,
              stripe_transaction_id, referred_by, referral_event, status, shipping_name,
              shipping_address, purchased_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
        order.user_id.as_deref().unwrap_or_default(),
        order,
    )
}

/// Write (or fully overwrite) the buyer's personal copy of the order.
/// Deliberately a separate statement from [`put_global_order`]; the two
/// writes are not wrapped in one transaction.
pub fn put_user_order(conn: &Connection, uid: &str, order: &Order) -> Result<()> {
    write_order(
        conn,
        "INSERT OR REPLACE INTO user_orders
             (user_id, invoice_number, user_email, products, subtotal_cents, gst_cents, total_cents,
              stripe_transaction_id, referred_by, referral_event, status, shipping_name,
              shipping_address, purchased_at, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)",
        uid,
        order,
    )
}

pub fn get_order(conn: &Connection, invoice_number: &str) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!("SELECT {} FROM orders WHERE invoice_number = ?1", ORDER_COLS),
        &[&invoice_number],
    )
}

pub fn get_user_order(
    conn: &Connection,
    uid: &str,
    invoice_number: &str,
) -> Result<Option<Order>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM user_orders WHERE user_id = ?1 AND invoice_number = ?2",
            USER_ORDER_COLS
        ),
        &[&uid, &invoice_number],
    )
}

pub fn list_user_orders(conn: &Connection, uid: &str) -> Result<Vec<Order>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM user_orders WHERE user_id = ?1 ORDER BY created_at DESC",
            USER_ORDER_COLS
        ),
        &[&uid],
    )
}

/// Field-level merge of the webhook's settlement report into the global
/// order record. Creates a minimal row when the confirmation path has
/// not run yet; otherwise updates only the webhook-owned fields and
/// leaves the derived line items and totals alone.
pub fn apply_webhook_checkout(
    conn: &Connection,
    invoice_number: &str,
    user_id: Option<&str>,
    user_email: Option<&str>,
    shipping_name: Option<&str>,
    shipping_address: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO orders (invoice_number, user_id, user_email, status, shipping_name, shipping_address, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
         ON CONFLICT(invoice_number) DO UPDATE SET
             user_id = COALESCE(excluded.user_id, user_id),
             user_email = COALESCE(excluded.user_email, user_email),
             status = excluded.status,
             shipping_name = excluded.shipping_name,
             shipping_address = excluded.shipping_address,
             updated_at = excluded.updated_at",
        params![
            invoice_number,
            user_id,
            user_email,
            OrderStatus::Paid.as_str(),
            shipping_name,
            shipping_address,
            now(),
        ],
    )?;
    Ok(())
}

// ============ Error log ============

/// Append a structured error row. Call sites treat failures here as
/// best-effort and log them instead of propagating.
pub fn log_error(
    conn: &Connection,
    source: &str,
    message: &str,
    user_id: Option<&str>,
    metadata: Option<&serde_json::Value>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO logs (id, log_type, message, source, metadata, user_id, created_at)
         VALUES (?1, 'error', ?2, ?3, ?4, ?5, ?6)",
        params![
            gen_id(),
            message,
            source,
            metadata.map(|m| m.to_string()),
            user_id,
            now(),
        ],
    )?;
    Ok(())
}
