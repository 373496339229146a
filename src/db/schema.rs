use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- Users (buyers and product creators)
        -- checkout_* columns hold the saved checkout contact profile,
        -- merged on every checkout attempt.
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            name TEXT NOT NULL,
            stripe_account_id TEXT,
            checkout_name TEXT,
            checkout_email TEXT,
            checkout_phone TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);

        -- Product catalog. price/sale_price are cents; on_sale selects
        -- which of the two is charged.
        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            product_type TEXT NOT NULL DEFAULT 'tool',
            price_cents INTEGER,
            sale_price_cents INTEGER,
            on_sale INTEGER NOT NULL DEFAULT 0,
            image_url TEXT,
            creator_id TEXT REFERENCES users(id),
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_products_creator ON products(creator_id);

        -- Per-product-type affiliate commission rates.
        CREATE TABLE IF NOT EXISTS commission_rates (
            product_type TEXT PRIMARY KEY,
            rate REAL NOT NULL
        );

        -- Global order collection (admin-wide queries).
        -- invoice_number is the Stripe checkout session id. Monetary
        -- fields are integer cents. products is a JSON array of resolved
        -- line items. Rows written by the webhook path alone carry the
        -- column defaults for the confirmation-path fields.
        CREATE TABLE IF NOT EXISTS orders (
            invoice_number TEXT PRIMARY KEY,
            user_id TEXT,
            user_email TEXT,
            products TEXT NOT NULL DEFAULT '[]',
            subtotal_cents INTEGER NOT NULL DEFAULT 0,
            gst_cents INTEGER NOT NULL DEFAULT 0,
            total_cents INTEGER NOT NULL DEFAULT 0,
            stripe_transaction_id TEXT,
            referred_by TEXT,
            referral_event TEXT,
            status TEXT NOT NULL DEFAULT 'Pending',
            shipping_name TEXT,
            shipping_address TEXT,
            purchased_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_orders_user ON orders(user_id);

        -- Per-buyer order copy, denormalized from the global collection.
        -- Written alongside orders with the same invoice number and
        -- totals; nothing keeps the two in sync afterwards.
        CREATE TABLE IF NOT EXISTS user_orders (
            user_id TEXT NOT NULL,
            invoice_number TEXT NOT NULL,
            user_email TEXT,
            products TEXT NOT NULL DEFAULT '[]',
            subtotal_cents INTEGER NOT NULL DEFAULT 0,
            gst_cents INTEGER NOT NULL DEFAULT 0,
            total_cents INTEGER NOT NULL DEFAULT 0,
            stripe_transaction_id TEXT,
            referred_by TEXT,
            referral_event TEXT,
            status TEXT NOT NULL DEFAULT 'Pending',
            shipping_name TEXT,
            shipping_address TEXT,
            purchased_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, invoice_number)
        );

        -- Server-side error log (the handler-boundary failure sink).
        CREATE TABLE IF NOT EXISTS logs (
            id TEXT PRIMARY KEY,
            log_type TEXT NOT NULL DEFAULT 'error',
            message TEXT NOT NULL,
            source TEXT NOT NULL,
            metadata TEXT,
            user_id TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_logs_source ON logs(source);
        "#,
    )
}
