//! SQL schema for the Till SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Catalog: read-only for the checkout pipeline.
CREATE TABLE IF NOT EXISTS categories (
    category_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS products (
    product_id  TEXT PRIMARY KEY,
    category_id TEXT REFERENCES categories(category_id),
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    description TEXT,
    base_price  INTEGER NOT NULL CHECK (base_price >= 0),
    image_url   TEXT
);

CREATE TABLE IF NOT EXISTS product_variants (
    variant_id     TEXT PRIMARY KEY,
    product_id     TEXT NOT NULL REFERENCES products(product_id),
    sku            TEXT NOT NULL UNIQUE,
    size           TEXT,
    color          TEXT,
    price_override INTEGER CHECK (price_override IS NULL OR price_override >= 0)
);

-- Local mirror of the onboarding subsystem's activation flags.
CREATE TABLE IF NOT EXISTS accounts (
    account_id              TEXT PRIMARY KEY,
    is_active               INTEGER NOT NULL DEFAULT 0,
    has_accepted_terms      INTEGER NOT NULL DEFAULT 0,
    onboarding_completed_at TEXT,
    email_verified          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS carts (
    cart_id        TEXT PRIMARY KEY,
    session_handle TEXT,
    account_id     TEXT,
    currency       TEXT NOT NULL,
    subtotal       INTEGER NOT NULL DEFAULT 0,
    discount_total INTEGER NOT NULL DEFAULT 0,
    tax_total      INTEGER NOT NULL DEFAULT 0,
    shipping_total INTEGER NOT NULL DEFAULT 0,
    total          INTEGER NOT NULL DEFAULT 0,
    status         TEXT NOT NULL DEFAULT 'active', -- 'active' | 'converted' | 'abandoned'
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

-- At most one addressable cart per session handle.
CREATE UNIQUE INDEX IF NOT EXISTS carts_active_session_idx
    ON carts(session_handle)
    WHERE status = 'active' AND session_handle IS NOT NULL;

CREATE INDEX IF NOT EXISTS carts_account_idx ON carts(account_id, updated_at);

CREATE TABLE IF NOT EXISTS cart_items (
    cart_item_id TEXT PRIMARY KEY,
    cart_id      TEXT NOT NULL REFERENCES carts(cart_id) ON DELETE CASCADE,
    variant_id   TEXT NOT NULL REFERENCES product_variants(variant_id),
    quantity     INTEGER NOT NULL CHECK (quantity BETWEEN 1 AND 10),
    unit_price   INTEGER NOT NULL,
    line_total   INTEGER NOT NULL,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL,
    UNIQUE (cart_id, variant_id)
);

-- Orders are never deleted.
CREATE TABLE IF NOT EXISTS orders (
    order_id           TEXT PRIMARY KEY,
    order_number       TEXT NOT NULL UNIQUE,
    cart_id            TEXT REFERENCES carts(cart_id) ON DELETE SET NULL,
    account_id         TEXT NOT NULL,
    status             TEXT NOT NULL,
    payment_status     TEXT NOT NULL,
    fulfillment_status TEXT NOT NULL,
    subtotal           INTEGER NOT NULL,
    discount_total     INTEGER NOT NULL,
    tax_total          INTEGER NOT NULL,
    shipping_total     INTEGER NOT NULL,
    total              INTEGER NOT NULL,
    currency           TEXT NOT NULL,
    payment_session_id TEXT,
    payment_intent_id  TEXT,
    placed_at          TEXT,
    created_at         TEXT NOT NULL,
    updated_at         TEXT NOT NULL
);

-- At most one pending order per cart.
CREATE UNIQUE INDEX IF NOT EXISTS orders_one_pending_per_cart_idx
    ON orders(cart_id)
    WHERE status = 'pending';

CREATE INDEX IF NOT EXISTS orders_account_idx ON orders(account_id, updated_at);
CREATE INDEX IF NOT EXISTS orders_session_idx ON orders(payment_session_id);

-- Snapshot rows are replaced wholesale on every re-initiated checkout.
CREATE TABLE IF NOT EXISTS order_items (
    order_item_id TEXT PRIMARY KEY,
    order_id      TEXT NOT NULL REFERENCES orders(order_id) ON DELETE CASCADE,
    product_id    TEXT NOT NULL,
    variant_id    TEXT NOT NULL,
    name          TEXT NOT NULL,
    sku           TEXT NOT NULL,
    size          TEXT,
    color         TEXT,
    quantity      INTEGER NOT NULL CHECK (quantity BETWEEN 1 AND 10),
    unit_price    INTEGER NOT NULL,
    line_total    INTEGER NOT NULL,
    snapshot      TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS order_items_order_idx ON order_items(order_id);

PRAGMA user_version = 1;
";
