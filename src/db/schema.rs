//! PostgreSQL schema
//!
//! Applied idempotently at startup. Amount columns are unconstrained NUMERIC
//! so converted amounts and fees keep every digit the computation produced.

/// Unique constraint on `users_tb.email`
pub const USERS_EMAIL_KEY: &str = "users_tb_email_key";

/// DDL statements, executed in order
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users_tb (
        user_id         BIGSERIAL PRIMARY KEY,
        name            VARCHAR(128) NOT NULL,
        email           VARCHAR(255) NOT NULL,
        password_hash   TEXT NOT NULL,
        country         VARCHAR(64) NOT NULL,
        wallet_address  VARCHAR(40) NOT NULL UNIQUE,
        public_key      TEXT NOT NULL,
        private_key     TEXT NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT users_tb_email_key UNIQUE (email)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS balances_tb (
        user_id     BIGINT NOT NULL REFERENCES users_tb(user_id),
        currency    VARCHAR(3) NOT NULL,
        amount      NUMERIC NOT NULL CHECK (amount >= 0),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (user_id, currency)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transactions_tb (
        id               BIGSERIAL PRIMARY KEY,
        tx_id            VARCHAR(64) NOT NULL UNIQUE,
        sender_id        BIGINT NOT NULL REFERENCES users_tb(user_id),
        receiver_id      BIGINT NOT NULL REFERENCES users_tb(user_id),
        amount           NUMERIC NOT NULL CHECK (amount > 0),
        source_currency  VARCHAR(3) NOT NULL,
        target_currency  VARCHAR(3) NOT NULL,
        status           SMALLINT NOT NULL,
        exchange_rate    NUMERIC NOT NULL,
        settled_amount   NUMERIC NOT NULL,
        fee              NUMERIC NOT NULL,
        gas_used         NUMERIC NOT NULL,
        signature        TEXT NOT NULL,
        block_height     BIGINT,
        failure_reason   TEXT,
        created_at       TIMESTAMPTZ NOT NULL,
        updated_at       TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_transactions_sender ON transactions_tb (sender_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_transactions_receiver ON transactions_tb (receiver_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS settlement_jobs_tb (
        tx_id       VARCHAR(64) PRIMARY KEY REFERENCES transactions_tb(tx_id),
        run_at      TIMESTAMPTZ NOT NULL,
        claimed_by  VARCHAR(64),
        claimed_at  TIMESTAMPTZ,
        attempts    INT NOT NULL DEFAULT 0
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_settlement_jobs_run_at ON settlement_jobs_tb (run_at)",
];
