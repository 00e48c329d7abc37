//! PostgreSQL ledger store
//!
//! Multi-row operations run inside a single database transaction. Status
//! changes use CAS (`WHERE status = INITIATED`) so a terminal transaction is
//! never modified twice.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};

use super::LedgerStore;
use crate::db::schema::USERS_EMAIL_KEY;
use crate::account::{Balance, NewUser, User};
use crate::money::Currency;
use crate::transfer::error::TransferError;
use crate::transfer::state::TransactionStatus;
use crate::transfer::types::{
    Counterparty, Direction, NewTransaction, SettleOutcome, SettlementJob, TransactionId,
    TransactionRecord, TransactionView,
};

const USER_COLUMNS: &str = "user_id, name, email, password_hash, country, wallet_address, \
                            public_key, private_key, created_at";

const TX_COLUMNS: &str = "t.id, t.tx_id, t.sender_id, t.receiver_id, t.amount, \
                          t.source_currency, t.target_currency, t.status, t.exchange_rate, \
                          t.settled_amount, t.fee, t.gas_used, t.signature, t.block_height, \
                          t.failure_reason, t.created_at, t.updated_at";

/// Ledger store backed by PostgreSQL
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &PgRow) -> Result<User, TransferError> {
        Ok(User {
            user_id: row.try_get("user_id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            country: row.try_get("country")?,
            wallet_address: row.try_get("wallet_address")?,
            public_key: row.try_get("public_key")?,
            private_key: row.try_get("private_key")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_record(row: &PgRow) -> Result<TransactionRecord, TransferError> {
        let tx_id: String = row.try_get("tx_id")?;
        let status_id: i16 = row.try_get("status")?;
        let source: String = row.try_get("source_currency")?;
        let target: String = row.try_get("target_currency")?;

        Ok(TransactionRecord {
            id: row.try_get("id")?,
            tx_id: tx_id
                .parse()
                .map_err(|e| TransferError::Internal(format!("bad tx_id {tx_id}: {e}")))?,
            sender_id: row.try_get("sender_id")?,
            receiver_id: row.try_get("receiver_id")?,
            amount: row.try_get("amount")?,
            source_currency: parse_currency(&source)?,
            target_currency: parse_currency(&target)?,
            status: TransactionStatus::from_id(status_id)
                .ok_or_else(|| TransferError::Internal(format!("unknown status {status_id}")))?,
            exchange_rate: row.try_get("exchange_rate")?,
            settled_amount: row.try_get("settled_amount")?,
            fee: row.try_get("fee")?,
            gas_used: row.try_get("gas_used")?,
            signature: row.try_get("signature")?,
            block_height: row.try_get("block_height")?,
            failure_reason: row.try_get("failure_reason")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Lock the transaction row for the rest of `dbtx`
    async fn lock_transaction(
        dbtx: &mut Transaction<'_, Postgres>,
        tx_id: &TransactionId,
    ) -> Result<TransactionRecord, TransferError> {
        let row = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions_tb t WHERE t.tx_id = $1 FOR UPDATE"
        ))
        .bind(tx_id.to_string())
        .fetch_optional(&mut **dbtx)
        .await?
        .ok_or_else(|| TransferError::not_found(format!("Transaction {tx_id}")))?;

        Self::row_to_record(&row)
    }

    async fn delete_job(
        dbtx: &mut Transaction<'_, Postgres>,
        tx_id: &TransactionId,
    ) -> Result<(), TransferError> {
        sqlx::query("DELETE FROM settlement_jobs_tb WHERE tx_id = $1")
            .bind(tx_id.to_string())
            .execute(&mut **dbtx)
            .await?;
        Ok(())
    }

    /// CAS `INITIATED -> next` and return the updated row
    async fn transition_from_initiated(
        dbtx: &mut Transaction<'_, Postgres>,
        tx_id: &TransactionId,
        next: TransactionStatus,
        block_height: Option<i64>,
        failure_reason: Option<&str>,
    ) -> Result<TransactionRecord, TransferError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE transactions_tb t
            SET status = $1, block_height = $2, failure_reason = $3, updated_at = NOW()
            WHERE t.tx_id = $4 AND t.status = $5
            RETURNING {TX_COLUMNS}
            "#
        ))
        .bind(next.id())
        .bind(block_height)
        .bind(failure_reason)
        .bind(tx_id.to_string())
        .bind(TransactionStatus::Initiated.id())
        .fetch_optional(&mut **dbtx)
        .await?
        .ok_or_else(|| {
            TransferError::InvalidStateTransition(format!("{tx_id} is no longer INITIATED"))
        })?;

        Self::row_to_record(&row)
    }

    async fn credit(
        dbtx: &mut Transaction<'_, Postgres>,
        user_id: i64,
        currency: Currency,
        amount: Decimal,
    ) -> Result<(), TransferError> {
        sqlx::query(
            "INSERT INTO balances_tb (user_id, currency, amount)
             VALUES ($1, $2, $3)
             ON CONFLICT (user_id, currency)
             DO UPDATE SET amount = balances_tb.amount + EXCLUDED.amount, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(currency.as_str())
        .bind(amount)
        .execute(&mut **dbtx)
        .await?;
        Ok(())
    }
}

fn parse_currency(code: &str) -> Result<Currency, TransferError> {
    code.parse()
        .map_err(|_| TransferError::Internal(format!("unknown currency in storage: {code}")))
}

/// Unique violation on `constraint` specifically
fn violates_unique(e: &sqlx::Error, constraint: &str) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db) if db.is_unique_violation() && db.constraint() == Some(constraint)
    )
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), TransferError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_user(
        &self,
        user: NewUser,
        balances: &[Balance],
    ) -> Result<User, TransferError> {
        let mut dbtx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users_tb
                (name, email, password_hash, country, wallet_address, public_key, private_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.country)
        .bind(&user.wallet_address)
        .bind(&user.public_key)
        .bind(&user.private_key)
        .fetch_one(&mut *dbtx)
        .await
        .map_err(|e| {
            if violates_unique(&e, USERS_EMAIL_KEY) {
                TransferError::Conflict("Email already registered".into())
            } else {
                TransferError::from(e)
            }
        })?;
        let created = Self::row_to_user(&row)?;

        for b in balances {
            sqlx::query("INSERT INTO balances_tb (user_id, currency, amount) VALUES ($1, $2, $3)")
                .bind(created.user_id)
                .bind(b.currency.as_str())
                .bind(b.amount)
                .execute(&mut *dbtx)
                .await?;
        }

        dbtx.commit().await?;
        Ok(created)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, TransferError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users_tb WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, TransferError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users_tb WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn list_other_users(&self, exclude_user_id: i64) -> Result<Vec<User>, TransferError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users_tb WHERE user_id <> $1 ORDER BY name, user_id"
        ))
        .bind(exclude_user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_user).collect()
    }

    async fn get_balances(&self, user_id: i64) -> Result<Vec<Balance>, TransferError> {
        let rows = sqlx::query(
            "SELECT currency, amount FROM balances_tb WHERE user_id = $1 ORDER BY currency",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<Balance, TransferError> {
                let code: String = row.try_get("currency")?;
                Ok(Balance::new(parse_currency(&code)?, row.try_get("amount")?))
            })
            .collect()
    }

    async fn get_balance(
        &self,
        user_id: i64,
        currency: Currency,
    ) -> Result<Option<Decimal>, TransferError> {
        let amount = sqlx::query_scalar::<_, Decimal>(
            "SELECT amount FROM balances_tb WHERE user_id = $1 AND currency = $2",
        )
        .bind(user_id)
        .bind(currency.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(amount)
    }

    async fn accept_transfer(
        &self,
        tx: NewTransaction,
        run_at: DateTime<Utc>,
    ) -> Result<TransactionRecord, TransferError> {
        let mut dbtx = self.pool.begin().await?;

        // Conditional decrement: the balance never goes below zero
        let debited = sqlx::query(
            "UPDATE balances_tb SET amount = amount - $1, updated_at = NOW()
             WHERE user_id = $2 AND currency = $3 AND amount >= $1",
        )
        .bind(tx.total_debit())
        .bind(tx.sender_id)
        .bind(tx.source_currency.as_str())
        .execute(&mut *dbtx)
        .await?;

        if debited.rows_affected() == 0 {
            return Err(TransferError::InsufficientFunds);
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO transactions_tb
                (tx_id, sender_id, receiver_id, amount, source_currency, target_currency,
                 status, exchange_rate, settled_amount, fee, gas_used, signature,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING id
            "#,
        )
        .bind(tx.tx_id.to_string())
        .bind(tx.sender_id)
        .bind(tx.receiver_id)
        .bind(tx.amount)
        .bind(tx.source_currency.as_str())
        .bind(tx.target_currency.as_str())
        .bind(TransactionStatus::Initiated.id())
        .bind(tx.exchange_rate)
        .bind(tx.settled_amount)
        .bind(tx.fee)
        .bind(tx.gas_used)
        .bind(&tx.signature)
        .bind(tx.created_at)
        .fetch_one(&mut *dbtx)
        .await?;

        sqlx::query("INSERT INTO settlement_jobs_tb (tx_id, run_at) VALUES ($1, $2)")
            .bind(tx.tx_id.to_string())
            .bind(run_at)
            .execute(&mut *dbtx)
            .await?;

        dbtx.commit().await?;
        Ok(tx.into_record(id))
    }

    async fn get_transaction(
        &self,
        tx_id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, TransferError> {
        let row = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions_tb t WHERE t.tx_id = $1"
        ))
        .bind(tx_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn list_user_transactions(
        &self,
        user_id: i64,
    ) -> Result<Vec<TransactionView>, TransferError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TX_COLUMNS},
                   u.user_id AS cp_user_id, u.name AS cp_name, u.email AS cp_email
            FROM transactions_tb t
            JOIN users_tb u ON u.user_id =
                CASE WHEN t.sender_id = $1 THEN t.receiver_id ELSE t.sender_id END
            WHERE t.sender_id = $1 OR t.receiver_id = $1
            ORDER BY t.created_at DESC, t.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<TransactionView, TransferError> {
                let record = Self::row_to_record(row)?;
                let direction = if record.sender_id == user_id {
                    Direction::Sent
                } else {
                    Direction::Received
                };
                Ok(TransactionView {
                    direction,
                    counterparty: Counterparty {
                        user_id: row.try_get("cp_user_id")?,
                        name: row.try_get("cp_name")?,
                        email: row.try_get("cp_email")?,
                    },
                    record,
                })
            })
            .collect()
    }

    async fn claim_due_jobs(
        &self,
        worker: &str,
        now: DateTime<Utc>,
        lease: Duration,
        limit: usize,
    ) -> Result<Vec<SettlementJob>, TransferError> {
        let rows = sqlx::query(
            r#"
            UPDATE settlement_jobs_tb
            SET claimed_by = $1, claimed_at = $2, attempts = attempts + 1
            WHERE tx_id IN (
                SELECT tx_id FROM settlement_jobs_tb
                WHERE run_at <= $2
                  AND (claimed_at IS NULL OR claimed_at <= $2 - make_interval(secs => $3))
                ORDER BY run_at, tx_id
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING tx_id, run_at, claimed_by, claimed_at, attempts
            "#,
        )
        .bind(worker)
        .bind(now)
        .bind(lease.as_secs_f64())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut jobs = rows
            .iter()
            .map(|row| -> Result<SettlementJob, TransferError> {
                let tx_id: String = row.try_get("tx_id")?;
                Ok(SettlementJob {
                    tx_id: tx_id
                        .parse()
                        .map_err(|e| TransferError::Internal(format!("bad tx_id {tx_id}: {e}")))?,
                    run_at: row.try_get("run_at")?,
                    claimed_by: row.try_get("claimed_by")?,
                    claimed_at: row.try_get("claimed_at")?,
                    attempts: row.try_get("attempts")?,
                })
            })
            .collect::<Result<Vec<_>, TransferError>>()?;

        // RETURNING does not preserve the subquery order
        jobs.sort_by_key(|j| (j.run_at, j.tx_id));
        Ok(jobs)
    }

    async fn settle(
        &self,
        tx_id: &TransactionId,
        block_height: i64,
    ) -> Result<SettleOutcome, TransferError> {
        let mut dbtx = self.pool.begin().await?;

        let current = Self::lock_transaction(&mut dbtx, tx_id).await?;
        if !current.status.can_transition_to(TransactionStatus::Settled) {
            Self::delete_job(&mut dbtx, tx_id).await?;
            dbtx.commit().await?;
            return Ok(SettleOutcome::Skipped(current.status));
        }

        Self::credit(
            &mut dbtx,
            current.receiver_id,
            current.target_currency,
            current.settled_amount,
        )
        .await?;
        let updated = Self::transition_from_initiated(
            &mut dbtx,
            tx_id,
            TransactionStatus::Settled,
            Some(block_height),
            None,
        )
        .await?;
        Self::delete_job(&mut dbtx, tx_id).await?;

        dbtx.commit().await?;
        Ok(SettleOutcome::Applied(updated))
    }

    async fn fail_and_refund(
        &self,
        tx_id: &TransactionId,
        reason: &str,
    ) -> Result<SettleOutcome, TransferError> {
        let mut dbtx = self.pool.begin().await?;

        let current = Self::lock_transaction(&mut dbtx, tx_id).await?;
        if !current.status.can_transition_to(TransactionStatus::Failed) {
            Self::delete_job(&mut dbtx, tx_id).await?;
            dbtx.commit().await?;
            return Ok(SettleOutcome::Skipped(current.status));
        }

        Self::credit(
            &mut dbtx,
            current.sender_id,
            current.source_currency,
            current.total_debit(),
        )
        .await?;
        let updated = Self::transition_from_initiated(
            &mut dbtx,
            tx_id,
            TransactionStatus::Failed,
            None,
            Some(reason),
        )
        .await?;
        Self::delete_job(&mut dbtx, tx_id).await?;

        dbtx.commit().await?;
        Ok(SettleOutcome::Applied(updated))
    }

    async fn pending_job_count(&self) -> Result<usize, TransferError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM settlement_jobs_tb")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
