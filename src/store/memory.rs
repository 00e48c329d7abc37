//! In-memory ledger store
//!
//! Used when no PostgreSQL URL is configured (dev/simulation mode) and by
//! tests. A single async mutex guards all state, so every trait operation is
//! atomic. Nothing survives a process restart.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::{LedgerStore, lease_expired};
use crate::account::{Balance, NewUser, User};
use crate::money::Currency;
use crate::transfer::error::TransferError;
use crate::transfer::state::TransactionStatus;
use crate::transfer::types::{
    Counterparty, Direction, NewTransaction, SettleOutcome, SettlementJob, TransactionId,
    TransactionRecord, TransactionView,
};

#[derive(Default)]
struct State {
    users: BTreeMap<i64, User>,
    balances: HashMap<(i64, Currency), Decimal>,
    transactions: BTreeMap<i64, TransactionRecord>,
    tx_index: HashMap<TransactionId, i64>,
    jobs: HashMap<TransactionId, SettlementJob>,
    next_user_id: i64,
    next_tx_id: i64,
}

impl State {
    fn transaction_mut(
        &mut self,
        tx_id: &TransactionId,
    ) -> Result<&mut TransactionRecord, TransferError> {
        let id = self
            .tx_index
            .get(tx_id)
            .copied()
            .ok_or_else(|| TransferError::not_found(format!("Transaction {tx_id}")))?;
        self.transactions
            .get_mut(&id)
            .ok_or_else(|| TransferError::Internal(format!("dangling index for {tx_id}")))
    }

    fn counterparty(&self, user_id: i64) -> Counterparty {
        match self.users.get(&user_id) {
            Some(u) => Counterparty {
                user_id,
                name: u.name.clone(),
                email: u.email.clone(),
            },
            None => Counterparty {
                user_id,
                name: String::new(),
                email: String::new(),
            },
        }
    }
}

/// Ledger store backed by process memory
pub struct MemoryLedgerStore {
    state: Mutex<State>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_user_id: 1,
                next_tx_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl Default for MemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), TransferError> {
        Ok(())
    }

    async fn insert_user(
        &self,
        user: NewUser,
        balances: &[Balance],
    ) -> Result<User, TransferError> {
        let mut state = self.state.lock().await;

        if state.users.values().any(|u| u.email == user.email) {
            return Err(TransferError::Conflict("Email already registered".into()));
        }

        let user_id = state.next_user_id;
        state.next_user_id += 1;

        let user = User {
            user_id,
            name: user.name,
            email: user.email,
            password_hash: user.password_hash,
            country: user.country,
            wallet_address: user.wallet_address,
            public_key: user.public_key,
            private_key: user.private_key,
            created_at: Utc::now(),
        };
        state.users.insert(user_id, user.clone());
        for b in balances {
            state.balances.insert((user_id, b.currency), b.amount);
        }

        Ok(user)
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, TransferError> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, TransferError> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_other_users(&self, exclude_user_id: i64) -> Result<Vec<User>, TransferError> {
        let state = self.state.lock().await;
        let mut users: Vec<User> = state
            .users
            .values()
            .filter(|u| u.user_id != exclude_user_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.name.cmp(&b.name).then(a.user_id.cmp(&b.user_id)));
        Ok(users)
    }

    async fn get_balances(&self, user_id: i64) -> Result<Vec<Balance>, TransferError> {
        let state = self.state.lock().await;
        let mut balances: Vec<Balance> = state
            .balances
            .iter()
            .filter(|((uid, _), _)| *uid == user_id)
            .map(|((_, ccy), amount)| Balance::new(*ccy, *amount))
            .collect();
        balances.sort_by_key(|b| b.currency.as_str());
        Ok(balances)
    }

    async fn get_balance(
        &self,
        user_id: i64,
        currency: Currency,
    ) -> Result<Option<Decimal>, TransferError> {
        let state = self.state.lock().await;
        Ok(state.balances.get(&(user_id, currency)).copied())
    }

    async fn accept_transfer(
        &self,
        tx: NewTransaction,
        run_at: DateTime<Utc>,
    ) -> Result<TransactionRecord, TransferError> {
        let mut state = self.state.lock().await;

        let total = tx.total_debit();
        let balance = state
            .balances
            .get_mut(&(tx.sender_id, tx.source_currency))
            .ok_or(TransferError::InsufficientFunds)?;
        if *balance < total {
            return Err(TransferError::InsufficientFunds);
        }
        *balance -= total;

        let id = state.next_tx_id;
        state.next_tx_id += 1;

        let record = tx.into_record(id);
        state.tx_index.insert(record.tx_id, id);
        state.transactions.insert(id, record.clone());
        state.jobs.insert(
            record.tx_id,
            SettlementJob {
                tx_id: record.tx_id,
                run_at,
                claimed_by: None,
                claimed_at: None,
                attempts: 0,
            },
        );

        Ok(record)
    }

    async fn get_transaction(
        &self,
        tx_id: &TransactionId,
    ) -> Result<Option<TransactionRecord>, TransferError> {
        let state = self.state.lock().await;
        Ok(state
            .tx_index
            .get(tx_id)
            .and_then(|id| state.transactions.get(id))
            .cloned())
    }

    async fn list_user_transactions(
        &self,
        user_id: i64,
    ) -> Result<Vec<TransactionView>, TransferError> {
        let state = self.state.lock().await;
        let mut views: Vec<TransactionView> = state
            .transactions
            .values()
            .filter(|r| r.involves(user_id))
            .map(|r| {
                let (direction, other) = if r.sender_id == user_id {
                    (Direction::Sent, r.receiver_id)
                } else {
                    (Direction::Received, r.sender_id)
                };
                TransactionView {
                    direction,
                    counterparty: state.counterparty(other),
                    record: r.clone(),
                }
            })
            .collect();
        views.sort_by(|a, b| {
            b.record
                .created_at
                .cmp(&a.record.created_at)
                .then(b.record.id.cmp(&a.record.id))
        });
        Ok(views)
    }

    async fn claim_due_jobs(
        &self,
        worker: &str,
        now: DateTime<Utc>,
        lease: Duration,
        limit: usize,
    ) -> Result<Vec<SettlementJob>, TransferError> {
        let mut state = self.state.lock().await;

        let mut due: Vec<&mut SettlementJob> = state
            .jobs
            .values_mut()
            .filter(|j| j.run_at <= now && lease_expired(j.claimed_at, now, lease))
            .collect();
        due.sort_by_key(|j| (j.run_at, j.tx_id));

        Ok(due
            .into_iter()
            .take(limit)
            .map(|job| {
                job.claimed_by = Some(worker.to_string());
                job.claimed_at = Some(now);
                job.attempts += 1;
                job.clone()
            })
            .collect())
    }

    async fn settle(
        &self,
        tx_id: &TransactionId,
        block_height: i64,
    ) -> Result<SettleOutcome, TransferError> {
        let mut state = self.state.lock().await;

        let record = state.transaction_mut(tx_id)?;
        if !record.status.can_transition_to(TransactionStatus::Settled) {
            let status = record.status;
            state.jobs.remove(tx_id);
            return Ok(SettleOutcome::Skipped(status));
        }
        record.status = TransactionStatus::Settled;
        record.block_height = Some(block_height);
        record.updated_at = Utc::now();
        let record = record.clone();

        *state
            .balances
            .entry((record.receiver_id, record.target_currency))
            .or_insert(Decimal::ZERO) += record.settled_amount;
        state.jobs.remove(tx_id);

        Ok(SettleOutcome::Applied(record))
    }

    async fn fail_and_refund(
        &self,
        tx_id: &TransactionId,
        reason: &str,
    ) -> Result<SettleOutcome, TransferError> {
        let mut state = self.state.lock().await;

        let record = state.transaction_mut(tx_id)?;
        if !record.status.can_transition_to(TransactionStatus::Failed) {
            let status = record.status;
            state.jobs.remove(tx_id);
            return Ok(SettleOutcome::Skipped(status));
        }
        record.status = TransactionStatus::Failed;
        record.failure_reason = Some(reason.to_string());
        record.updated_at = Utc::now();
        let record = record.clone();

        *state
            .balances
            .entry((record.sender_id, record.source_currency))
            .or_insert(Decimal::ZERO) += record.total_debit();
        state.jobs.remove(tx_id);

        Ok(SettleOutcome::Applied(record))
    }

    async fn pending_job_count(&self) -> Result<usize, TransferError> {
        Ok(self.state.lock().await.jobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            country: "US".to_string(),
            wallet_address: "W".repeat(40),
            public_key: "pk".to_string(),
            private_key: "sk".to_string(),
        }
    }

    fn transfer(sender: i64, receiver: i64, amount: Decimal) -> NewTransaction {
        NewTransaction {
            tx_id: TransactionId::new(),
            sender_id: sender,
            receiver_id: receiver,
            amount,
            source_currency: Currency::Usd,
            target_currency: Currency::Eur,
            exchange_rate: Decimal::new(85, 2),
            settled_amount: amount * Decimal::new(85, 2),
            fee: amount * Decimal::new(1, 3),
            gas_used: Decimal::from(10),
            signature: "sig".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn two_users(store: &MemoryLedgerStore, usd: Decimal) -> (i64, i64) {
        let a = store
            .insert_user(
                new_user("Alice", "a@x.io"),
                &[Balance::new(Currency::Usd, usd)],
            )
            .await
            .unwrap();
        let b = store
            .insert_user(new_user("Bob", "b@x.io"), &[])
            .await
            .unwrap();
        (a.user_id, b.user_id)
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryLedgerStore::new();
        store.insert_user(new_user("A", "a@x.io"), &[]).await.unwrap();
        let err = store
            .insert_user(new_user("B", "a@x.io"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_accept_debits_amount_plus_fee() {
        let store = MemoryLedgerStore::new();
        let (a, b) = two_users(&store, Decimal::from(100)).await;

        let record = store
            .accept_transfer(transfer(a, b, Decimal::from(50)), Utc::now())
            .await
            .unwrap();

        assert_eq!(record.status, TransactionStatus::Initiated);
        assert_eq!(
            store.get_balance(a, Currency::Usd).await.unwrap(),
            Some(Decimal::new(4995, 2))
        );
        assert_eq!(store.pending_job_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_accept_rejects_when_fee_not_covered() {
        let store = MemoryLedgerStore::new();
        let (a, b) = two_users(&store, Decimal::from(100)).await;

        let err = store
            .accept_transfer(transfer(a, b, Decimal::from(100)), Utc::now())
            .await
            .unwrap_err();

        assert_eq!(err, TransferError::InsufficientFunds);
        assert_eq!(
            store.get_balance(a, Currency::Usd).await.unwrap(),
            Some(Decimal::from(100))
        );
        assert_eq!(store.pending_job_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_settle_is_idempotent() {
        let store = MemoryLedgerStore::new();
        let (a, b) = two_users(&store, Decimal::from(100)).await;
        let record = store
            .accept_transfer(transfer(a, b, Decimal::from(50)), Utc::now())
            .await
            .unwrap();

        let first = store.settle(&record.tx_id, 42).await.unwrap();
        assert!(matches!(first, SettleOutcome::Applied(ref r) if r.block_height == Some(42)));

        let second = store.settle(&record.tx_id, 43).await.unwrap();
        assert_eq!(second, SettleOutcome::Skipped(TransactionStatus::Settled));

        assert_eq!(
            store.get_balance(b, Currency::Eur).await.unwrap(),
            Some(Decimal::new(4250, 2))
        );
        assert_eq!(store.pending_job_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fail_and_refund_restores_sender() {
        let store = MemoryLedgerStore::new();
        let (a, b) = two_users(&store, Decimal::from(100)).await;
        let record = store
            .accept_transfer(transfer(a, b, Decimal::from(50)), Utc::now())
            .await
            .unwrap();

        store.fail_and_refund(&record.tx_id, "boom").await.unwrap();

        let stored = store.get_transaction(&record.tx_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Failed);
        assert_eq!(stored.failure_reason.as_deref(), Some("boom"));
        assert_eq!(
            store.get_balance(a, Currency::Usd).await.unwrap(),
            Some(Decimal::from(100))
        );
        assert_eq!(store.get_balance(b, Currency::Eur).await.unwrap(), None);

        // terminal: settle must not credit afterwards
        let outcome = store.settle(&record.tx_id, 1).await.unwrap();
        assert_eq!(outcome, SettleOutcome::Skipped(TransactionStatus::Failed));
        assert_eq!(store.get_balance(b, Currency::Eur).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_claim_respects_due_time_and_lease() {
        let store = MemoryLedgerStore::new();
        let (a, b) = two_users(&store, Decimal::from(1000)).await;
        let now = Utc::now();
        let lease = Duration::from_secs(30);

        store
            .accept_transfer(transfer(a, b, Decimal::from(1)), now)
            .await
            .unwrap();
        store
            .accept_transfer(
                transfer(a, b, Decimal::from(2)),
                now + chrono::Duration::seconds(60),
            )
            .await
            .unwrap();

        let claimed = store.claim_due_jobs("w1", now, lease, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].attempts, 1);
        assert_eq!(claimed[0].claimed_by.as_deref(), Some("w1"));

        // still leased to w1
        let again = store.claim_due_jobs("w2", now, lease, 10).await.unwrap();
        assert!(again.is_empty());

        // lease expired: re-claimable
        let later = now + chrono::Duration::seconds(31);
        let reclaimed = store.claim_due_jobs("w2", later, lease, 10).await.unwrap();
        assert_eq!(reclaimed.len(), 1);
        assert_eq!(reclaimed[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_list_transactions_ordering_and_direction() {
        let store = MemoryLedgerStore::new();
        let (a, b) = two_users(&store, Decimal::from(1000)).await;
        let base = Utc::now();

        let mut t1 = transfer(a, b, Decimal::from(1));
        t1.created_at = base;
        let mut t2 = transfer(a, b, Decimal::from(2));
        t2.created_at = base;
        let mut t3 = transfer(a, b, Decimal::from(3));
        t3.created_at = base - chrono::Duration::seconds(5);

        let r1 = store.accept_transfer(t1, base).await.unwrap();
        let r2 = store.accept_transfer(t2, base).await.unwrap();
        let r3 = store.accept_transfer(t3, base).await.unwrap();

        let views = store.list_user_transactions(a).await.unwrap();
        let ids: Vec<i64> = views.iter().map(|v| v.record.id).collect();
        assert_eq!(ids, vec![r2.id, r1.id, r3.id]);
        assert!(views.iter().all(|v| v.direction == Direction::Sent));
        assert_eq!(views[0].counterparty.name, "Bob");

        let received = store.list_user_transactions(b).await.unwrap();
        assert_eq!(received.len(), 3);
        assert!(received.iter().all(|v| v.direction == Direction::Received));

        assert_eq!(store.list_user_transactions(a).await.unwrap(), views);
    }

    #[tokio::test]
    async fn test_list_other_users_sorted_by_name() {
        let store = MemoryLedgerStore::new();
        let me = store
            .insert_user(new_user("Mallory", "m@x.io"), &[])
            .await
            .unwrap();
        store.insert_user(new_user("Zed", "z@x.io"), &[]).await.unwrap();
        store.insert_user(new_user("Carol", "c@x.io"), &[]).await.unwrap();

        let names: Vec<String> = store
            .list_other_users(me.user_id)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Carol", "Zed"]);
    }
}
