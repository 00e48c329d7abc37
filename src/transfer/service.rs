//! Transfer Service
//!
//! Accepts transfer requests and serves balance, directory and transaction
//! queries. Acceptance is synchronous; settlement happens later on a worker.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::cache::TransactionViewCache;
use super::error::TransferError;
use super::types::{
    CreateTransactionRequest, NewTransaction, TransactionId, TransactionRecord, TransactionView,
};
use crate::account::{Balance, DirectoryEntry, wallet};
use crate::fx::{self, Quote};
use crate::money::check_amount;
use crate::store::LedgerStore;

/// Default delay between acceptance and settlement
pub const DEFAULT_SETTLEMENT_DELAY: Duration = Duration::from_secs(3);

/// Normalize an email for lookup and storage
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Canonical byte string signed by the sender's wallet key
pub fn signing_payload(tx: &NewTransaction) -> String {
    format!(
        "{}|{}|{}|{}|{}|{}|{}",
        tx.tx_id,
        tx.sender_id,
        tx.receiver_id,
        tx.amount,
        tx.source_currency,
        tx.target_currency,
        tx.created_at.timestamp_millis()
    )
}

pub struct TransferService {
    store: Arc<dyn LedgerStore>,
    cache: Arc<TransactionViewCache>,
    settlement_delay: Duration,
}

impl TransferService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        cache: Arc<TransactionViewCache>,
        settlement_delay: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            settlement_delay,
        }
    }

    /// Accept a transfer from `sender_id`
    ///
    /// On success the sender has been debited `amount + fee`, the record is
    /// INITIATED and a settlement job is due after the configured delay.
    pub async fn create_transaction(
        &self,
        sender_id: i64,
        req: CreateTransactionRequest,
    ) -> Result<TransactionRecord, TransferError> {
        let amount = check_amount(req.amount.inner())?;
        let (source, target) = fx::resolve_pair(&req.source_currency, &req.target_currency)?;

        let sender = self
            .store
            .get_user(sender_id)
            .await?
            .ok_or(TransferError::NotAuthenticated)?;

        let receiver = self
            .store
            .get_user_by_email(&normalize_email(&req.receiver_email))
            .await?
            .ok_or_else(|| TransferError::not_found("Receiver"))?;

        if receiver.user_id == sender.user_id {
            return Err(TransferError::validation("Cannot send money to yourself"));
        }

        // Fast pre-check; the store repeats it atomically including the fee
        let available = self
            .store
            .get_balance(sender.user_id, source)
            .await?
            .unwrap_or(Decimal::ZERO);
        if amount > available {
            debug!(
                sender_id,
                currency = %source,
                %amount,
                %available,
                "Rejecting transfer: insufficient balance"
            );
            return Err(TransferError::InsufficientFunds);
        }

        let quote = Quote::compute(amount, source, target);
        let mut tx = NewTransaction {
            tx_id: TransactionId::new(),
            sender_id: sender.user_id,
            receiver_id: receiver.user_id,
            amount,
            source_currency: source,
            target_currency: target,
            exchange_rate: quote.exchange_rate,
            settled_amount: quote.settled_amount,
            fee: quote.fee,
            gas_used: quote.gas_used,
            signature: String::new(),
            created_at: Utc::now(),
        };
        tx.signature = wallet::sign(&sender.private_key, signing_payload(&tx).as_bytes())?;

        let delay = chrono::Duration::from_std(self.settlement_delay)
            .map_err(|e| TransferError::Internal(format!("settlement delay out of range: {e}")))?;
        let run_at = tx.created_at + delay;

        let record = match self.store.accept_transfer(tx, run_at).await {
            Ok(r) => r,
            Err(e) => {
                if e == TransferError::InsufficientFunds {
                    warn!(
                        sender_id,
                        currency = %source,
                        %amount,
                        "Transfer rejected at reservation: balance does not cover amount + fee"
                    );
                }
                return Err(e);
            }
        };

        self.cache
            .invalidate(&[record.sender_id, record.receiver_id])
            .await;

        info!(
            tx_id = %record.tx_id,
            sender_id = record.sender_id,
            receiver_id = record.receiver_id,
            amount = %record.amount,
            source = %record.source_currency,
            target = %record.target_currency,
            settled_amount = %record.settled_amount,
            fee = %record.fee,
            run_at = %run_at,
            "Transfer accepted"
        );

        Ok(record)
    }

    /// Sent and received transactions of a user, newest first
    pub async fn list_transactions(
        &self,
        user_id: i64,
    ) -> Result<Arc<Vec<TransactionView>>, TransferError> {
        if let Some(hit) = self.cache.get(user_id).await {
            return Ok(hit);
        }
        // Taken before the read so a concurrent invalidation wins over this fill
        let generation = self.cache.generation(user_id).await;
        let views = Arc::new(self.store.list_user_transactions(user_id).await?);
        self.cache.put(user_id, generation, Arc::clone(&views)).await;
        Ok(views)
    }

    /// One transaction, visible only to its sender or receiver
    pub async fn get_transaction(
        &self,
        user_id: i64,
        tx_id: &str,
    ) -> Result<TransactionRecord, TransferError> {
        let not_found = || TransferError::not_found("Transaction");

        let id: TransactionId = tx_id.parse().map_err(|_| not_found())?;
        let record = self.store.get_transaction(&id).await?.ok_or_else(not_found)?;

        if !record.involves(user_id) {
            return Err(not_found());
        }
        Ok(record)
    }

    /// All balances of a user, ordered by currency
    pub async fn get_balances(&self, user_id: i64) -> Result<Vec<Balance>, TransferError> {
        self.store.get_balances(user_id).await
    }

    /// Every other registered user, sorted by name
    pub async fn list_users(&self, user_id: i64) -> Result<Vec<DirectoryEntry>, TransferError> {
        let users = self.store.list_other_users(user_id).await?;
        Ok(users.iter().map(|u| u.directory_entry()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::account::{NewUser, User};
    use crate::money::{Currency, StrictDecimal};
    use crate::store::MemoryLedgerStore;
    use crate::transfer::settlement::tests::FlakyStore;
    use crate::transfer::state::TransactionStatus;
    use crate::transfer::types::Direction;

    async fn add_user(
        store: &MemoryLedgerStore,
        name: &str,
        email: &str,
        balances: &[Balance],
    ) -> User {
        let w = wallet::Wallet::generate();
        store
            .insert_user(
                NewUser {
                    name: name.to_string(),
                    email: email.to_string(),
                    password_hash: "hash".to_string(),
                    country: "US".to_string(),
                    wallet_address: w.address,
                    public_key: w.public_key,
                    private_key: w.private_key,
                },
                balances,
            )
            .await
            .unwrap()
    }

    fn request(email: &str, amount: Decimal, from: &str, to: &str) -> CreateTransactionRequest {
        CreateTransactionRequest {
            receiver_email: email.to_string(),
            amount: StrictDecimal::from_decimal(amount),
            source_currency: from.to_string(),
            target_currency: to.to_string(),
        }
    }

    async fn setup(usd: Decimal) -> (Arc<MemoryLedgerStore>, TransferService, User, User) {
        let store = Arc::new(MemoryLedgerStore::new());
        let alice = add_user(
            &store,
            "Alice",
            "alice@example.com",
            &[Balance::new(Currency::Usd, usd)],
        )
        .await;
        let bob = add_user(&store, "Bob", "bob@example.com", &[]).await;
        let service = TransferService::new(
            store.clone(),
            Arc::new(TransactionViewCache::new(60)),
            DEFAULT_SETTLEMENT_DELAY,
        );
        (store, service, alice, bob)
    }

    #[tokio::test]
    async fn test_create_transaction_quotes_and_debits() {
        let (store, service, alice, bob) = setup(Decimal::from(100)).await;

        let record = service
            .create_transaction(
                alice.user_id,
                request("Bob@Example.com ", Decimal::from(50), "usd", "EUR"),
            )
            .await
            .unwrap();

        assert_eq!(record.status, TransactionStatus::Initiated);
        assert_eq!(record.receiver_id, bob.user_id);
        assert_eq!(record.settled_amount, Decimal::new(4250, 2));
        assert_eq!(record.fee, Decimal::new(5, 2));
        assert_eq!(record.gas_used, Decimal::from(10));
        assert!(record.tx_id.to_string().starts_with("tx_"));
        assert!(record.block_height.is_none());
        assert_eq!(
            store.get_balance(alice.user_id, Currency::Usd).await.unwrap(),
            Some(Decimal::new(4995, 2))
        );
        assert_eq!(store.pending_job_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_signature_verifies_with_sender_key() {
        let (store, service, alice, _) = setup(Decimal::from(100)).await;
        let record = service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::from(1), "USD", "GBP"),
            )
            .await
            .unwrap();

        let signed = NewTransaction {
            tx_id: record.tx_id,
            sender_id: record.sender_id,
            receiver_id: record.receiver_id,
            amount: record.amount,
            source_currency: record.source_currency,
            target_currency: record.target_currency,
            exchange_rate: record.exchange_rate,
            settled_amount: record.settled_amount,
            fee: record.fee,
            gas_used: record.gas_used,
            signature: String::new(),
            created_at: record.created_at,
        };
        let payload = signing_payload(&signed);
        let sender = store.get_user(alice.user_id).await.unwrap().unwrap();
        assert!(wallet::verify(
            &sender.public_key,
            payload.as_bytes(),
            &record.signature
        ));
    }

    #[tokio::test]
    async fn test_insufficient_balance() {
        let (store, service, alice, _) = setup(Decimal::from(10)).await;

        let err = service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::from(20), "USD", "EUR"),
            )
            .await
            .unwrap_err();

        assert_eq!(err, TransferError::InsufficientFunds);
        assert_eq!(err.to_string(), "Insufficient balance");
        assert!(store.list_user_transactions(alice.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fee_must_be_covered() {
        let (_, service, alice, _) = setup(Decimal::from(100)).await;
        let err = service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::from(100), "USD", "EUR"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_missing_source_balance_row() {
        let (_, service, alice, _) = setup(Decimal::from(100)).await;
        let err = service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::from(1), "JPY", "USD"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::InsufficientFunds);
    }

    #[tokio::test]
    async fn test_unknown_receiver() {
        let (_, service, alice, _) = setup(Decimal::from(100)).await;
        let err = service
            .create_transaction(
                alice.user_id,
                request("nobody@example.com", Decimal::from(1), "USD", "EUR"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Receiver not found");
    }

    #[tokio::test]
    async fn test_unknown_sender_is_not_authenticated() {
        let (_, service, _, _) = setup(Decimal::from(100)).await;
        let err = service
            .create_transaction(
                999,
                request("bob@example.com", Decimal::from(1), "USD", "EUR"),
            )
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_rejects_self_transfer_and_bad_inputs() {
        let (_, service, alice, _) = setup(Decimal::from(100)).await;

        let err = service
            .create_transaction(
                alice.user_id,
                request("alice@example.com", Decimal::from(1), "USD", "EUR"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::ValidationFailure(_)));

        let err = service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::from(1), "USD", "CHF"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::UnsupportedCurrencyPair { .. }));

        let err = service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::ZERO, "USD", "EUR"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn test_listing_is_cached_and_invalidated() {
        let (_, service, alice, bob) = setup(Decimal::from(100)).await;

        assert!(service.list_transactions(alice.user_id).await.unwrap().is_empty());
        assert!(service.list_transactions(bob.user_id).await.unwrap().is_empty());

        service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::from(5), "USD", "EUR"),
            )
            .await
            .unwrap();

        let sent = service.list_transactions(alice.user_id).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].direction, Direction::Sent);
        assert_eq!(sent[0].counterparty.email, "bob@example.com");

        let received = service.list_transactions(bob.user_id).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].direction, Direction::Received);
    }

    #[tokio::test]
    async fn test_listing_read_before_accept_is_not_cached() {
        let store = Arc::new(FlakyStore::new());
        let alice = add_user(
            &store.inner,
            "Alice",
            "alice@example.com",
            &[Balance::new(Currency::Usd, Decimal::from(100))],
        )
        .await;
        add_user(&store.inner, "Bob", "bob@example.com", &[]).await;
        let service = Arc::new(TransferService::new(
            store.clone(),
            Arc::new(TransactionViewCache::new(60)),
            DEFAULT_SETTLEMENT_DELAY,
        ));

        // Reader misses the cache and reads an empty listing, then stalls
        store.pause_listing.store(true, Ordering::SeqCst);
        let reader = {
            let service = Arc::clone(&service);
            let user_id = alice.user_id;
            tokio::spawn(async move { service.list_transactions(user_id).await.unwrap().len() })
        };
        store.listing_read.notified().await;
        store.pause_listing.store(false, Ordering::SeqCst);

        service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::from(5), "USD", "EUR"),
            )
            .await
            .unwrap();
        store.resume_listing.notify_one();

        assert_eq!(reader.await.unwrap(), 0);
        assert_eq!(service.list_transactions(alice.user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_transaction_visibility() {
        let (store, service, alice, bob) = setup(Decimal::from(100)).await;
        let carol = add_user(&store, "Carol", "carol@example.com", &[]).await;

        let record = service
            .create_transaction(
                alice.user_id,
                request("bob@example.com", Decimal::from(5), "USD", "EUR"),
            )
            .await
            .unwrap();
        let id = record.tx_id.to_string();

        assert_eq!(service.get_transaction(alice.user_id, &id).await.unwrap(), record);
        assert_eq!(service.get_transaction(bob.user_id, &id).await.unwrap(), record);
        assert!(matches!(
            service.get_transaction(carol.user_id, &id).await,
            Err(TransferError::NotFound(_))
        ));
        assert!(matches!(
            service.get_transaction(alice.user_id, "tx_garbage").await,
            Err(TransferError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_users_excludes_caller() {
        let (_, service, alice, _) = setup(Decimal::from(100)).await;
        let users = service.list_users(alice.user_id).await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Bob");
    }
}
