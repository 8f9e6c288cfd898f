//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//!
//! Compound operations are read-modify-write cycles; the `WriteBatch` makes
//! each commit atomic and the writer mutex serializes the cycles themselves,
//! so two concurrent redemptions can never both validate against the same
//! stale balance.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode, Options,
    WriteBatch,
};

use puff_core::{
    AuditEntry, PointsBalance, ProviderRecord, RedemptionId, RewardId, RewardItem,
    RewardRedemption, Transaction, TransactionId, TransactionStatus, UserId, VaultContribution,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{EventOutcome, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<rocksdb::MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Acquire the writer lock for a compound read-modify-write cycle.
    fn writer(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("writer lock poisoned".into()))
    }

    /// Load the balance for `user_id`, or a zeroed one if none exists yet.
    fn balance_or_default(&self, user_id: &UserId) -> Result<PointsBalance> {
        Ok(self
            .get_balance(user_id)?
            .unwrap_or_else(|| PointsBalance::new(*user_id)))
    }

    /// Look up the transaction id recorded for a provider reference.
    fn provider_ref_target(
        &self,
        provider: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<TransactionId>> {
        let cf_refs = self.cf(cf::PROVIDER_REFS)?;
        let key = keys::provider_ref_key(provider, provider_transaction_id);

        let Some(data) = self
            .db
            .get_cf(&cf_refs, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let bytes: [u8; 16] = data
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Database("malformed provider-ref index value".into()))?;
        let id = TransactionId::from_bytes(bytes)
            .map_err(|e| StoreError::Database(format!("malformed provider-ref index: {e}")))?;
        Ok(Some(id))
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Balance Operations
    // =========================================================================

    fn get_balance(&self, user_id: &UserId) -> Result<Option<PointsBalance>> {
        let cf = self.cf(cf::BALANCES)?;
        let key = keys::balance_key(user_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Transaction Operations
    // =========================================================================

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(cf::TRANSACTIONS)?;
        let key = keys::transaction_key(transaction_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_transaction_by_provider_ref(
        &self,
        provider: &str,
        provider_transaction_id: &str,
    ) -> Result<Option<Transaction>> {
        let Some(id) = self.provider_ref_target(provider, provider_transaction_id)? else {
            return Ok(None);
        };
        self.get_transaction(&id)
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let prefix = keys::user_transactions_prefix(user_id);

        // Collect matching index keys; ULID suffixes sort them oldest first.
        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward));

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        // Reverse to get newest first
        all_keys.reverse();

        let mut transactions = Vec::new();
        for key in all_keys.into_iter().skip(offset) {
            if transactions.len() >= limit {
                break;
            }

            let tx_id = keys::extract_transaction_id_from_user_key(&key);
            if let Some(tx) = self.get_transaction(&tx_id)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn record_transaction(&self, transaction: &Transaction) -> Result<()> {
        transaction.validate_points_sign()?;

        let _guard = self.writer()?;

        // Uniqueness guard for provider-settled transactions
        if let (Some(provider), Some(provider_tx_id)) = (
            transaction.provider.as_deref(),
            transaction.provider_transaction_id.as_deref(),
        ) {
            if self.provider_ref_target(provider, provider_tx_id)?.is_some() {
                return Err(StoreError::DuplicateProviderRef {
                    provider: provider.to_string(),
                    provider_transaction_id: provider_tx_id.to_string(),
                });
            }
        }

        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;
        let cf_refs = self.cf(cf::PROVIDER_REFS)?;
        let cf_balances = self.cf(cf::BALANCES)?;

        let tx_key = keys::transaction_key(&transaction.id);
        let user_tx_key = keys::user_transaction_key(&transaction.user_id, &transaction.id);
        let tx_value = Self::serialize(transaction)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_tx, &tx_key, &tx_value);
        batch.put_cf(&cf_by_user, &user_tx_key, []); // Index entry (empty value)

        if let (Some(provider), Some(provider_tx_id)) = (
            transaction.provider.as_deref(),
            transaction.provider_transaction_id.as_deref(),
        ) {
            let ref_key = keys::provider_ref_key(provider, provider_tx_id);
            batch.put_cf(&cf_refs, &ref_key, transaction.id.to_bytes());
        }

        // A transaction born confirmed settles its points immediately
        if transaction.status == TransactionStatus::Confirmed && transaction.points_delta != 0 {
            let mut balance = self.balance_or_default(&transaction.user_id)?;
            if transaction.points_delta < 0
                && balance.total_points + transaction.points_delta < 0
            {
                return Err(StoreError::InsufficientPoints {
                    balance: balance.total_points,
                    required: -transaction.points_delta,
                });
            }
            balance.apply_delta(transaction.points_delta);

            let balance_key = keys::balance_key(&transaction.user_id);
            let balance_value = Self::serialize(&balance)?;
            batch.put_cf(&cf_balances, &balance_key, &balance_value);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn apply_provider_event(
        &self,
        provider: &str,
        provider_transaction_id: &str,
        status: TransactionStatus,
    ) -> Result<EventOutcome> {
        let _guard = self.writer()?;

        let Some(tx_id) = self.provider_ref_target(provider, provider_transaction_id)? else {
            return Ok(EventOutcome::Unmatched);
        };
        let mut transaction = self
            .get_transaction(&tx_id)?
            .ok_or_else(|| StoreError::Database("provider-ref index points nowhere".into()))?;

        if transaction.status == status {
            return Ok(EventOutcome::Replayed(transaction));
        }
        if transaction.status.is_terminal() {
            return Ok(EventOutcome::Conflict(transaction));
        }

        transaction.transition(status)?;

        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_balances = self.cf(cf::BALANCES)?;

        let tx_key = keys::transaction_key(&transaction.id);
        let tx_value = Self::serialize(&transaction)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_tx, &tx_key, &tx_value);

        // Confirmation settles the points in the same write
        if status == TransactionStatus::Confirmed && transaction.points_delta != 0 {
            let mut balance = self.balance_or_default(&transaction.user_id)?;
            balance.apply_delta(transaction.points_delta);

            let balance_key = keys::balance_key(&transaction.user_id);
            let balance_value = Self::serialize(&balance)?;
            batch.put_cf(&cf_balances, &balance_key, &balance_value);
        }

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(EventOutcome::Applied(transaction))
    }

    fn redeem_points(
        &self,
        user_id: &UserId,
        reward_id: &RewardId,
        points_to_spend: i64,
    ) -> Result<(RewardRedemption, Transaction)> {
        let _guard = self.writer()?;

        // Balance check comes first so an unfunded user learns about their
        // balance, not the catalog
        let mut balance = self.balance_or_default(user_id)?;
        if points_to_spend > balance.total_points {
            return Err(StoreError::InsufficientPoints {
                balance: balance.total_points,
                required: points_to_spend,
            });
        }

        let mut reward = self
            .get_reward(reward_id)?
            .ok_or_else(|| StoreError::RewardUnavailable {
                reason: "no such catalog entry".into(),
            })?;
        if !reward.is_redeemable() {
            let reason = if reward.is_active {
                "out of stock"
            } else {
                "entry is inactive"
            };
            return Err(StoreError::RewardUnavailable {
                reason: reason.into(),
            });
        }
        if reward.points_cost != points_to_spend {
            return Err(StoreError::PointsMismatch {
                expected: reward.points_cost,
                provided: points_to_spend,
            });
        }

        let redemption = RewardRedemption::new(*user_id, &reward);
        let transaction = Transaction::redemption(*user_id, points_to_spend, &reward.name);

        balance.apply_delta(-points_to_spend);
        if let Some(count) = reward.availability.as_mut() {
            *count -= 1;
            reward.updated_at = chrono::Utc::now();
        }

        let cf_balances = self.cf(cf::BALANCES)?;
        let cf_rewards = self.cf(cf::REWARDS)?;
        let cf_redemptions = self.cf(cf::REDEMPTIONS)?;
        let cf_by_user = self.cf(cf::REDEMPTIONS_BY_USER)?;
        let cf_by_code = self.cf(cf::REDEMPTIONS_BY_CODE)?;
        let cf_tx = self.cf(cf::TRANSACTIONS)?;
        let cf_tx_by_user = self.cf(cf::TRANSACTIONS_BY_USER)?;

        // All four effects land in one batch: debit, redemption row,
        // availability decrement, ledger transaction
        let mut batch = WriteBatch::default();
        batch.put_cf(
            &cf_balances,
            keys::balance_key(user_id),
            Self::serialize(&balance)?,
        );
        batch.put_cf(
            &cf_rewards,
            keys::reward_key(reward_id),
            Self::serialize(&reward)?,
        );
        batch.put_cf(
            &cf_redemptions,
            keys::redemption_key(&redemption.id),
            Self::serialize(&redemption)?,
        );
        batch.put_cf(&cf_by_user, keys::user_redemption_key(user_id, &redemption.id), []);
        batch.put_cf(
            &cf_by_code,
            keys::redemption_code_key(&redemption.redemption_code),
            redemption.id.to_bytes(),
        );
        batch.put_cf(
            &cf_tx,
            keys::transaction_key(&transaction.id),
            Self::serialize(&transaction)?,
        );
        batch.put_cf(
            &cf_tx_by_user,
            keys::user_transaction_key(user_id, &transaction.id),
            [],
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok((redemption, transaction))
    }

    // =========================================================================
    // Rewards Catalog Operations
    // =========================================================================

    fn put_reward(&self, reward: &RewardItem) -> Result<()> {
        let cf = self.cf(cf::REWARDS)?;
        let key = keys::reward_key(&reward.id);
        let value = Self::serialize(reward)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_reward(&self, reward_id: &RewardId) -> Result<Option<RewardItem>> {
        let cf = self.cf(cf::REWARDS)?;
        let key = keys::reward_key(reward_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_rewards(&self) -> Result<Vec<RewardItem>> {
        let cf = self.cf(cf::REWARDS)?;
        let mut rewards = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            rewards.push(Self::deserialize(&value)?);
        }

        Ok(rewards)
    }

    // =========================================================================
    // Redemption Operations
    // =========================================================================

    fn get_redemption(&self, redemption_id: &RedemptionId) -> Result<Option<RewardRedemption>> {
        let cf = self.cf(cf::REDEMPTIONS)?;
        let key = keys::redemption_key(redemption_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_redemption_by_code(&self, code: &str) -> Result<Option<RewardRedemption>> {
        let cf_by_code = self.cf(cf::REDEMPTIONS_BY_CODE)?;
        let key = keys::redemption_code_key(code);

        let Some(data) = self
            .db
            .get_cf(&cf_by_code, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let bytes: [u8; 16] = data
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Database("malformed redemption-code index value".into()))?;
        let id = RedemptionId::from_bytes(bytes)
            .map_err(|e| StoreError::Database(format!("malformed redemption-code index: {e}")))?;
        self.get_redemption(&id)
    }

    fn list_redemptions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<RewardRedemption>> {
        let cf_by_user = self.cf(cf::REDEMPTIONS_BY_USER)?;
        let prefix = keys::user_redemptions_prefix(user_id);

        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward));

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        all_keys.reverse();

        let mut redemptions = Vec::new();
        for key in all_keys {
            if redemptions.len() >= limit {
                break;
            }

            let id = keys::extract_redemption_id_from_user_key(&key);
            if let Some(redemption) = self.get_redemption(&id)? {
                redemptions.push(redemption);
            }
        }

        Ok(redemptions)
    }

    fn fulfill_redemption(&self, code: &str) -> Result<RewardRedemption> {
        let _guard = self.writer()?;

        let mut redemption = self
            .get_redemption_by_code(code)?
            .ok_or(StoreError::NotFound)?;

        let now = chrono::Utc::now();
        let effective = redemption.effective_status(now);
        if effective != puff_core::RedemptionStatus::Pending {
            return Err(StoreError::RedemptionNotPending {
                status: match effective {
                    puff_core::RedemptionStatus::Completed => "completed".into(),
                    puff_core::RedemptionStatus::Expired => "expired".into(),
                    puff_core::RedemptionStatus::Pending => "pending".into(),
                },
            });
        }

        redemption.mark_fulfilled(now);

        let cf = self.cf(cf::REDEMPTIONS)?;
        let key = keys::redemption_key(&redemption.id);
        let value = Self::serialize(&redemption)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(redemption)
    }

    // =========================================================================
    // Provider Record Operations
    // =========================================================================

    fn put_provider(&self, record: &ProviderRecord) -> Result<()> {
        let cf = self.cf(cf::PROVIDERS)?;
        let key = keys::provider_key(&record.name);
        let value = Self::serialize(record)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_provider(&self, name: &str) -> Result<Option<ProviderRecord>> {
        let cf = self.cf(cf::PROVIDERS)?;
        let key = keys::provider_key(name);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_providers(&self) -> Result<Vec<ProviderRecord>> {
        let cf = self.cf(cf::PROVIDERS)?;
        let mut records = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            records.push(Self::deserialize(&value)?);
        }

        Ok(records)
    }

    fn put_provider_customer(
        &self,
        user_id: &UserId,
        provider: &str,
        customer_id: &str,
    ) -> Result<()> {
        let cf = self.cf(cf::PROVIDER_CUSTOMERS)?;
        let key = keys::provider_customer_key(user_id, provider);
        let value = Self::serialize(&customer_id)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_provider_customer(&self, user_id: &UserId, provider: &str) -> Result<Option<String>> {
        let cf = self.cf(cf::PROVIDER_CUSTOMERS)?;
        let key = keys::provider_customer_key(user_id, provider);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Vault Operations
    // =========================================================================

    fn record_contribution(&self, contribution: &VaultContribution) -> Result<()> {
        let cf = self.cf(cf::VAULT_CONTRIBUTIONS)?;
        let key = keys::contribution_key(&contribution.id);
        let value = Self::serialize(contribution)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_contributions(&self) -> Result<Vec<VaultContribution>> {
        let cf = self.cf(cf::VAULT_CONTRIBUTIONS)?;
        let mut contributions = Vec::new();

        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            contributions.push(Self::deserialize(&value)?);
        }

        Ok(contributions)
    }

    // =========================================================================
    // Audit Operations
    // =========================================================================

    fn put_audit_entry(&self, entry: &AuditEntry) -> Result<()> {
        let cf = self.cf(cf::AUDIT_LOG)?;
        let key = keys::audit_key(&entry.id);
        let value = Self::serialize(entry)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn list_audit_entries(&self, limit: usize) -> Result<Vec<AuditEntry>> {
        let cf = self.cf(cf::AUDIT_LOG)?;
        let mut entries = Vec::new();

        // ULID keys are time-ordered, so reverse iteration is newest first
        for item in self.db.iterator_cf(&cf, IteratorMode::End) {
            if entries.len() >= limit {
                break;
            }
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            entries.push(Self::deserialize(&value)?);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puff_core::{ContributionSource, MerchantId, TransactionKind};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn payment_tx(
        user_id: UserId,
        provider_tx_id: &str,
        points: i64,
        status: TransactionStatus,
    ) -> Transaction {
        Transaction::payment(
            user_id,
            TransactionKind::TopUp,
            Decimal::new(10000, 2),
            "USD".into(),
            "cybrid".into(),
            provider_tx_id.into(),
            points,
            status,
            serde_json::Value::Null,
        )
    }

    fn confirmed_points_sum(store: &RocksStore, user_id: &UserId) -> i64 {
        store
            .list_transactions_by_user(user_id, 100, 0)
            .unwrap()
            .iter()
            .filter(|tx| tx.status == TransactionStatus::Confirmed)
            .map(|tx| tx.points_delta)
            .sum()
    }

    #[test]
    fn pending_payment_does_not_touch_balance() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let tx = payment_tx(user_id, "trade_1", 1000, TransactionStatus::Pending);
        store.record_transaction(&tx).unwrap();

        assert!(store.get_balance(&user_id).unwrap().is_none());

        let by_ref = store
            .get_transaction_by_provider_ref("cybrid", "trade_1")
            .unwrap()
            .unwrap();
        assert_eq!(by_ref.id, tx.id);
    }

    #[test]
    fn confirmed_payment_settles_points_at_insert() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let tx = payment_tx(user_id, "trade_2", 1000, TransactionStatus::Confirmed);
        store.record_transaction(&tx).unwrap();

        let balance = store.get_balance(&user_id).unwrap().unwrap();
        assert_eq!(balance.total_points, 1000);
        assert_eq!(balance.tier_points, 1000);
        assert_eq!(balance.total_points, confirmed_points_sum(&store, &user_id));
    }

    #[test]
    fn duplicate_provider_ref_is_rejected() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let tx1 = payment_tx(user_id, "trade_3", 1000, TransactionStatus::Pending);
        store.record_transaction(&tx1).unwrap();

        let tx2 = payment_tx(user_id, "trade_3", 1000, TransactionStatus::Pending);
        let result = store.record_transaction(&tx2);
        assert!(matches!(
            result,
            Err(StoreError::DuplicateProviderRef { .. })
        ));

        // Only the first insert landed
        let listed = store.list_transactions_by_user(&user_id, 10, 0).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn wrong_sign_is_rejected() {
        let (store, _dir) = create_test_store();
        // The constructor keeps the caller's sign; the store is the gate.
        let tx = payment_tx(
            UserId::generate(),
            "trade_sign",
            -500,
            TransactionStatus::Pending,
        );

        assert!(matches!(
            store.record_transaction(&tx),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn event_confirms_and_credits_once() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let tx = payment_tx(user_id, "trade_4", 1000, TransactionStatus::Pending);
        store.record_transaction(&tx).unwrap();

        let outcome = store
            .apply_provider_event("cybrid", "trade_4", TransactionStatus::Confirmed)
            .unwrap();
        let EventOutcome::Applied(applied) = outcome else {
            panic!("expected Applied");
        };
        assert_eq!(applied.status, TransactionStatus::Confirmed);
        assert!(applied.completed_at.is_some());

        let balance = store.get_balance(&user_id).unwrap().unwrap();
        assert_eq!(balance.total_points, 1000);

        // Replay: same terminal status, no second credit
        let outcome = store
            .apply_provider_event("cybrid", "trade_4", TransactionStatus::Confirmed)
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Replayed(_)));

        let balance = store.get_balance(&user_id).unwrap().unwrap();
        assert_eq!(balance.total_points, 1000);
        assert_eq!(balance.total_points, confirmed_points_sum(&store, &user_id));
    }

    #[test]
    fn conflicting_terminal_event_leaves_ledger_alone() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let tx = payment_tx(user_id, "trade_5", 1000, TransactionStatus::Pending);
        store.record_transaction(&tx).unwrap();

        store
            .apply_provider_event("cybrid", "trade_5", TransactionStatus::Confirmed)
            .unwrap();

        let outcome = store
            .apply_provider_event("cybrid", "trade_5", TransactionStatus::Failed)
            .unwrap();
        let EventOutcome::Conflict(current) = outcome else {
            panic!("expected Conflict");
        };
        assert_eq!(current.status, TransactionStatus::Confirmed);

        let balance = store.get_balance(&user_id).unwrap().unwrap();
        assert_eq!(balance.total_points, 1000);
    }

    #[test]
    fn failed_event_settles_no_points() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let tx = payment_tx(user_id, "trade_6", 1000, TransactionStatus::Pending);
        store.record_transaction(&tx).unwrap();

        let outcome = store
            .apply_provider_event("cybrid", "trade_6", TransactionStatus::Failed)
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Applied(_)));
        assert!(store.get_balance(&user_id).unwrap().is_none());
    }

    #[test]
    fn unknown_provider_ref_is_unmatched() {
        let (store, _dir) = create_test_store();
        let outcome = store
            .apply_provider_event("cybrid", "never_seen", TransactionStatus::Confirmed)
            .unwrap();
        assert!(matches!(outcome, EventOutcome::Unmatched));
    }

    #[test]
    fn redeem_debits_and_decrements_atomically() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let grant = Transaction::reward_grant(user_id, 500, "signup bonus".into());
        store.record_transaction(&grant).unwrap();

        let reward = RewardItem::new("Grinder".into(), "Logo grinder".into(), 300, Some(5));
        store.put_reward(&reward).unwrap();

        let (redemption, tx) = store.redeem_points(&user_id, &reward.id, 300).unwrap();
        assert_eq!(redemption.points_spent, 300);
        assert_eq!(tx.points_delta, -300);

        let balance = store.get_balance(&user_id).unwrap().unwrap();
        assert_eq!(balance.total_points, 200);
        assert_eq!(balance.lifetime_spent, 300);
        assert_eq!(balance.total_points, confirmed_points_sum(&store, &user_id));

        let updated = store.get_reward(&reward.id).unwrap().unwrap();
        assert_eq!(updated.availability, Some(4));

        let by_code = store
            .get_redemption_by_code(&redemption.redemption_code)
            .unwrap()
            .unwrap();
        assert_eq!(by_code.id, redemption.id);

        let listed = store.list_redemptions_by_user(&user_id, 10).unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn redeem_with_zero_points_fails_and_writes_nothing() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let reward = RewardItem::new("Hat".into(), "Logo hat".into(), 100, None);
        store.put_reward(&reward).unwrap();

        let result = store.redeem_points(&user_id, &reward.id, 100);
        assert!(matches!(
            result,
            Err(StoreError::InsufficientPoints {
                balance: 0,
                required: 100
            })
        ));

        assert!(store.list_redemptions_by_user(&user_id, 10).unwrap().is_empty());
        assert!(store.list_transactions_by_user(&user_id, 10, 0).unwrap().is_empty());
    }

    #[test]
    fn redeem_unavailable_reward_fails() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let grant = Transaction::reward_grant(user_id, 1000, "bonus".into());
        store.record_transaction(&grant).unwrap();

        // Out of stock
        let mut reward = RewardItem::new("Vape".into(), "Disposable".into(), 100, Some(0));
        store.put_reward(&reward).unwrap();
        assert!(matches!(
            store.redeem_points(&user_id, &reward.id, 100),
            Err(StoreError::RewardUnavailable { .. })
        ));

        // Inactive
        reward.availability = Some(5);
        reward.is_active = false;
        store.put_reward(&reward).unwrap();
        assert!(matches!(
            store.redeem_points(&user_id, &reward.id, 100),
            Err(StoreError::RewardUnavailable { .. })
        ));

        // Missing entirely
        assert!(matches!(
            store.redeem_points(&user_id, &RewardId::generate(), 100),
            Err(StoreError::RewardUnavailable { .. })
        ));
    }

    #[test]
    fn redeem_rejects_stale_cost() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let grant = Transaction::reward_grant(user_id, 1000, "bonus".into());
        store.record_transaction(&grant).unwrap();

        let reward = RewardItem::new("Hat".into(), "Logo hat".into(), 250, None);
        store.put_reward(&reward).unwrap();

        let result = store.redeem_points(&user_id, &reward.id, 200);
        assert!(matches!(
            result,
            Err(StoreError::PointsMismatch {
                expected: 250,
                provided: 200
            })
        ));
    }

    #[test]
    fn racing_redemptions_cannot_overdraw() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);
        let user_id = UserId::generate();

        // 300 points, two 200-point redemptions: only one can fit
        let grant = Transaction::reward_grant(user_id, 300, "bonus".into());
        store.record_transaction(&grant).unwrap();

        let reward = RewardItem::new("Hat".into(), "Logo hat".into(), 200, None);
        store.put_reward(&reward).unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let store = Arc::clone(&store);
            let reward_id = reward.id;
            handles.push(std::thread::spawn(move || {
                store.redeem_points(&user_id, &reward_id, 200)
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let insufficient = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::InsufficientPoints { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(insufficient, 1);

        let balance = store.get_balance(&user_id).unwrap().unwrap();
        assert_eq!(balance.total_points, 100);
    }

    #[test]
    fn racing_redemptions_cannot_oversell() {
        let (store, _dir) = create_test_store();
        let store = Arc::new(store);

        let reward = RewardItem::new("Rare hat".into(), "One left".into(), 100, Some(1));
        store.put_reward(&reward).unwrap();

        let users: Vec<UserId> = (0..2).map(|_| UserId::generate()).collect();
        for user_id in &users {
            let grant = Transaction::reward_grant(*user_id, 500, "bonus".into());
            store.record_transaction(&grant).unwrap();
        }

        let mut handles = Vec::new();
        for user_id in users {
            let store = Arc::clone(&store);
            let reward_id = reward.id;
            handles.push(std::thread::spawn(move || {
                store.redeem_points(&user_id, &reward_id, 100)
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let successes = results.iter().filter(|r| r.is_ok()).count();
        let unavailable = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::RewardUnavailable { .. })))
            .count();

        assert_eq!(successes, 1);
        assert_eq!(unavailable, 1);

        let updated = store.get_reward(&reward.id).unwrap().unwrap();
        assert_eq!(updated.availability, Some(0));
    }

    #[test]
    fn fulfillment_by_code() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let grant = Transaction::reward_grant(user_id, 500, "bonus".into());
        store.record_transaction(&grant).unwrap();
        let reward = RewardItem::new("Hat".into(), "Logo hat".into(), 100, None);
        store.put_reward(&reward).unwrap();

        let (redemption, _) = store.redeem_points(&user_id, &reward.id, 100).unwrap();

        let fulfilled = store
            .fulfill_redemption(&redemption.redemption_code)
            .unwrap();
        assert_eq!(fulfilled.status, puff_core::RedemptionStatus::Completed);
        assert!(fulfilled.fulfilled_at.is_some());

        // Second fulfillment attempt is rejected
        let result = store.fulfill_redemption(&redemption.redemption_code);
        assert!(matches!(
            result,
            Err(StoreError::RedemptionNotPending { .. })
        ));

        assert!(matches!(
            store.fulfill_redemption("PV-NOSUCHCODE"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn expired_redemption_cannot_be_fulfilled() {
        let (store, _dir) = create_test_store();
        let user_id = UserId::generate();

        let grant = Transaction::reward_grant(user_id, 500, "bonus".into());
        store.record_transaction(&grant).unwrap();
        let reward = RewardItem::new("Hat".into(), "Logo hat".into(), 100, None);
        store.put_reward(&reward).unwrap();

        let (mut redemption, _) = store.redeem_points(&user_id, &reward.id, 100).unwrap();

        // Back-date the expiry so the code has lapsed by the time the
        // budtender scans it.
        redemption.expires_at = Some(chrono::Utc::now() - chrono::Duration::days(1));
        let cf = store.cf(cf::REDEMPTIONS).unwrap();
        store
            .db
            .put_cf(
                &cf,
                keys::redemption_key(&redemption.id),
                RocksStore::serialize(&redemption).unwrap(),
            )
            .unwrap();

        let result = store.fulfill_redemption(&redemption.redemption_code);
        assert!(matches!(
            result,
            Err(StoreError::RedemptionNotPending { ref status }) if status == "expired"
        ));

        // The row itself is untouched; only the read-side status lapsed.
        let stored = store.get_redemption(&redemption.id).unwrap().unwrap();
        assert!(stored.fulfilled_at.is_none());
    }

    #[test]
    fn provider_records_roundtrip() {
        let (store, _dir) = create_test_store();

        let mut record = ProviderRecord::new("cybrid", "Cybrid");
        store.put_provider(&record).unwrap();
        store
            .put_provider(&ProviderRecord::new("sphere", "Sphere Pay"))
            .unwrap();

        let fetched = store.get_provider("cybrid").unwrap().unwrap();
        assert!(fetched.is_active);

        record.set_active(false);
        store.put_provider(&record).unwrap();
        let fetched = store.get_provider("cybrid").unwrap().unwrap();
        assert!(!fetched.is_active);

        assert_eq!(store.list_providers().unwrap().len(), 2);
    }

    #[test]
    fn provider_customers_are_per_user_and_rail() {
        let (store, _dir) = create_test_store();
        let alice = UserId::generate();
        let bob = UserId::generate();

        assert!(store.get_provider_customer(&alice, "cybrid").unwrap().is_none());

        store.put_provider_customer(&alice, "cybrid", "cus_a1").unwrap();
        store.put_provider_customer(&bob, "cybrid", "cus_b1").unwrap();

        assert_eq!(
            store.get_provider_customer(&alice, "cybrid").unwrap().as_deref(),
            Some("cus_a1")
        );
        assert_eq!(
            store.get_provider_customer(&bob, "cybrid").unwrap().as_deref(),
            Some("cus_b1")
        );
        assert!(store.get_provider_customer(&alice, "sphere").unwrap().is_none());
    }

    #[test]
    fn contributions_accumulate() {
        let (store, _dir) = create_test_store();

        for amount in [1000, 2500] {
            let contribution = VaultContribution::new(
                MerchantId::generate(),
                Decimal::new(amount, 2),
                ContributionSource::TransactionFee,
            );
            store.record_contribution(&contribution).unwrap();
        }

        let rows = store.list_contributions().unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn audit_entries_list_newest_first() {
        let (store, _dir) = create_test_store();

        let first = AuditEntry::new(
            "cybrid",
            "trade.completed",
            Some("trade_1".into()),
            puff_core::AuditStatus::Processed,
        );
        store.put_audit_entry(&first).unwrap();

        std::thread::sleep(std::time::Duration::from_millis(2));

        let second = AuditEntry::new(
            "cybrid",
            "trade.failed",
            Some("trade_2".into()),
            puff_core::AuditStatus::Unmatched,
        );
        store.put_audit_entry(&second).unwrap();

        let entries = store.list_audit_entries(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event_type, "trade.failed");
        assert_eq!(entries[1].event_type, "trade.completed");

        let limited = store.list_audit_entries(1).unwrap();
        assert_eq!(limited.len(), 1);
    }
}
