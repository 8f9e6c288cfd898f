//! Unified payment processing.
//!
//! One settlement flow for every rail: resolve the adapter through the
//! registry, check the operator has the rail active, provision a
//! provider-side customer where the rail requires one, submit, and record
//! the accepted payment exactly once. Declined submissions never touch
//! the ledger.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rust_decimal::Decimal;

use puff_core::{
    PointsPolicy, ProviderRecord, Tier, Transaction, TransactionKind, TransactionStatus, UserId,
};
use puff_store::{EventOutcome, RocksStore, Store, StoreError};

use crate::providers::{
    CustomerOutcome, CustomerProfile, PaymentOutcome, PaymentProvider, PaymentRequest,
    ProviderError, ProviderRegistry,
};

/// Errors from the unified payment flow.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The submission failed validation before any provider call.
    #[error("{0}")]
    Validation(String),

    /// No registered, active provider under that name.
    #[error("provider not available: {0}")]
    UnknownProvider(String),

    /// The provider rejected the submission; nothing was recorded.
    #[error("{0}")]
    Declined(String),

    /// Transport or API failure talking to the provider.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A payment submission, validated at the HTTP layer down to typed ids.
#[derive(Debug, Clone)]
pub struct PaymentSubmission {
    /// Paying user.
    pub user_id: UserId,
    /// Rail name, e.g. "cybrid".
    pub provider: String,
    /// Amount in `currency` units.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Ledger kind for the resulting transaction.
    pub kind: TransactionKind,
    /// Asset pair or token symbol, forwarded to the rail.
    pub symbol: Option<String>,
    /// Destination wallet, forwarded to the rail.
    pub wallet_address: Option<String>,
    /// Contact email for customer provisioning.
    pub email: Option<String>,
    /// Display name for customer provisioning.
    pub name: Option<String>,
    /// Caller metadata, kept opaque on the ledger row.
    pub metadata: Option<serde_json::Value>,
}

/// The unified payment flow shared by the HTTP handlers.
pub struct PaymentService {
    store: Arc<RocksStore>,
    registry: Arc<ProviderRegistry>,
    points: PointsPolicy,
    /// Provider records keyed by rail name. Populated lazily from the store,
    /// refreshed on admin activation toggles, lost on restart by design.
    provider_records: RwLock<HashMap<String, ProviderRecord>>,
}

impl PaymentService {
    /// Create the payment service over the given store and registry.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, registry: Arc<ProviderRegistry>, points: PointsPolicy) -> Self {
        Self {
            store,
            registry,
            points,
            provider_records: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a provider record, serving repeat lookups from the cache.
    fn provider_record(&self, name: &str) -> Result<Option<ProviderRecord>, StoreError> {
        {
            let cache = self
                .provider_records
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(record) = cache.get(name) {
                return Ok(Some(record.clone()));
            }
        }

        let record = self.store.get_provider(name)?;
        if let Some(record) = &record {
            self.provider_records
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(record.name.clone(), record.clone());
        }
        Ok(record)
    }

    /// Replace the cached record after an admin mutation.
    ///
    /// Without this, a payment served from the cache could keep routing
    /// through a rail the operator just deactivated.
    pub fn refresh_provider_record(&self, record: &ProviderRecord) {
        self.provider_records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.name.clone(), record.clone());
    }

    /// Create provider records for registered rails that have none yet.
    ///
    /// Existing records are left alone so operator activation toggles
    /// survive restarts.
    pub fn seed_provider_records(&self) -> Result<(), StoreError> {
        for name in self.registry.names() {
            if self.store.get_provider(name)?.is_none() {
                let Some(adapter) = self.registry.get(name) else {
                    continue;
                };
                self.store
                    .put_provider(&ProviderRecord::new(name, adapter.display_name()))?;
                tracing::info!(provider = name, "Registered provider record");
            }
        }
        Ok(())
    }

    /// Submit a payment through the named rail and record the accepted
    /// transaction.
    ///
    /// Submission is never retried: a timed-out call may have gone through
    /// on the provider side, and a blind retry would double-charge.
    pub async fn process(
        &self,
        submission: PaymentSubmission,
    ) -> Result<Transaction, PaymentError> {
        if submission.amount <= Decimal::ZERO {
            return Err(PaymentError::Validation(
                "amount must be positive".to_string(),
            ));
        }
        if !submission.kind.is_provider_settled() {
            return Err(PaymentError::Validation(format!(
                "kind {} cannot be settled through a provider",
                submission.kind.as_str()
            )));
        }

        let adapter = self
            .registry
            .get(&submission.provider)
            .ok_or_else(|| PaymentError::UnknownProvider(submission.provider.clone()))?;

        let record = self.provider_record(&submission.provider)?;
        if !record.is_some_and(|r| r.is_active) {
            return Err(PaymentError::UnknownProvider(submission.provider.clone()));
        }

        // Rails with provider-side customer objects get one provisioned on
        // the user's first payment; later payments reuse the stored id.
        let customer_id = if adapter.requires_customer() {
            Some(self.customer_for(&submission, adapter.as_ref()).await?)
        } else {
            None
        };

        let request = PaymentRequest {
            user_id: submission.user_id,
            amount: submission.amount,
            currency: submission.currency.clone(),
            symbol: submission.symbol.clone(),
            wallet_address: submission.wallet_address.clone(),
            customer_id: customer_id.clone(),
        };

        let outcome = match adapter.process_payment(&request).await {
            Ok(outcome) => outcome,
            Err(ProviderError::Timeout) => {
                tracing::warn!(
                    provider = %submission.provider,
                    user_id = %submission.user_id,
                    amount = %submission.amount,
                    "Payment submission timed out; state unknown on the provider side"
                );
                return Err(PaymentError::Provider(ProviderError::Timeout));
            }
            Err(e) => return Err(PaymentError::Provider(e)),
        };

        let (provider_transaction_id, status, detail) = match outcome {
            PaymentOutcome::Accepted {
                provider_transaction_id,
                status,
                detail,
            } => (provider_transaction_id, status, detail),
            PaymentOutcome::Declined { reason } => {
                tracing::info!(
                    provider = %submission.provider,
                    user_id = %submission.user_id,
                    reason = %reason,
                    "Payment declined by provider"
                );
                return Err(PaymentError::Declined(reason));
            }
        };

        // Points are computed once, at the tier the user holds right now;
        // the balance only moves when the transaction confirms.
        let tier = self
            .store
            .get_balance(&submission.user_id)?
            .map_or(Tier::Bronze, |b| b.tier);
        let points = self
            .points
            .earned_points(submission.kind, submission.amount, tier);

        let metadata = build_metadata(&submission, customer_id, detail.as_deref());
        let transaction = Transaction::payment(
            submission.user_id,
            submission.kind,
            submission.amount,
            submission.currency.clone(),
            submission.provider.clone(),
            provider_transaction_id.clone(),
            points,
            status,
            metadata,
        );

        if let Err(e) = self.store.record_transaction(&transaction) {
            // The provider accepted this payment; a lost local row means
            // money moved with no ledger entry. Flag it for reconciliation.
            tracing::error!(
                provider = %submission.provider,
                provider_transaction_id = %provider_transaction_id,
                user_id = %submission.user_id,
                amount = %submission.amount,
                reconciliation_required = true,
                error = %e,
                "Provider accepted payment but local persistence failed"
            );
            return Err(e.into());
        }

        tracing::info!(
            transaction_id = %transaction.id,
            provider = %submission.provider,
            provider_transaction_id = %provider_transaction_id,
            status = ?transaction.status,
            points = transaction.points_delta,
            "Payment recorded"
        );

        Ok(transaction)
    }

    /// Refresh a pending transaction against the provider's current view.
    ///
    /// Poll failures leave the local row authoritative; the caller still
    /// gets the ledger's view rather than an error.
    pub async fn refresh_pending(
        &self,
        transaction: Transaction,
    ) -> Result<Transaction, PaymentError> {
        if transaction.status != TransactionStatus::Pending {
            return Ok(transaction);
        }
        let (Some(provider), Some(provider_transaction_id)) = (
            transaction.provider.clone(),
            transaction.provider_transaction_id.clone(),
        ) else {
            return Ok(transaction);
        };
        let Some(adapter) = self.registry.get(&provider) else {
            return Ok(transaction);
        };

        let snapshot = match adapter.get_payment_status(&provider_transaction_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::debug!(
                    provider = %provider,
                    provider_transaction_id = %provider_transaction_id,
                    error = %e,
                    "Status refresh failed; serving the local row"
                );
                return Ok(transaction);
            }
        };

        if snapshot.status == TransactionStatus::Pending {
            return Ok(transaction);
        }

        match self
            .store
            .apply_provider_event(&provider, &provider_transaction_id, snapshot.status)?
        {
            EventOutcome::Applied(updated) => {
                tracing::info!(
                    transaction_id = %updated.id,
                    status = ?updated.status,
                    "Pending payment settled via status poll"
                );
                Ok(updated)
            }
            EventOutcome::Replayed(updated) | EventOutcome::Conflict(updated) => Ok(updated),
            EventOutcome::Unmatched => Ok(transaction),
        }
    }

    async fn customer_for(
        &self,
        submission: &PaymentSubmission,
        adapter: &dyn PaymentProvider,
    ) -> Result<String, PaymentError> {
        if let Some(existing) = self
            .store
            .get_provider_customer(&submission.user_id, &submission.provider)?
        {
            return Ok(existing);
        }

        let profile = CustomerProfile {
            user_id: submission.user_id,
            email: submission.email.clone(),
            name: submission.name.clone(),
        };

        match adapter.create_customer(&profile).await {
            Ok(CustomerOutcome::Provisioned { customer_id }) => {
                self.store.put_provider_customer(
                    &submission.user_id,
                    &submission.provider,
                    &customer_id,
                )?;
                tracing::info!(
                    provider = %submission.provider,
                    user_id = %submission.user_id,
                    "Provisioned provider customer"
                );
                Ok(customer_id)
            }
            Ok(CustomerOutcome::Declined { reason }) => Err(PaymentError::Declined(reason)),
            Err(e) => Err(PaymentError::Provider(e)),
        }
    }
}

/// Merge caller metadata with the settlement context the ledger keeps.
fn build_metadata(
    submission: &PaymentSubmission,
    customer_id: Option<String>,
    detail: Option<&str>,
) -> serde_json::Value {
    let mut metadata = match submission.metadata.clone() {
        Some(serde_json::Value::Object(map)) => map,
        // Non-object metadata is kept, nested, rather than rejected.
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("context".to_string(), other);
            map
        }
        None => serde_json::Map::new(),
    };

    if let Some(symbol) = &submission.symbol {
        metadata.insert(
            "symbol".to_string(),
            serde_json::Value::String(symbol.clone()),
        );
    }
    if let Some(wallet) = &submission.wallet_address {
        metadata.insert(
            "wallet_address".to_string(),
            serde_json::Value::String(wallet.clone()),
        );
    }
    if let Some(customer_id) = customer_id {
        metadata.insert(
            "customer_id".to_string(),
            serde_json::Value::String(customer_id),
        );
    }
    if let Some(detail) = detail {
        metadata.insert(
            "provider_detail".to_string(),
            serde_json::Value::String(detail.to_string()),
        );
    }

    serde_json::Value::Object(metadata)
}
