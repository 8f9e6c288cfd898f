//! Provider registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::PaymentProvider;

/// Maps rail names to adapter instances.
///
/// Built once at startup from configuration. Lookups after that are
/// read-only, so the registry is shared as a plain `Arc` with no locking.
#[derive(Default)]
pub struct ProviderRegistry {
    adapters: HashMap<&'static str, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter under its own reported name.
    pub fn register(&mut self, adapter: Arc<dyn PaymentProvider>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    /// Look up an adapter by rail name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn PaymentProvider>> {
        self.adapters.get(name).cloned()
    }

    /// Registered rail names, sorted for stable output.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.adapters.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered adapters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Whether no adapters are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use puff_core::TransactionStatus;

    use super::super::{
        CustomerOutcome, CustomerProfile, PaymentOutcome, PaymentRequest, PaymentStatusSnapshot,
        ProviderError,
    };
    use super::*;

    struct StubRail {
        name: &'static str,
    }

    #[async_trait]
    impl PaymentProvider for StubRail {
        fn name(&self) -> &'static str {
            self.name
        }

        fn display_name(&self) -> &'static str {
            "Stub"
        }

        fn minimum_amount(&self) -> Decimal {
            Decimal::ONE
        }

        async fn create_customer(
            &self,
            _profile: &CustomerProfile,
        ) -> Result<CustomerOutcome, ProviderError> {
            Ok(CustomerOutcome::Provisioned {
                customer_id: "cus_stub".to_string(),
            })
        }

        async fn process_payment(
            &self,
            _request: &PaymentRequest,
        ) -> Result<PaymentOutcome, ProviderError> {
            Ok(PaymentOutcome::Accepted {
                provider_transaction_id: "tx_stub".to_string(),
                status: TransactionStatus::Pending,
                detail: None,
            })
        }

        async fn get_payment_status(
            &self,
            provider_transaction_id: &str,
        ) -> Result<PaymentStatusSnapshot, ProviderError> {
            Ok(PaymentStatusSnapshot {
                provider_transaction_id: provider_transaction_id.to_string(),
                status: TransactionStatus::Pending,
                tx_hash: None,
                confirmations: None,
                completed_at: None,
            })
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = ProviderRegistry::new();
        assert!(registry.is_empty());

        registry.register(Arc::new(StubRail { name: "alpha" }));
        registry.register(Arc::new(StubRail { name: "beta" }));

        assert_eq!(registry.len(), 2);
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("gamma").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubRail { name: "zeta" }));
        registry.register(Arc::new(StubRail { name: "alpha" }));

        assert_eq!(registry.names(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn re_registering_replaces() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(StubRail { name: "alpha" }));
        registry.register(Arc::new(StubRail { name: "alpha" }));

        assert_eq!(registry.len(), 1);
    }
}
