//! Ledger service: the entry point for recording movements, reclassifying
//! them, checking availability and triggering recalculation.
//!
//! Every mutation follows the same shape:
//! 1. validate and scope-check the request
//! 2. take the locks of every affected key
//! 3. write to the store
//! 4. replay the affected keys before releasing the locks
//!
//! so a caller never observes an appended entry without its balance.

use std::ops::Bound;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use stockbook_auth::LedgerScope;
use stockbook_core::{ExpectedVersion, ProductId, StoreId, TenantId, TransactionId};
use stockbook_inventory::{
    Availability, LedgerKey, LedgerTransaction, ProductUnits, RecordTransaction,
    TransactionStatus, lowest_balance_from,
};

use crate::catalog::ProductCatalog;
use crate::error::LedgerError;
use crate::ledger_store::{
    LedgerStore, LedgerStoreError, Pagination, TransactionFilter, TransactionPage,
};
use crate::locks::KeyLocks;
use crate::recalculation::{KeyRecalculation, RecalculationEngine, RecalculationSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSettings {
    /// Reject movements and reclassifications that would drive a balance
    /// below zero.
    pub enforce_availability: bool,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            enforce_availability: true,
        }
    }
}

/// A recorded (or reclassified) entry, with its transfer counterpart if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedTransaction {
    pub transaction: LedgerTransaction,
    pub counterpart: Option<LedgerTransaction>,
}

#[derive(Debug)]
pub struct LedgerService<S, C> {
    engine: RecalculationEngine<S>,
    catalog: C,
    settings: LedgerSettings,
}

impl<S, C> LedgerService<S, C>
where
    S: LedgerStore,
    C: ProductCatalog,
{
    pub fn new(store: S, catalog: C, settings: LedgerSettings) -> Self {
        Self {
            engine: RecalculationEngine::new(store, Arc::new(KeyLocks::new())),
            catalog,
            settings,
        }
    }

    pub fn engine(&self) -> &RecalculationEngine<S> {
        &self.engine
    }

    pub fn settings(&self) -> LedgerSettings {
        self.settings
    }

    /// Record a stock movement and return it with its computed balance.
    ///
    /// A `send` with `to_store` records both transfer legs and replays both
    /// keys.
    #[instrument(
        skip_all,
        fields(
            company_id = ?request.company_id,
            product_id = ?request.product_id,
            transaction_type = ?request.transaction_type
        )
    )]
    pub fn record(
        &self,
        scope: LedgerScope,
        request: RecordTransaction,
    ) -> Result<RecordedTransaction, LedgerError> {
        let validated = request.validate()?;
        scope.ensure(validated.company_id)?;

        let units = self
            .catalog
            .units(validated.company_id, validated.product_id)
            .ok_or_else(|| {
                LedgerError::not_found(format!("product {}", validated.product_id))
            })?;

        let mut keys = vec![validated.key()];
        keys.extend(validated.destination_key());
        let created_at = Utc::now();

        self.engine.locks().with_keys(&keys, || -> Result<RecordedTransaction, LedgerError> {
            let legs = validated.into_legs(&units, created_at)?;

            if self.settings.enforce_availability {
                for leg in &legs {
                    if leg.status == TransactionStatus::Done && leg.transaction_type.is_outgoing() {
                        self.ensure_covered(scope, leg.key(), leg.quantity)?;
                        // Sorts after every stored entry of the same date.
                        let from = Bound::Included((leg.date, u64::MAX));
                        self.ensure_history_covered(scope, leg.key(), from, leg.quantity)?;
                    }
                }
            }

            let stored = self.engine.store().append(legs)?;
            for key in &keys {
                if let Err(err) = self.engine.replay_and_persist(scope, *key) {
                    warn!(
                        key = %key,
                        error = %err,
                        "entries appended but balances not replayed; key needs recalculation"
                    );
                    return Err(err);
                }
            }

            let recorded = self.reload(scope, &stored)?;
            info!(
                transaction_id = %recorded.transaction.id,
                key = %recorded.transaction.key(),
                transaction_type = %recorded.transaction.transaction_type,
                remaining = ?recorded.transaction.remaining,
                transfer = recorded.counterpart.is_some(),
                "transaction recorded"
            );
            Ok(recorded)
        })
    }

    /// Move an entry between `pending` and `done` and replay its key.
    ///
    /// Transfer legs always change status together.
    #[instrument(skip(self))]
    pub fn set_status(
        &self,
        scope: LedgerScope,
        id: TransactionId,
        status: TransactionStatus,
    ) -> Result<RecordedTransaction, LedgerError> {
        let store = self.engine.store();
        let target = store.get(scope, id)?;
        let legs = match target.transfer_id {
            Some(transfer_id) => store.find_by_transfer(scope, transfer_id)?,
            None => vec![target],
        };
        let keys: Vec<LedgerKey> = legs.iter().map(LedgerTransaction::key).collect();

        self.engine.locks().with_keys(&keys, || -> Result<RecordedTransaction, LedgerError> {
            // Re-read under the locks; revisions from before may be stale.
            let legs = legs
                .iter()
                .map(|leg| store.get(scope, leg.id))
                .collect::<Result<Vec<_>, _>>()?;

            if legs.iter().all(|leg| leg.status == status) {
                debug!("status unchanged");
                return self.reload_with_primary(scope, id, &legs);
            }

            if self.settings.enforce_availability {
                self.ensure_reclassification_covered(scope, &legs, status)?;
            }

            for leg in &legs {
                store.update_status(scope, leg.id, ExpectedVersion::Exact(leg.revision), status)?;
            }
            for key in &keys {
                self.engine.replay_and_persist(scope, *key)?;
            }

            info!(transaction_id = %id, status = status.as_str(), legs = legs.len(), "status changed");
            self.reload_with_primary(scope, id, &legs)
        })
    }

    /// Can `requested` units leave `key` right now.
    #[instrument(skip(self), fields(key = %key))]
    pub fn check_availability(
        &self,
        scope: LedgerScope,
        key: LedgerKey,
        requested: Decimal,
    ) -> Result<Availability, LedgerError> {
        scope.ensure(key.company_id)?;
        self.availability(scope, key, requested)
    }

    pub fn get(&self, scope: LedgerScope, id: TransactionId) -> Result<LedgerTransaction, LedgerError> {
        Ok(self.engine.store().get(scope, id)?)
    }

    pub fn list(
        &self,
        scope: LedgerScope,
        filter: &TransactionFilter,
        pagination: Pagination,
    ) -> Result<TransactionPage, LedgerError> {
        Ok(self.engine.store().find(scope, filter, pagination)?)
    }

    /// Register or replace a product's measurement units.
    #[instrument(skip(self, units), fields(product_id = %units.product_id))]
    pub fn register_product(
        &self,
        scope: LedgerScope,
        company_id: TenantId,
        units: ProductUnits,
    ) -> Result<Option<ProductUnits>, LedgerError> {
        scope.ensure(company_id)?;
        let previous = self.catalog.register(company_id, units);
        info!(replaced = previous.is_some(), "product units registered");
        Ok(previous)
    }

    pub fn products(
        &self,
        scope: LedgerScope,
        company_id: TenantId,
    ) -> Result<Vec<ProductUnits>, LedgerError> {
        scope.ensure(company_id)?;
        Ok(self.catalog.list(company_id))
    }

    pub fn recalculate_product_balance(
        &self,
        scope: LedgerScope,
        product_id: ProductId,
        store_id: StoreId,
    ) -> Result<Vec<KeyRecalculation>, LedgerError> {
        self.engine
            .recalculate_product_balance(scope, product_id, store_id)
    }

    pub fn recalculate_all(
        &self,
        scope: LedgerScope,
        pagination: Pagination,
    ) -> Result<RecalculationSummary, LedgerError> {
        self.engine.recalculate_all(scope, pagination)
    }

    fn availability(
        &self,
        scope: LedgerScope,
        key: LedgerKey,
        requested: Decimal,
    ) -> Result<Availability, LedgerError> {
        let availability = match self.engine.store().latest_for_key(scope, &key) {
            Ok(latest) => Availability::evaluate(requested, Some(latest))?,
            Err(LedgerStoreError::NotFound(_)) => Availability::empty(requested)?,
            Err(err) => return Err(err.into()),
        };
        Ok(availability)
    }

    fn ensure_covered(
        &self,
        scope: LedgerScope,
        key: LedgerKey,
        quantity: Decimal,
    ) -> Result<(), LedgerError> {
        let availability = self.availability(scope, key, quantity)?;
        if availability.available {
            return Ok(());
        }
        Err(LedgerError::InsufficientStock {
            key,
            requested: quantity,
            remaining: availability.remaining,
        })
    }

    /// Reject a movement of `quantity` at `from` that would drive any balance
    /// from that point on below zero.
    fn ensure_history_covered(
        &self,
        scope: LedgerScope,
        key: LedgerKey,
        from: Bound<(DateTime<Utc>, u64)>,
        quantity: Decimal,
    ) -> Result<(), LedgerError> {
        let entries = self.engine.store().list_for_replay(scope, &key)?;
        let lowest = lowest_balance_from(key, &entries, from)?;
        if lowest >= quantity {
            return Ok(());
        }
        debug!(key = %key, lowest = %lowest, requested = %quantity, "movement oversells history");
        Err(LedgerError::InsufficientStock {
            key,
            requested: quantity,
            remaining: lowest,
        })
    }

    /// Both directions of a status change can lower a balance: an outgoing
    /// leg starting to count, or an inbound leg ceasing to.
    fn ensure_reclassification_covered(
        &self,
        scope: LedgerScope,
        legs: &[LedgerTransaction],
        status: TransactionStatus,
    ) -> Result<(), LedgerError> {
        for leg in legs.iter().filter(|l| l.status != status) {
            let from = match status {
                TransactionStatus::Done if leg.transaction_type.is_outgoing() => {
                    Bound::Included(leg.replay_position())
                }
                TransactionStatus::Pending if leg.transaction_type.is_inbound() => {
                    Bound::Excluded(leg.replay_position())
                }
                _ => continue,
            };
            self.ensure_covered(scope, leg.key(), leg.quantity)?;
            self.ensure_history_covered(scope, leg.key(), from, leg.quantity)?;
        }
        Ok(())
    }

    fn reload(
        &self,
        scope: LedgerScope,
        stored: &[LedgerTransaction],
    ) -> Result<RecordedTransaction, LedgerError> {
        let Some(primary) = stored.first() else {
            return Err(LedgerError::Store("append returned no entries".to_string()));
        };
        self.reload_with_primary(scope, primary.id, stored)
    }

    fn reload_with_primary(
        &self,
        scope: LedgerScope,
        primary: TransactionId,
        legs: &[LedgerTransaction],
    ) -> Result<RecordedTransaction, LedgerError> {
        let store = self.engine.store();
        let transaction = store.get(scope, primary)?;
        let counterpart = legs
            .iter()
            .find(|leg| leg.id != primary)
            .map(|leg| store.get(scope, leg.id))
            .transpose()?;
        Ok(RecordedTransaction {
            transaction,
            counterpart,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryProductCatalog;
    use crate::ledger_store::InMemoryLedgerStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use stockbook_core::UserId;
    use stockbook_inventory::{MeasurementType, TransactionType};

    type Service = LedgerService<Arc<InMemoryLedgerStore>, InMemoryProductCatalog>;

    struct Fixture {
        service: Service,
        company: TenantId,
        product: ProductId,
        store: StoreId,
    }

    impl Fixture {
        fn new(settings: LedgerSettings) -> Self {
            let service = LedgerService::new(
                Arc::new(InMemoryLedgerStore::new()),
                InMemoryProductCatalog::in_memory(),
                settings,
            );
            let company = TenantId::new();
            let product = ProductId::new();
            let units =
                ProductUnits::new(product, "case", Some("bottle".into()), Some(dec!(12))).unwrap();
            service
                .register_product(LedgerScope::company(company), company, units)
                .unwrap();
            Self {
                service,
                company,
                product,
                store: StoreId::new(),
            }
        }

        fn scope(&self) -> LedgerScope {
            LedgerScope::company(self.company)
        }

        fn request(&self, t: TransactionType, quantity: Decimal, day: u32) -> RecordTransaction {
            RecordTransaction {
                company_id: Some(self.company),
                transaction_type: Some(t),
                status: None,
                product_id: Some(self.product),
                from_store: Some(self.store),
                to_store: None,
                quantity: Some(quantity),
                measurement_type: None,
                total_price: None,
                date: Some(Utc.with_ymd_and_hms(2024, 7, day, 10, 0, 0).unwrap()),
                user: UserId::new(),
            }
        }
    }

    #[test]
    fn recorded_entry_carries_its_balance() {
        let f = Fixture::new(LedgerSettings::default());
        let recorded = f
            .service
            .record(f.scope(), f.request(TransactionType::Purchase, dec!(8), 1))
            .unwrap();
        assert_eq!(recorded.transaction.remaining, Some(dec!(8)));
        assert!(recorded.counterpart.is_none());
    }

    #[test]
    fn sub_unit_quantities_are_normalized() {
        let f = Fixture::new(LedgerSettings::default());
        let mut request = f.request(TransactionType::Purchase, dec!(6), 1);
        request.measurement_type = Some(MeasurementType::Sub);
        let recorded = f.service.record(f.scope(), request).unwrap();
        assert_eq!(recorded.transaction.quantity, dec!(0.5));
        assert_eq!(recorded.transaction.original_quantity, dec!(6));
        assert_eq!(recorded.transaction.remaining, Some(dec!(0.5)));
    }

    #[test]
    fn unknown_product_is_not_found() {
        let f = Fixture::new(LedgerSettings::default());
        let mut request = f.request(TransactionType::Purchase, dec!(1), 1);
        request.product_id = Some(ProductId::new());
        assert!(matches!(
            f.service.record(f.scope(), request),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn validation_runs_before_anything_is_written() {
        let f = Fixture::new(LedgerSettings::default());
        let mut request = f.request(TransactionType::Purchase, dec!(1), 1);
        request.date = None;
        assert!(matches!(
            f.service.record(f.scope(), request),
            Err(LedgerError::Validation(_))
        ));
        let page = f
            .service
            .list(f.scope(), &TransactionFilter::default(), Pagination::default())
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[test]
    fn enforcement_can_be_disabled() {
        let f = Fixture::new(LedgerSettings {
            enforce_availability: false,
        });
        let recorded = f
            .service
            .record(f.scope(), f.request(TransactionType::Waste, dec!(3), 1))
            .unwrap();
        assert_eq!(recorded.transaction.remaining, Some(dec!(-3)));
    }

    #[test]
    fn pending_outgoing_is_not_checked_against_stock() {
        let f = Fixture::new(LedgerSettings::default());
        let mut request = f.request(TransactionType::Sale, dec!(3), 1);
        request.status = Some(TransactionStatus::Pending);
        let recorded = f.service.record(f.scope(), request).unwrap();
        assert_eq!(recorded.transaction.status, TransactionStatus::Pending);
        assert_eq!(recorded.transaction.remaining, None);
    }

    #[test]
    fn unchanged_status_is_a_no_op() {
        let f = Fixture::new(LedgerSettings::default());
        let recorded = f
            .service
            .record(f.scope(), f.request(TransactionType::Purchase, dec!(2), 1))
            .unwrap();
        let again = f
            .service
            .set_status(f.scope(), recorded.transaction.id, TransactionStatus::Done)
            .unwrap();
        assert_eq!(again.transaction.revision, recorded.transaction.revision);
    }
}
