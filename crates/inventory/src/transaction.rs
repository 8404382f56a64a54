use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_core::{
    DomainError, DomainResult, Entity, ProductId, StoreId, TenantId, TransactionId, TransferId,
    UserId,
};

use crate::measurement::ProductUnits;

/// Kind of stock movement. Determines the sign of the quantity change.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Purchase,
    Use,
    Sale,
    Send,
    Receive,
    Waste,
}

impl TransactionType {
    pub const ALL: [TransactionType; 6] = [
        TransactionType::Purchase,
        TransactionType::Use,
        TransactionType::Sale,
        TransactionType::Send,
        TransactionType::Receive,
        TransactionType::Waste,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Purchase => "purchase",
            TransactionType::Use => "use",
            TransactionType::Sale => "sale",
            TransactionType::Send => "send",
            TransactionType::Receive => "receive",
            TransactionType::Waste => "waste",
        }
    }

    /// Inbound movements increase the balance of the store they are recorded at.
    pub fn is_inbound(self) -> bool {
        matches!(self, TransactionType::Purchase | TransactionType::Receive)
    }

    /// Outgoing movements must be covered by available stock.
    pub fn is_outgoing(self) -> bool {
        !self.is_inbound()
    }

    /// Apply the movement's sign to a (positive) quantity.
    pub fn signed(self, quantity: Decimal) -> Decimal {
        if self.is_inbound() { quantity } else { -quantity }
    }
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                DomainError::validation(
                    "transaction_type must be one of: purchase, use, sale, send, receive, waste",
                )
            })
    }
}

/// Only `Done` entries count toward the balance.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Done,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Done => "done",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "done" => Ok(TransactionStatus::Done),
            _ => Err(DomainError::validation("status must be one of: pending, done")),
        }
    }
}

/// Unit the quantity was entered in.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    #[default]
    Main,
    Sub,
}

impl FromStr for MeasurementType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(MeasurementType::Main),
            "sub" => Ok(MeasurementType::Sub),
            _ => Err(DomainError::validation("measurement_type must be one of: main, sub")),
        }
    }
}

/// A running balance belongs to exactly one (company, product, store) triple.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LedgerKey {
    pub company_id: TenantId,
    pub product_id: ProductId,
    pub store_id: StoreId,
}

impl LedgerKey {
    pub fn new(company_id: TenantId, product_id: ProductId, store_id: StoreId) -> Self {
        Self {
            company_id,
            product_id,
            store_id,
        }
    }
}

impl core::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}/{}", self.company_id, self.product_id, self.store_id)
    }
}

/// A persisted ledger entry.
///
/// `remaining` and `remaining_after_transfer` are derived by replay and are
/// `None` until the entry has been recalculated (and always `None` while the
/// entry is pending).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: TransactionId,
    pub company_id: TenantId,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub product_id: ProductId,
    pub from_store: StoreId,
    pub to_store: Option<StoreId>,
    pub transfer_id: Option<TransferId>,

    /// Quantity in the product's main unit (always positive).
    pub quantity: Decimal,
    pub original_quantity: Decimal,
    pub measurement_type: MeasurementType,
    pub measurement_unit: String,
    /// Sub units per main unit (1 for main-unit entries).
    pub conversion_rate: Decimal,

    pub total_price: Option<Decimal>,
    pub remaining: Option<Decimal>,
    pub remaining_after_transfer: Option<Decimal>,

    /// Business date; the replay ordering key.
    pub date: DateTime<Utc>,
    /// Store-assigned insertion order; breaks ties between equal dates.
    pub sequence: u64,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub user: UserId,
}

impl LedgerTransaction {
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.company_id, self.product_id, self.from_store)
    }

    pub fn is_done(&self) -> bool {
        self.status == TransactionStatus::Done
    }

    pub fn signed_delta(&self) -> Decimal {
        self.transaction_type.signed(self.quantity)
    }

    /// Position of the entry in replay order.
    pub fn replay_position(&self) -> (DateTime<Utc>, u64) {
        (self.date, self.sequence)
    }
}

impl Entity for LedgerTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

/// A validated entry ready to be appended (not yet assigned a sequence number).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub id: TransactionId,
    pub company_id: TenantId,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub product_id: ProductId,
    pub from_store: StoreId,
    pub to_store: Option<StoreId>,
    pub transfer_id: Option<TransferId>,
    pub quantity: Decimal,
    pub original_quantity: Decimal,
    pub measurement_type: MeasurementType,
    pub measurement_unit: String,
    pub conversion_rate: Decimal,
    pub total_price: Option<Decimal>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub user: UserId,
}

impl NewTransaction {
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.company_id, self.product_id, self.from_store)
    }

    /// Materialize the stored record once the store has assigned `sequence`.
    pub fn into_stored(self, sequence: u64) -> LedgerTransaction {
        LedgerTransaction {
            id: self.id,
            company_id: self.company_id,
            transaction_type: self.transaction_type,
            status: self.status,
            product_id: self.product_id,
            from_store: self.from_store,
            to_store: self.to_store,
            transfer_id: self.transfer_id,
            quantity: self.quantity,
            original_quantity: self.original_quantity,
            measurement_type: self.measurement_type,
            measurement_unit: self.measurement_unit,
            conversion_rate: self.conversion_rate,
            total_price: self.total_price,
            remaining: None,
            remaining_after_transfer: None,
            date: self.date,
            sequence,
            revision: 1,
            created_at: self.created_at,
            user: self.user,
        }
    }
}

/// Request to record a stock movement, as received from a caller.
///
/// Identifying fields are optional here so that missing input surfaces as a
/// validation error instead of a decode failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTransaction {
    pub company_id: Option<TenantId>,
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub product_id: Option<ProductId>,
    pub from_store: Option<StoreId>,
    pub to_store: Option<StoreId>,
    /// Quantity as entered, in the unit named by `measurement_type`.
    pub quantity: Option<Decimal>,
    pub measurement_type: Option<MeasurementType>,
    pub total_price: Option<Decimal>,
    pub date: Option<DateTime<Utc>>,
    pub user: UserId,
}

/// A movement whose required fields are present and consistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRecord {
    pub company_id: TenantId,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub product_id: ProductId,
    pub from_store: StoreId,
    pub to_store: Option<StoreId>,
    pub quantity: Decimal,
    pub measurement_type: MeasurementType,
    pub total_price: Option<Decimal>,
    pub date: DateTime<Utc>,
    pub user: UserId,
}

fn required<T>(value: Option<T>, field: &str) -> DomainResult<T> {
    value.ok_or_else(|| DomainError::validation(format!("missing required field: {field}")))
}

impl RecordTransaction {
    /// Check required fields and cross-field rules.
    pub fn validate(self) -> DomainResult<ValidatedRecord> {
        let company_id = required(self.company_id, "company_id")?;
        let transaction_type = required(self.transaction_type, "transaction_type")?;
        let product_id = required(self.product_id, "product_id")?;
        let from_store = required(self.from_store, "from_store")?;
        let quantity = required(self.quantity, "quantity")?;
        let date = required(self.date, "date")?;

        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("quantity must be positive"));
        }

        match self.total_price {
            Some(_) if transaction_type != TransactionType::Purchase => {
                return Err(DomainError::validation(
                    "total_price is only accepted for purchase transactions",
                ));
            }
            Some(price) if price < Decimal::ZERO => {
                return Err(DomainError::validation("total_price cannot be negative"));
            }
            _ => {}
        }

        match (transaction_type, self.to_store) {
            (TransactionType::Send, None) => {
                return Err(DomainError::validation("send transactions require to_store"));
            }
            (TransactionType::Send, Some(to)) if to == from_store => {
                return Err(DomainError::validation("to_store must differ from from_store"));
            }
            (TransactionType::Send, Some(_)) => {}
            (_, Some(_)) => {
                return Err(DomainError::validation(
                    "to_store is only accepted for send transactions",
                ));
            }
            (_, None) => {}
        }

        Ok(ValidatedRecord {
            company_id,
            transaction_type,
            status: self.status.unwrap_or_default(),
            product_id,
            from_store,
            to_store: self.to_store,
            quantity,
            measurement_type: self.measurement_type.unwrap_or_default(),
            total_price: self.total_price,
            date,
            user: self.user,
        })
    }
}

impl ValidatedRecord {
    pub fn key(&self) -> LedgerKey {
        LedgerKey::new(self.company_id, self.product_id, self.from_store)
    }

    /// Key of the receiving store for transfers.
    pub fn destination_key(&self) -> Option<LedgerKey> {
        self.to_store
            .map(|to| LedgerKey::new(self.company_id, self.product_id, to))
    }

    /// Normalize the quantity and expand into ledger entries.
    ///
    /// A plain movement yields one entry. A transfer (`send` with `to_store`)
    /// yields the send leg followed by a `receive` leg at the destination, both
    /// sharing one `transfer_id`.
    pub fn into_legs(
        self,
        units: &ProductUnits,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Vec<NewTransaction>> {
        if units.product_id != self.product_id {
            return Err(DomainError::validation(
                "product units do not belong to the recorded product",
            ));
        }

        let normalized = units.normalize(self.quantity, self.measurement_type)?;
        let transfer_id = self.to_store.map(|_| TransferId::new());

        let primary = NewTransaction {
            id: TransactionId::new(),
            company_id: self.company_id,
            transaction_type: self.transaction_type,
            status: self.status,
            product_id: self.product_id,
            from_store: self.from_store,
            to_store: self.to_store,
            transfer_id,
            quantity: normalized.quantity,
            original_quantity: normalized.original_quantity,
            measurement_type: normalized.measurement_type,
            measurement_unit: normalized.measurement_unit.clone(),
            conversion_rate: normalized.conversion_rate,
            total_price: self.total_price,
            date: self.date,
            created_at,
            user: self.user,
        };

        let Some(to_store) = self.to_store else {
            return Ok(vec![primary]);
        };

        let receive = NewTransaction {
            id: TransactionId::new(),
            transaction_type: TransactionType::Receive,
            from_store: to_store,
            to_store: None,
            total_price: None,
            ..primary.clone()
        };

        Ok(vec![primary, receive])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn units(product_id: ProductId) -> ProductUnits {
        ProductUnits::new(product_id, "case", Some("bottle".to_string()), Some(dec!(12))).unwrap()
    }

    fn record(tx_type: TransactionType) -> RecordTransaction {
        RecordTransaction {
            company_id: Some(TenantId::new()),
            transaction_type: Some(tx_type),
            status: None,
            product_id: Some(ProductId::new()),
            from_store: Some(StoreId::new()),
            to_store: None,
            quantity: Some(dec!(5)),
            measurement_type: None,
            total_price: None,
            date: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            user: UserId::new(),
        }
    }

    #[test]
    fn signs_follow_transaction_type() {
        assert_eq!(TransactionType::Purchase.signed(dec!(3)), dec!(3));
        assert_eq!(TransactionType::Receive.signed(dec!(3)), dec!(3));
        for t in [
            TransactionType::Use,
            TransactionType::Sale,
            TransactionType::Send,
            TransactionType::Waste,
        ] {
            assert_eq!(t.signed(dec!(3)), dec!(-3), "{t} should decrease stock");
        }
    }

    #[test]
    fn transaction_type_parses_case_insensitively() {
        assert_eq!("SALE".parse::<TransactionType>().unwrap(), TransactionType::Sale);
        assert!("refund".parse::<TransactionType>().is_err());
        assert_eq!(" Sub ".parse::<MeasurementType>().unwrap(), MeasurementType::Sub);
        assert!("crate".parse::<MeasurementType>().is_err());
    }

    #[test]
    fn missing_identifying_fields_are_rejected() {
        let cases: Vec<(&str, Box<dyn Fn(&mut RecordTransaction)>)> = vec![
            ("company_id", Box::new(|r: &mut RecordTransaction| r.company_id = None)),
            ("transaction_type", Box::new(|r: &mut RecordTransaction| r.transaction_type = None)),
            ("product_id", Box::new(|r: &mut RecordTransaction| r.product_id = None)),
            ("from_store", Box::new(|r: &mut RecordTransaction| r.from_store = None)),
            ("quantity", Box::new(|r: &mut RecordTransaction| r.quantity = None)),
            ("date", Box::new(|r: &mut RecordTransaction| r.date = None)),
        ];

        for (field, clear) in cases {
            let mut r = record(TransactionType::Purchase);
            clear(&mut r);
            match r.validate() {
                Err(DomainError::Validation(msg)) => assert!(msg.contains(field), "{msg}"),
                other => panic!("expected validation error for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let mut r = record(TransactionType::Sale);
        r.quantity = Some(Decimal::ZERO);
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn total_price_only_for_purchases() {
        let mut r = record(TransactionType::Sale);
        r.total_price = Some(dec!(10));
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));

        let mut r = record(TransactionType::Purchase);
        r.total_price = Some(dec!(10));
        assert_eq!(r.validate().unwrap().total_price, Some(dec!(10)));
    }

    #[test]
    fn send_requires_distinct_destination() {
        let r = record(TransactionType::Send);
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));

        let mut r = record(TransactionType::Send);
        r.to_store = r.from_store;
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));

        let mut r = record(TransactionType::Use);
        r.to_store = Some(StoreId::new());
        assert!(matches!(r.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn status_defaults_to_done() {
        let v = record(TransactionType::Purchase).validate().unwrap();
        assert_eq!(v.status, TransactionStatus::Done);
        assert_eq!(v.measurement_type, MeasurementType::Main);
    }

    #[test]
    fn transfer_expands_into_linked_legs() {
        let mut r = record(TransactionType::Send);
        let to = StoreId::new();
        r.to_store = Some(to);
        r.measurement_type = Some(MeasurementType::Sub);
        r.quantity = Some(dec!(6));
        let v = r.validate().unwrap();
        let u = units(v.product_id);
        let from = v.from_store;

        let legs = v.into_legs(&u, Utc::now()).unwrap();
        assert_eq!(legs.len(), 2);

        let (send, receive) = (&legs[0], &legs[1]);
        assert_eq!(send.transaction_type, TransactionType::Send);
        assert_eq!(send.from_store, from);
        assert_eq!(send.to_store, Some(to));
        assert_eq!(receive.transaction_type, TransactionType::Receive);
        assert_eq!(receive.from_store, to);
        assert_eq!(receive.to_store, None);
        assert!(send.transfer_id.is_some());
        assert_eq!(send.transfer_id, receive.transfer_id);
        assert_ne!(send.id, receive.id);
        assert_eq!(send.quantity, dec!(0.5));
        assert_eq!(receive.quantity, dec!(0.5));
        assert_eq!(send.measurement_unit, "bottle");
    }

    #[test]
    fn units_for_another_product_are_rejected() {
        let v = record(TransactionType::Purchase).validate().unwrap();
        let u = units(ProductId::new());
        assert!(matches!(v.into_legs(&u, Utc::now()), Err(DomainError::Validation(_))));
    }

    #[test]
    fn stored_entry_starts_unrecalculated() {
        let v = record(TransactionType::Purchase).validate().unwrap();
        let u = units(v.product_id);
        let leg = v.into_legs(&u, Utc::now()).unwrap().remove(0);
        let stored = leg.into_stored(7);
        assert_eq!(stored.sequence, 7);
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.remaining, None);
        assert_eq!(stored.remaining_after_transfer, None);
    }

    #[test]
    fn wire_names_are_lowercase() {
        let json = serde_json::to_value(TransactionType::Receive).unwrap();
        assert_eq!(json, serde_json::json!("receive"));
        let json = serde_json::to_value(TransactionStatus::Pending).unwrap();
        assert_eq!(json, serde_json::json!("pending"));
    }
}
