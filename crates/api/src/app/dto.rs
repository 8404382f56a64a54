use core::fmt::Display;
use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockbook_auth::{CommandAuthorization, Permission};
use stockbook_core::{ProductId, StoreId, TenantId, UserId};
use stockbook_infra::{LedgerError, Pagination, TransactionFilter};
use stockbook_inventory::{
    Availability, LedgerTransaction, MeasurementType, ProductUnits, RecordTransaction,
    TransactionStatus, TransactionType,
};

// -------------------------
// Parsing helpers
// -------------------------

/// Parse an optional textual field, reporting the field name on failure.
fn parse_opt<T>(field: &str, value: Option<&str>) -> Result<Option<T>, LedgerError>
where
    T: FromStr,
    T::Err: Display,
{
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| LedgerError::validation(format!("{field}: {e}"))),
    }
}

fn parse_required<T>(field: &str, value: Option<&str>) -> Result<T, LedgerError>
where
    T: FromStr,
    T::Err: Display,
{
    parse_opt(field, value)?
        .ok_or_else(|| LedgerError::validation(format!("missing required field: {field}")))
}

/// RFC 3339 timestamp, or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| LedgerError::validation("date must be RFC 3339 or YYYY-MM-DD"))
}

static CREATE: [Permission; 1] = [Permission::LEDGER_TRANSACTIONS_CREATE];
static READ: [Permission; 1] = [Permission::LEDGER_TRANSACTIONS_READ];
static STATUS: [Permission; 1] = [Permission::LEDGER_TRANSACTIONS_STATUS];
static RECALCULATE: [Permission; 1] = [Permission::LEDGER_RECALCULATE];
static AVAILABILITY: [Permission; 1] = [Permission::LEDGER_AVAILABILITY_READ];
static PRODUCTS: [Permission; 1] = [Permission::PRODUCTS_MANAGE];

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /ledger/transactions`.
///
/// Identifiers and enums arrive as strings so that malformed values surface
/// as validation errors naming the field.
#[derive(Debug, Default, Deserialize)]
pub struct RecordTransactionRequest {
    pub company_id: Option<String>,
    pub transaction_type: Option<String>,
    pub status: Option<String>,
    pub product_id: Option<String>,
    pub from_store: Option<String>,
    pub to_store: Option<String>,
    pub quantity: Option<Decimal>,
    pub measurement_type: Option<String>,
    pub total_price: Option<Decimal>,
    pub date: Option<String>,
}

impl CommandAuthorization for RecordTransactionRequest {
    fn required_permissions(&self) -> &[Permission] {
        &CREATE
    }
}

impl RecordTransactionRequest {
    pub fn company_id(&self) -> Result<Option<TenantId>, LedgerError> {
        parse_opt("company_id", self.company_id.as_deref())
    }

    pub fn into_command(
        self,
        company_id: TenantId,
        user: UserId,
    ) -> Result<RecordTransaction, LedgerError> {
        Ok(RecordTransaction {
            company_id: Some(company_id),
            transaction_type: parse_opt::<TransactionType>(
                "transaction_type",
                self.transaction_type.as_deref(),
            )?,
            status: parse_opt::<TransactionStatus>("status", self.status.as_deref())?,
            product_id: parse_opt::<ProductId>("product_id", self.product_id.as_deref())?,
            from_store: parse_opt::<StoreId>("from_store", self.from_store.as_deref())?,
            to_store: parse_opt::<StoreId>("to_store", self.to_store.as_deref())?,
            quantity: self.quantity,
            measurement_type: parse_opt::<MeasurementType>(
                "measurement_type",
                self.measurement_type.as_deref(),
            )?,
            total_price: self.total_price,
            date: self.date.as_deref().map(parse_date).transpose()?,
            user,
        })
    }
}

/// Body of `POST /ledger/transactions/:id/status`.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: Option<String>,
}

impl CommandAuthorization for SetStatusRequest {
    fn required_permissions(&self) -> &[Permission] {
        &STATUS
    }
}

impl SetStatusRequest {
    pub fn status(&self) -> Result<TransactionStatus, LedgerError> {
        parse_required("status", self.status.as_deref())
    }
}

/// Query of `GET /ledger/transactions`.
#[derive(Debug, Default, Deserialize)]
pub struct ListTransactionsQuery {
    pub company_id: Option<String>,
    pub product_id: Option<String>,
    pub store_id: Option<String>,
    pub transaction_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl CommandAuthorization for ListTransactionsQuery {
    fn required_permissions(&self) -> &[Permission] {
        &READ
    }
}

impl ListTransactionsQuery {
    pub fn company_id(&self) -> Result<Option<TenantId>, LedgerError> {
        parse_opt("company_id", self.company_id.as_deref())
    }

    pub fn filter(&self) -> Result<TransactionFilter, LedgerError> {
        Ok(TransactionFilter {
            product_id: parse_opt("product_id", self.product_id.as_deref())?,
            store_id: parse_opt("store_id", self.store_id.as_deref())?,
            transaction_type: parse_opt("transaction_type", self.transaction_type.as_deref())?,
            status: parse_opt("status", self.status.as_deref())?,
        })
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

/// Body of `POST /ledger/recalculate`.
#[derive(Debug, Default, Deserialize)]
pub struct RecalculateRequest {
    pub company_id: Option<String>,
    pub product_id: Option<String>,
    pub store_id: Option<String>,
}

impl CommandAuthorization for RecalculateRequest {
    fn required_permissions(&self) -> &[Permission] {
        &RECALCULATE
    }
}

impl RecalculateRequest {
    pub fn company_id(&self) -> Result<Option<TenantId>, LedgerError> {
        parse_opt("company_id", self.company_id.as_deref())
    }

    pub fn target(&self) -> Result<(ProductId, StoreId), LedgerError> {
        Ok((
            parse_required("product_id", self.product_id.as_deref())?,
            parse_required("store_id", self.store_id.as_deref())?,
        ))
    }
}

/// Query of `POST /ledger/recalculate-all`.
#[derive(Debug, Default, Deserialize)]
pub struct RecalculateAllQuery {
    pub company_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl CommandAuthorization for RecalculateAllQuery {
    fn required_permissions(&self) -> &[Permission] {
        &RECALCULATE
    }
}

impl RecalculateAllQuery {
    pub fn company_id(&self) -> Result<Option<TenantId>, LedgerError> {
        parse_opt("company_id", self.company_id.as_deref())
    }
}

/// Query of `GET /ledger/availability`.
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub company_id: Option<String>,
    pub product_id: Option<String>,
    pub store_id: Option<String>,
    pub quantity: Option<String>,
}

impl CommandAuthorization for AvailabilityQuery {
    fn required_permissions(&self) -> &[Permission] {
        &AVAILABILITY
    }
}

impl AvailabilityQuery {
    pub fn company_id(&self) -> Result<Option<TenantId>, LedgerError> {
        parse_opt("company_id", self.company_id.as_deref())
    }

    pub fn target(&self) -> Result<(ProductId, StoreId, Decimal), LedgerError> {
        Ok((
            parse_required("product_id", self.product_id.as_deref())?,
            parse_required("store_id", self.store_id.as_deref())?,
            parse_required("quantity", self.quantity.as_deref())?,
        ))
    }
}

/// Body of `POST /products`.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterProductRequest {
    pub company_id: Option<String>,
    /// Generated when absent.
    pub product_id: Option<String>,
    pub measurement_name: Option<String>,
    pub sub_measurement_name: Option<String>,
    pub sub_measurement_value: Option<Decimal>,
}

impl CommandAuthorization for RegisterProductRequest {
    fn required_permissions(&self) -> &[Permission] {
        &PRODUCTS
    }
}

impl RegisterProductRequest {
    pub fn company_id(&self) -> Result<Option<TenantId>, LedgerError> {
        parse_opt("company_id", self.company_id.as_deref())
    }

    pub fn into_units(self) -> Result<ProductUnits, LedgerError> {
        let product_id = parse_opt("product_id", self.product_id.as_deref())?
            .unwrap_or_else(ProductId::new);
        let measurement_name = self
            .measurement_name
            .ok_or_else(|| LedgerError::validation("missing required field: measurement_name"))?;
        Ok(ProductUnits::new(
            product_id,
            measurement_name,
            self.sub_measurement_name,
            self.sub_measurement_value,
        )?)
    }
}

/// Query of `GET /products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductsQuery {
    pub company_id: Option<String>,
}

impl CommandAuthorization for ProductsQuery {
    fn required_permissions(&self) -> &[Permission] {
        &PRODUCTS
    }
}

impl ProductsQuery {
    pub fn company_id(&self) -> Result<Option<TenantId>, LedgerError> {
        parse_opt("company_id", self.company_id.as_deref())
    }
}

// -------------------------
// Response DTOs
// -------------------------

/// `{success, message, data}` envelope of the recalculation endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub message: String,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageInfo>,
}

#[derive(Debug, Serialize)]
pub struct PageInfo {
    pub offset: u32,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
    pub next_offset: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub items: Vec<LedgerTransaction>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub requested: Decimal,
    pub remaining: Decimal,
    pub last_transaction: Option<LedgerTransaction>,
}

impl From<Availability> for AvailabilityResponse {
    fn from(a: Availability) -> Self {
        Self {
            available: a.available,
            requested: a.requested,
            remaining: a.remaining,
            last_transaction: a.latest_transaction,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductUnitsResponse {
    pub company_id: TenantId,
    #[serde(flatten)]
    pub units: ProductUnits,
}
