//! Service wiring for the HTTP layer.

use std::sync::Arc;

use tracing::info;

use stockbook_infra::{InMemoryLedgerStore, InMemoryProductCatalog, LedgerService};

use crate::config::{ApiConfig, LedgerConfig};

pub type AppLedgerService = LedgerService<Arc<InMemoryLedgerStore>, Arc<InMemoryProductCatalog>>;

/// Everything the handlers need, shared behind one `Arc`.
#[derive(Debug)]
pub struct AppServices {
    pub ledger: AppLedgerService,
    pub ledger_config: LedgerConfig,
}

/// Build the in-memory service graph.
pub fn build_services(config: &ApiConfig) -> AppServices {
    let store = Arc::new(InMemoryLedgerStore::new());
    let catalog = Arc::new(InMemoryProductCatalog::in_memory());
    let settings = config.ledger_settings();

    info!(
        enforce_availability = settings.enforce_availability,
        recalculation_page_size = config.ledger.recalculation_page_size,
        "ledger services initialized (in-memory)"
    );

    AppServices {
        ledger: LedgerService::new(store, catalog, settings),
        ledger_config: config.ledger.clone(),
    }
}
