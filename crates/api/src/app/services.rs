use std::sync::Arc;

use promisekit_catalog::Kit;
use promisekit_core::OrderId;
use promisekit_infra::{
    AppConfig, InMemoryStore, KitCatalog, OrderWorkflow, PostgresStore, StoreError,
};
use promisekit_orders::{Order, OrderForm, Rejection};

/// Storage backend plus the workflow running on top of it.
///
/// Selected once at startup from `USE_PERSISTENT_STORES`.
pub enum AppServices {
    InMemory {
        store: Arc<InMemoryStore>,
        workflow: OrderWorkflow<Arc<InMemoryStore>>,
    },
    Persistent {
        store: Arc<PostgresStore>,
        workflow: OrderWorkflow<Arc<PostgresStore>>,
    },
}

impl AppServices {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        let workflow = OrderWorkflow::new(Arc::clone(&store));
        AppServices::InMemory { store, workflow }
    }

    pub fn persistent(store: Arc<PostgresStore>) -> Self {
        let workflow = OrderWorkflow::new(Arc::clone(&store));
        AppServices::Persistent { store, workflow }
    }

    /// Route gate: does `slug` address a kit right now?
    pub async fn kit_exists(&self, slug: &str) -> Result<bool, StoreError> {
        match self {
            AppServices::InMemory { store, .. } => store.exists(slug).await,
            AppServices::Persistent { store, .. } => store.exists(slug).await,
        }
    }

    pub async fn list_kits(&self) -> Result<Vec<Kit>, StoreError> {
        match self {
            AppServices::InMemory { store, .. } => store.list_ordered_by_name().await,
            AppServices::Persistent { store, .. } => store.list_ordered_by_name().await,
        }
    }

    pub async fn new_form(&self, slug: &str) -> Result<(Kit, OrderForm), StoreError> {
        match self {
            AppServices::InMemory { workflow, .. } => workflow.new_form(slug).await,
            AppServices::Persistent { workflow, .. } => workflow.new_form(slug).await,
        }
    }

    pub async fn submit(
        &self,
        slug: &str,
        coupon_code_input: &str,
        form: OrderForm,
    ) -> Result<Order, Rejection> {
        match self {
            AppServices::InMemory { workflow, .. } => {
                workflow.submit(slug, coupon_code_input, form).await
            }
            AppServices::Persistent { workflow, .. } => {
                workflow.submit(slug, coupon_code_input, form).await
            }
        }
    }

    pub async fn find_order(&self, id: OrderId) -> Result<Order, StoreError> {
        match self {
            AppServices::InMemory { workflow, .. } => workflow.find_order(id).await,
            AppServices::Persistent { workflow, .. } => workflow.find_order(id).await,
        }
    }
}

pub async fn build_services(config: &AppConfig) -> Result<AppServices, StoreError> {
    if !config.use_persistent_stores {
        tracing::info!("using in-memory stores");
        return Ok(AppServices::in_memory(Arc::new(InMemoryStore::new())));
    }

    let database_url = config
        .database_url
        .as_deref()
        .ok_or_else(|| StoreError::Backend("DATABASE_URL is not configured".to_string()))?;

    let store = PostgresStore::connect(database_url, config.database_max_connections).await?;
    if config.run_migrations {
        store.migrate().await?;
        tracing::info!("database migrations applied");
    }

    Ok(AppServices::persistent(Arc::new(store)))
}
