//! Service wiring: one store shared by every service.

use anyhow::Context;

use shelfwise_infra::config::CatalogSettings;
use shelfwise_infra::{
    BusinessService, CatalogStore, CollectionHierarchyManager, ItemService, Settings,
    SqliteCatalogStore, UserDirectory,
};

/// All catalog services over one store.
#[derive(Debug, Clone)]
pub struct App<S> {
    pub businesses: BusinessService<S>,
    pub collections: CollectionHierarchyManager<S>,
    pub items: ItemService<S>,
    pub users: UserDirectory<S>,
}

impl<S> App<S>
where
    S: CatalogStore + Clone,
{
    pub fn new(store: S, catalog: &CatalogSettings) -> Self {
        Self {
            businesses: BusinessService::new(store.clone()),
            collections: CollectionHierarchyManager::new(store.clone())
                .with_predefined(catalog.predefined_parents())
                .with_delete_policy(catalog.on_parent_delete),
            items: ItemService::new(store.clone()),
            users: UserDirectory::new(store),
        }
    }
}

/// Open the configured SQLite database, apply the schema and wire the services.
pub async fn connect(settings: &Settings) -> anyhow::Result<App<SqliteCatalogStore>> {
    let store = SqliteCatalogStore::connect(&settings.database.url, settings.database.max_connections)
        .await
        .with_context(|| format!("failed to open database at {}", settings.database.url))?;
    store.migrate().await.context("failed to apply schema")?;
    tracing::debug!(url = %settings.database.url, "database ready");
    Ok(App::new(store, &settings.catalog))
}
