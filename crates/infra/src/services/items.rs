use std::collections::HashMap;

use tracing::{info, instrument};

use shelfwise_auth::{visibility, Role};
use shelfwise_catalog::item::ensure_collection_matches;
use shelfwise_catalog::{Collection, Item, ItemChanges, ItemDraft, ItemView};
use shelfwise_core::{BusinessId, CollectionId, ItemId};

use super::{referenced_business, CatalogError, CatalogResult, ListScope};
use crate::store::{CatalogStore, CatalogTx};

/// Item management. Image files live in external storage; items only carry
/// the stored path.
#[derive(Debug, Clone)]
pub struct ItemService<S> {
    store: S,
}

impl<S> ItemService<S>
where
    S: CatalogStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, draft), fields(business_id = %draft.business_id), err)]
    pub async fn create(&self, draft: ItemDraft) -> CatalogResult<Item> {
        let draft = draft.validate()?;
        let mut tx = self.store.begin().await?;
        referenced_business(&mut *tx, draft.business_id).await?;
        let collection = referenced_collection(&mut *tx, draft.collection_id).await?;
        ensure_collection_matches(draft.business_id, &collection)?;

        let item = tx.insert_item(&draft).await?;
        tx.commit().await?;
        info!(item_id = %item.id, "item created");
        Ok(item)
    }

    pub async fn get(&self, id: ItemId) -> CatalogResult<ItemView> {
        let mut tx = self.store.begin().await?;
        let item = existing(&mut *tx, id).await?;
        let business_name = tx.get_business(item.business_id).await?.map(|b| b.name);
        let collection_name = tx.get_collection(item.collection_id).await?.map(|c| c.name);
        tx.commit().await?;
        Ok(ItemView {
            item,
            business_name,
            collection_name,
        })
    }

    #[instrument(skip(self, changes), err)]
    pub async fn update(&self, id: ItemId, changes: ItemChanges) -> CatalogResult<Item> {
        let mut tx = self.store.begin().await?;
        let mut item = existing(&mut *tx, id).await?;
        changes.apply_to(&mut item)?;

        if changes.business_id.is_some() {
            referenced_business(&mut *tx, item.business_id).await?;
        }
        if changes.business_id.is_some() || changes.collection_id.is_some() {
            let collection = referenced_collection(&mut *tx, item.collection_id).await?;
            ensure_collection_matches(item.business_id, &collection)?;
        }

        let updated = tx.update_item(&item).await?;
        tx.commit().await?;
        info!(item_id = %id, "item updated");
        Ok(updated)
    }

    /// Delete an item and return it, so the caller can discard the stored
    /// image.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: ItemId) -> CatalogResult<Item> {
        let mut tx = self.store.begin().await?;
        let item = existing(&mut *tx, id).await?;
        tx.delete_item(id).await?;
        tx.commit().await?;
        info!(item_id = %id, image_path = ?item.image_path, "item deleted");
        Ok(item)
    }

    pub async fn list_for_tenant(
        &self,
        role: &Role,
        business_ids: &[BusinessId],
    ) -> CatalogResult<Vec<ItemView>> {
        let scope = ListScope::from(&visibility(role, business_ids));
        let Some(filter) = scope.filter() else {
            return Ok(Vec::new());
        };

        let mut tx = self.store.begin().await?;
        let items = tx.list_items(filter).await?;
        let business_names: HashMap<BusinessId, String> = tx
            .list_businesses(filter)
            .await?
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect();
        let collection_names: HashMap<CollectionId, String> = tx
            .list_collections(filter)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        tx.commit().await?;

        Ok(items
            .into_iter()
            .map(|item| ItemView {
                business_name: business_names.get(&item.business_id).cloned(),
                collection_name: collection_names.get(&item.collection_id).cloned(),
                item,
            })
            .collect())
    }
}

async fn existing(tx: &mut dyn CatalogTx, id: ItemId) -> CatalogResult<Item> {
    tx.get_item(id)
        .await?
        .ok_or_else(|| CatalogError::not_found("item", id))
}

async fn referenced_collection(tx: &mut dyn CatalogTx, id: CollectionId) -> CatalogResult<Collection> {
    tx.get_collection(id)
        .await?
        .ok_or_else(|| CatalogError::Validation(format!("collection {id} does not exist")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCatalogStore;
    use shelfwise_catalog::{BusinessDraft, NewCollection};

    struct Fixture {
        service: ItemService<InMemoryCatalogStore>,
        acme: BusinessId,
        globex: BusinessId,
        boots: CollectionId,
    }

    async fn fixture() -> Fixture {
        let store = InMemoryCatalogStore::new();
        let mut tx = store.begin().await.unwrap();
        let acme = tx.insert_business(&BusinessDraft::new("Acme")).await.unwrap();
        let globex = tx.insert_business(&BusinessDraft::new("Globex")).await.unwrap();
        let boots = tx
            .insert_collection(&NewCollection {
                business_id: acme.id,
                name: "Boots".into(),
                description: None,
                parent_id: None,
                active: true,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        Fixture {
            service: ItemService::new(store),
            acme: acme.id,
            globex: globex.id,
            boots: boots.id,
        }
    }

    #[tokio::test]
    async fn item_view_names_its_owners() {
        let f = fixture().await;
        let item = f
            .service
            .create(ItemDraft::new(f.acme, f.boots, "Chelsea boot").with_image("items/1.png"))
            .await
            .unwrap();
        let view = f.service.get(item.id).await.unwrap();
        assert_eq!(view.business_name.as_deref(), Some("Acme"));
        assert_eq!(view.collection_name.as_deref(), Some("Boots"));

        let removed = f.service.delete(item.id).await.unwrap();
        assert_eq!(removed.image_path.as_deref(), Some("items/1.png"));
        assert!(matches!(
            f.service.get(item.id).await,
            Err(CatalogError::NotFound { entity: "item", .. })
        ));
    }

    #[tokio::test]
    async fn collection_must_belong_to_the_item_business() {
        let f = fixture().await;
        let err = f
            .service
            .create(ItemDraft::new(f.globex, f.boots, "Chelsea boot"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let err = f
            .service
            .create(ItemDraft::new(f.acme, CollectionId::new(99), "Chelsea boot"))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn moving_an_item_rechecks_the_collection() {
        let f = fixture().await;
        let item = f
            .service
            .create(ItemDraft::new(f.acme, f.boots, "Chelsea boot"))
            .await
            .unwrap();
        let changes = ItemChanges {
            business_id: Some(f.globex),
            ..ItemChanges::default()
        };
        assert!(matches!(
            f.service.update(item.id, changes).await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn listing_respects_visibility() {
        let f = fixture().await;
        f.service
            .create(ItemDraft::new(f.acme, f.boots, "Chelsea boot"))
            .await
            .unwrap();
        assert_eq!(f.service.list_for_tenant(&Role::ADMIN, &[]).await.unwrap().len(), 1);
        assert_eq!(
            f.service.list_for_tenant(&Role::USER, &[f.acme]).await.unwrap().len(),
            1
        );
        assert!(f
            .service
            .list_for_tenant(&Role::USER, &[f.globex])
            .await
            .unwrap()
            .is_empty());
    }
}
