//! Integration tests for the catalog services over both stores.
//!
//! Every scenario runs against the in-memory store and an in-memory SQLite
//! database.
//!
//! Verifies:
//! - predefined parents are created once per business and then reused
//! - the self-parent guard and orphaning on parent deletion
//! - role-based listing visibility
//! - parent synthesis failures degrade to "no parent", child insert
//!   failures leave nothing behind
//! - cascading deletes of items and collections
//! - items follow their collection to another business

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use shelfwise_auth::Role;
    use shelfwise_catalog::{
        Business, BusinessDraft, Collection, CollectionChanges, CollectionDraft, Item, ItemDraft,
        NewCollection, ParentRef, User, UserDraft, AUTO_PARENT_DESCRIPTION,
    };
    use shelfwise_core::{BusinessId, CollectionId, ItemId, UserId};

    use crate::services::{
        BusinessService, CatalogError, CollectionHierarchyManager, ItemService,
    };
    use crate::store::{
        BusinessFilter, CatalogStore, CatalogTx, InMemoryCatalogStore, SqliteCatalogStore,
        StoreError, StoreResult,
    };

    /// Runs an async scenario once per store implementation.
    macro_rules! on_both_stores {
        ($($name:ident),* $(,)?) => {
            mod in_memory {
                $(
                    #[tokio::test]
                    async fn $name() {
                        super::$name(super::InMemoryCatalogStore::new()).await;
                    }
                )*
            }

            mod sqlite {
                $(
                    #[tokio::test]
                    async fn $name() {
                        let store = super::SqliteCatalogStore::in_memory().await.unwrap();
                        super::$name(store).await;
                    }
                )*
            }
        };
    }

    on_both_stores!(
        predefined_parent_is_created_once,
        predefined_parents_are_per_business,
        self_parent_update_clears_parent,
        deleted_parent_leaves_child_readable,
        admin_sees_all_collections,
        user_sees_member_businesses_only,
        failed_parent_synthesis_degrades_to_no_parent,
        failed_child_insert_leaves_no_parent_behind,
        deleting_collection_deletes_its_items,
        deleting_business_cascades,
        moving_collection_moves_its_items,
    );

    async fn business<S: CatalogStore + Clone>(store: &S, name: &str) -> Business {
        BusinessService::new(store.clone())
            .create(BusinessDraft::new(name))
            .await
            .unwrap()
    }

    async fn all_collections<S: CatalogStore>(store: &S) -> Vec<Collection> {
        let mut tx = store.begin().await.unwrap();
        let rows = tx.list_collections(None).await.unwrap();
        tx.commit().await.unwrap();
        rows
    }

    fn under(business_id: BusinessId, name: &str, parent: ParentRef) -> CollectionDraft {
        CollectionDraft::new(business_id, name).with_parent(parent)
    }

    fn shoes() -> ParentRef {
        ParentRef::Predefined("shoes".to_string())
    }

    async fn predefined_parent_is_created_once<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let manager = CollectionHierarchyManager::new(store.clone());

        let boots = manager.create(under(acme.id, "Boots", shoes())).await.unwrap();
        let rows = all_collections(&store).await;
        assert_eq!(rows.len(), 2);
        let parent = rows.iter().find(|c| c.name == "Shoes").expect("synthesized parent");
        assert_eq!(boots.parent_id, Some(parent.id));
        assert_eq!(parent.description.as_deref(), Some(AUTO_PARENT_DESCRIPTION));
        assert!(parent.active);

        let sneakers = manager
            .create(under(acme.id, "Sneakers", ParentRef::parse(Some("Shoes"))))
            .await
            .unwrap();
        assert_eq!(sneakers.parent_id, Some(parent.id));
        let rows = all_collections(&store).await;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.iter().filter(|c| c.name == "Shoes").count(), 1);
    }

    async fn predefined_parents_are_per_business<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let globex = business(&store, "Globex").await;
        let manager = CollectionHierarchyManager::new(store.clone());

        let a = manager.create(under(acme.id, "Boots", shoes())).await.unwrap();
        let g = manager.create(under(globex.id, "Boots", shoes())).await.unwrap();
        assert_ne!(a.parent_id, g.parent_id);

        let parent = manager.get(g.id).await.unwrap().parent.expect("parent");
        let parent = manager.get(parent.id).await.unwrap();
        assert_eq!(parent.collection.business_id, globex.id);
    }

    async fn self_parent_update_clears_parent<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let manager = CollectionHierarchyManager::new(store.clone());
        let root = manager
            .create(under(acme.id, "Shoes", ParentRef::Absent))
            .await
            .unwrap();
        let child = manager
            .create(under(acme.id, "Boots", ParentRef::Id(root.id)))
            .await
            .unwrap();

        for id in [child.id, root.id] {
            let updated = manager
                .update(id, CollectionChanges::default().parent(Some(id)))
                .await
                .unwrap();
            assert_eq!(updated.parent_id, None);
        }
    }

    async fn deleted_parent_leaves_child_readable<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let manager = CollectionHierarchyManager::new(store.clone());
        let parent = manager
            .create(under(acme.id, "Shoes", ParentRef::Absent))
            .await
            .unwrap();
        let child = manager
            .create(under(acme.id, "Boots", ParentRef::Id(parent.id)))
            .await
            .unwrap();

        let deleted = manager.delete(parent.id).await.unwrap();
        assert_eq!(deleted.id, parent.id);

        let view = manager.get(child.id).await.unwrap();
        assert_eq!(view.parent, None);
        assert_eq!(view.collection.parent_id, Some(parent.id));
        assert_eq!(view.business_name.as_deref(), Some("Acme"));
    }

    async fn admin_sees_all_collections<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let globex = business(&store, "Globex").await;
        let manager = CollectionHierarchyManager::new(store.clone());
        manager.create(under(acme.id, "Boots", ParentRef::Absent)).await.unwrap();
        manager.create(under(globex.id, "Hats", ParentRef::Absent)).await.unwrap();

        let views = manager.list_for_tenant(&Role::ADMIN, &[]).await.unwrap();
        assert_eq!(views.len(), 2);
    }

    async fn user_sees_member_businesses_only<S: CatalogStore + Clone>(store: S) {
        let mut businesses = Vec::new();
        for name in ["A", "B", "C", "D", "E"] {
            businesses.push(business(&store, name).await);
        }
        let fifth = businesses[4].id;
        let manager = CollectionHierarchyManager::new(store.clone());
        for b in &businesses {
            manager.create(under(b.id, "Boots", ParentRef::Absent)).await.unwrap();
        }

        let views = manager.list_for_tenant(&Role::USER, &[fifth]).await.unwrap();
        assert_eq!(views.len(), 1);
        assert!(views.iter().all(|v| v.collection.business_id == fifth));
        assert_eq!(views[0].business_name.as_deref(), Some("E"));

        assert!(manager.list_for_tenant(&Role::USER, &[]).await.unwrap().is_empty());
        assert!(manager
            .list_for_tenant(&Role::new("guest"), &[fifth])
            .await
            .unwrap()
            .is_empty());
    }

    async fn failed_parent_synthesis_degrades_to_no_parent<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let failing = FailingInserts::new(store.clone(), |new| {
            new.description.as_deref() == Some(AUTO_PARENT_DESCRIPTION)
        });
        let manager = CollectionHierarchyManager::new(failing);

        let boots = manager.create(under(acme.id, "Boots", shoes())).await.unwrap();
        assert_eq!(boots.parent_id, None);

        let rows = all_collections(&store).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Boots");
    }

    async fn failed_child_insert_leaves_no_parent_behind<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let failing = FailingInserts::new(store.clone(), |new| new.name == "Boots");
        let manager = CollectionHierarchyManager::new(failing);

        let err = manager
            .create(under(acme.id, "Boots", shoes()))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Persistence(_)));
        assert!(all_collections(&store).await.is_empty());
    }

    async fn deleting_collection_deletes_its_items<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let manager = CollectionHierarchyManager::new(store.clone());
        let items = ItemService::new(store.clone());
        let boots = manager
            .create(under(acme.id, "Boots", ParentRef::Absent))
            .await
            .unwrap();
        let hats = manager
            .create(under(acme.id, "Hats", ParentRef::Absent))
            .await
            .unwrap();
        let boot = items
            .create(ItemDraft::new(acme.id, boots.id, "Chelsea boot"))
            .await
            .unwrap();
        let hat = items
            .create(ItemDraft::new(acme.id, hats.id, "Fedora"))
            .await
            .unwrap();

        manager.delete(boots.id).await.unwrap();
        assert!(matches!(
            items.get(boot.id).await,
            Err(CatalogError::NotFound { .. })
        ));
        assert!(items.get(hat.id).await.is_ok());
    }

    async fn deleting_business_cascades<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let globex = business(&store, "Globex").await;
        let manager = CollectionHierarchyManager::new(store.clone());
        let items = ItemService::new(store.clone());
        let boots = manager.create(under(acme.id, "Boots", shoes())).await.unwrap();
        items
            .create(ItemDraft::new(acme.id, boots.id, "Chelsea boot"))
            .await
            .unwrap();
        let hats = manager
            .create(under(globex.id, "Hats", ParentRef::Absent))
            .await
            .unwrap();

        BusinessService::new(store.clone()).delete(acme.id).await.unwrap();

        let remaining = all_collections(&store).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, hats.id);
        assert!(items.list_for_tenant(&Role::ADMIN, &[]).await.unwrap().is_empty());
    }

    async fn moving_collection_moves_its_items<S: CatalogStore + Clone>(store: S) {
        let acme = business(&store, "Acme").await;
        let globex = business(&store, "Globex").await;
        let manager = CollectionHierarchyManager::new(store.clone());
        let items = ItemService::new(store.clone());
        let boots = manager
            .create(under(acme.id, "Boots", ParentRef::Absent))
            .await
            .unwrap();
        let boot = items
            .create(ItemDraft::new(acme.id, boots.id, "Chelsea boot"))
            .await
            .unwrap();

        manager
            .update(boots.id, CollectionChanges::default().business(globex.id))
            .await
            .unwrap();

        let moved = items.get(boot.id).await.unwrap();
        assert_eq!(moved.item.business_id, globex.id);
        assert_eq!(moved.business_name.as_deref(), Some("Globex"));
        assert_eq!(moved.collection_name.as_deref(), Some("Boots"));

        assert!(items.list_for_tenant(&Role::USER, &[acme.id]).await.unwrap().is_empty());
        let visible = items.list_for_tenant(&Role::USER, &[globex.id]).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].collection_name.as_deref(), Some("Boots"));
    }

    /// Store wrapper whose transactions fail `insert_collection` for rows
    /// matching a predicate, and delegate everything else.
    #[derive(Clone)]
    struct FailingInserts<S> {
        inner: S,
        fails: fn(&NewCollection) -> bool,
    }

    impl<S> FailingInserts<S> {
        fn new(inner: S, fails: fn(&NewCollection) -> bool) -> Self {
            Self { inner, fails }
        }
    }

    #[async_trait]
    impl<S: CatalogStore> CatalogStore for FailingInserts<S> {
        async fn begin(&self) -> StoreResult<Box<dyn CatalogTx>> {
            let inner = self.inner.begin().await?;
            Ok(Box::new(FailingTx {
                inner,
                fails: self.fails,
            }))
        }
    }

    struct FailingTx {
        inner: Box<dyn CatalogTx>,
        fails: fn(&NewCollection) -> bool,
    }

    #[async_trait]
    impl CatalogTx for FailingTx {
        async fn insert_business(&mut self, draft: &BusinessDraft) -> StoreResult<Business> {
            self.inner.insert_business(draft).await
        }
        async fn get_business(&mut self, id: BusinessId) -> StoreResult<Option<Business>> {
            self.inner.get_business(id).await
        }
        async fn list_businesses(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Business>> {
            self.inner.list_businesses(filter).await
        }
        async fn update_business(&mut self, business: &Business) -> StoreResult<Business> {
            self.inner.update_business(business).await
        }
        async fn delete_business(&mut self, id: BusinessId) -> StoreResult<bool> {
            self.inner.delete_business(id).await
        }
        async fn insert_collection(&mut self, new: &NewCollection) -> StoreResult<Collection> {
            if (self.fails)(new) {
                return Err(StoreError::Backend(format!("injected failure for {}", new.name)));
            }
            self.inner.insert_collection(new).await
        }
        async fn get_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>> {
            self.inner.get_collection(id).await
        }
        async fn find_collection_by_name(
            &mut self,
            business_id: BusinessId,
            name: &str,
        ) -> StoreResult<Option<Collection>> {
            self.inner.find_collection_by_name(business_id, name).await
        }
        async fn list_collections(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Collection>> {
            self.inner.list_collections(filter).await
        }
        async fn list_children(&mut self, parent_id: CollectionId) -> StoreResult<Vec<Collection>> {
            self.inner.list_children(parent_id).await
        }
        async fn update_collection(&mut self, collection: &Collection) -> StoreResult<Collection> {
            self.inner.update_collection(collection).await
        }
        async fn delete_collection(&mut self, id: CollectionId) -> StoreResult<bool> {
            self.inner.delete_collection(id).await
        }
        async fn detach_children(&mut self, parent_id: CollectionId) -> StoreResult<u64> {
            self.inner.detach_children(parent_id).await
        }
        async fn insert_item(&mut self, draft: &ItemDraft) -> StoreResult<Item> {
            self.inner.insert_item(draft).await
        }
        async fn get_item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
            self.inner.get_item(id).await
        }
        async fn list_items(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Item>> {
            self.inner.list_items(filter).await
        }
        async fn update_item(&mut self, item: &Item) -> StoreResult<Item> {
            self.inner.update_item(item).await
        }
        async fn delete_item(&mut self, id: ItemId) -> StoreResult<bool> {
            self.inner.delete_item(id).await
        }
        async fn reassign_items(
            &mut self,
            collection_id: CollectionId,
            business_id: BusinessId,
        ) -> StoreResult<u64> {
            self.inner.reassign_items(collection_id, business_id).await
        }
        async fn insert_user(&mut self, draft: &UserDraft) -> StoreResult<User> {
            self.inner.insert_user(draft).await
        }
        async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
            self.inner.get_user(id).await
        }
        async fn list_users(&mut self) -> StoreResult<Vec<User>> {
            self.inner.list_users().await
        }
        async fn attach_member(&mut self, user_id: UserId, business_id: BusinessId) -> StoreResult<bool> {
            self.inner.attach_member(user_id, business_id).await
        }
        async fn detach_member(&mut self, user_id: UserId, business_id: BusinessId) -> StoreResult<bool> {
            self.inner.detach_member(user_id, business_id).await
        }
        async fn business_ids_of(&mut self, user_id: UserId) -> StoreResult<Vec<BusinessId>> {
            self.inner.business_ids_of(user_id).await
        }
        async fn member_count(&mut self, business_id: BusinessId) -> StoreResult<u64> {
            self.inner.member_count(business_id).await
        }
        async fn savepoint(&mut self, name: &'static str) -> StoreResult<()> {
            self.inner.savepoint(name).await
        }
        async fn rollback_to_savepoint(&mut self, name: &'static str) -> StoreResult<()> {
            self.inner.rollback_to_savepoint(name).await
        }
        async fn release_savepoint(&mut self, name: &'static str) -> StoreResult<()> {
            self.inner.release_savepoint(name).await
        }
        async fn commit(&mut self) -> StoreResult<()> {
            self.inner.commit().await
        }
        async fn rollback(&mut self) -> StoreResult<()> {
            self.inner.rollback().await
        }
    }
}
