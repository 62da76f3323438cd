//! Collection Hierarchy Manager.
//!
//! Maintains the per-business forest of collections: create (with parent
//! synthesis from the predefined table), read, update (with the self-parent
//! guard), delete (following the configured [`DeletePolicy`]) and the
//! tenant-scoped listings.

use std::collections::{BTreeSet, HashMap};

use tracing::{error, info, instrument};

use shelfwise_auth::{Principal, Role, Visibility, visibility};
use shelfwise_catalog::hierarchy::synthetic_parent;
use shelfwise_catalog::{
    build_forest, plan_parent, Collection, CollectionChanges, CollectionDraft, CollectionNode,
    CollectionView, DeletePolicy, ParentPlan, ParentSummary, PredefinedParents,
};
use shelfwise_core::{BusinessId, CollectionId};

use super::{referenced_business, CatalogError, CatalogResult, ListScope};
use crate::store::{CatalogStore, CatalogTx, StoreResult};

const PARENT_SAVEPOINT: &str = "synthesize_parent";

/// Create/read/update/delete and listing of collections.
#[derive(Debug, Clone)]
pub struct CollectionHierarchyManager<S> {
    store: S,
    predefined: PredefinedParents,
    on_parent_delete: DeletePolicy,
}

impl<S> CollectionHierarchyManager<S>
where
    S: CatalogStore,
{
    /// Manager with the default predefined parents and the `orphan` policy.
    pub fn new(store: S) -> Self {
        Self {
            store,
            predefined: PredefinedParents::default(),
            on_parent_delete: DeletePolicy::default(),
        }
    }

    pub fn with_predefined(mut self, predefined: PredefinedParents) -> Self {
        self.predefined = predefined;
        self
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.on_parent_delete = policy;
        self
    }

    pub fn predefined(&self) -> &PredefinedParents {
        &self.predefined
    }

    /// Create a collection.
    ///
    /// A predefined parent key is resolved to the business's collection of
    /// that name, which is created first when missing. If creating it fails
    /// the collection is still created, without a parent.
    #[instrument(skip(self, draft), fields(business_id = %draft.business_id), err)]
    pub async fn create(&self, draft: CollectionDraft) -> CatalogResult<Collection> {
        let draft = draft.validate()?;
        let plan = plan_parent(&draft.parent, &self.predefined)?;

        let mut tx = self.store.begin().await?;
        referenced_business(&mut *tx, draft.business_id).await?;

        let parent_id = match plan {
            ParentPlan::Root => None,
            ParentPlan::Existing(id) => {
                if tx.get_collection(id).await?.is_none() {
                    return Err(CatalogError::Validation(format!(
                        "parent collection {id} does not exist"
                    )));
                }
                Some(id)
            }
            ParentPlan::Synthesize { name } => {
                synthesize_parent(&mut *tx, draft.business_id, &name).await?
            }
        };

        let collection = tx.insert_collection(&draft.into_new(parent_id)).await?;
        tx.commit().await?;

        info!(
            collection_id = %collection.id,
            parent_id = ?collection.parent_id,
            "collection created"
        );
        Ok(collection)
    }

    /// A collection with its business name and parent. A parent that no
    /// longer exists is reported as no parent.
    pub async fn get(&self, id: CollectionId) -> CatalogResult<CollectionView> {
        let mut tx = self.store.begin().await?;
        let collection = tx
            .get_collection(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("collection", id))?;

        let business_name = tx
            .get_business(collection.business_id)
            .await?
            .map(|b| b.name);
        let parent = match collection.parent_id {
            Some(parent_id) => tx
                .get_collection(parent_id)
                .await?
                .map(|p| ParentSummary::from(&p)),
            None => None,
        };
        tx.commit().await?;

        Ok(CollectionView {
            collection,
            business_name,
            parent,
        })
    }

    /// Apply `changes` to a collection. Setting the parent to the collection
    /// itself clears the parent instead. Moving a collection to another
    /// business moves its items along.
    #[instrument(skip(self, changes), err)]
    pub async fn update(
        &self,
        id: CollectionId,
        changes: CollectionChanges,
    ) -> CatalogResult<Collection> {
        let mut tx = self.store.begin().await?;
        let mut collection = tx
            .get_collection(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("collection", id))?;

        let previous_business = collection.business_id;
        changes.apply_to(&mut collection)?;

        if changes.business_id.is_some() {
            referenced_business(&mut *tx, collection.business_id).await?;
        }
        if let (Some(_), Some(parent_id)) = (changes.parent_id, collection.parent_id) {
            if tx.get_collection(parent_id).await?.is_none() {
                return Err(CatalogError::Validation(format!(
                    "parent collection {parent_id} does not exist"
                )));
            }
        }

        let updated = tx.update_collection(&collection).await?;
        if updated.business_id != previous_business {
            let moved = tx.reassign_items(updated.id, updated.business_id).await?;
            info!(
                collection_id = %updated.id,
                business_id = %updated.business_id,
                moved,
                "items moved with their collection"
            );
        }
        tx.commit().await?;

        info!(collection_id = %updated.id, "collection updated");
        Ok(updated)
    }

    /// Hard-delete a collection (and its items). Children are handled per
    /// the configured policy. Returns the deleted row.
    #[instrument(skip(self), fields(policy = ?self.on_parent_delete), err)]
    pub async fn delete(&self, id: CollectionId) -> CatalogResult<Collection> {
        let mut tx = self.store.begin().await?;
        let collection = tx
            .get_collection(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("collection", id))?;

        match self.on_parent_delete {
            DeletePolicy::Orphan => {}
            DeletePolicy::Detach => {
                let detached = tx.detach_children(id).await?;
                info!(collection_id = %id, detached, "children detached");
            }
            DeletePolicy::Cascade => {
                for descendant in descendants(&mut *tx, id).await? {
                    tx.delete_collection(descendant).await?;
                }
            }
        }

        tx.delete_collection(id).await?;
        tx.commit().await?;

        info!(collection_id = %id, "collection deleted");
        Ok(collection)
    }

    /// Collections visible to `role` with the given memberships.
    pub async fn list_for_tenant(
        &self,
        role: &Role,
        business_ids: &[BusinessId],
    ) -> CatalogResult<Vec<CollectionView>> {
        self.list_visible(&visibility(role, business_ids)).await
    }

    pub async fn list_for_principal(&self, principal: &Principal) -> CatalogResult<Vec<CollectionView>> {
        self.list_visible(&Visibility::for_principal(principal)).await
    }

    /// The visible collections arranged as a forest. Collections whose
    /// parent is missing or not visible become roots.
    pub async fn forest_for_tenant(
        &self,
        role: &Role,
        business_ids: &[BusinessId],
    ) -> CatalogResult<Vec<CollectionNode>> {
        let scope = ListScope::from(&visibility(role, business_ids));
        let Some(filter) = scope.filter() else {
            return Ok(Vec::new());
        };
        let mut tx = self.store.begin().await?;
        let collections = tx.list_collections(filter).await?;
        tx.commit().await?;
        Ok(build_forest(collections))
    }

    /// Active collections of one business, e.g. to offer as item categories.
    pub async fn active_for_business(&self, business_id: BusinessId) -> CatalogResult<Vec<Collection>> {
        let mut tx = self.store.begin().await?;
        let collections = tx.list_collections(Some(&[business_id])).await?;
        tx.commit().await?;
        Ok(collections.into_iter().filter(|c| c.active).collect())
    }

    async fn list_visible(&self, visibility: &Visibility) -> CatalogResult<Vec<CollectionView>> {
        let scope = ListScope::from(visibility);
        let Some(filter) = scope.filter() else {
            return Ok(Vec::new());
        };

        let mut tx = self.store.begin().await?;
        let collections = tx.list_collections(filter).await?;
        let business_names: HashMap<BusinessId, String> = tx
            .list_businesses(filter)
            .await?
            .into_iter()
            .map(|b| (b.id, b.name))
            .collect();

        let mut parents: HashMap<CollectionId, ParentSummary> = collections
            .iter()
            .map(|c| (c.id, ParentSummary::from(c)))
            .collect();
        for parent_id in collections.iter().filter_map(|c| c.parent_id) {
            if !parents.contains_key(&parent_id) {
                if let Some(parent) = tx.get_collection(parent_id).await? {
                    parents.insert(parent_id, ParentSummary::from(&parent));
                }
            }
        }
        tx.commit().await?;

        Ok(collections
            .into_iter()
            .map(|collection| CollectionView {
                business_name: business_names.get(&collection.business_id).cloned(),
                parent: collection.parent_id.and_then(|p| parents.get(&p).cloned()),
                collection,
            })
            .collect())
    }
}

/// Resolve a predefined parent inside the open transaction.
///
/// Runs under a savepoint: on a storage failure the partial work is undone,
/// the failure is logged and the caller proceeds without a parent.
async fn synthesize_parent(
    tx: &mut dyn CatalogTx,
    business_id: BusinessId,
    name: &str,
) -> StoreResult<Option<CollectionId>> {
    tx.savepoint(PARENT_SAVEPOINT).await?;
    match find_or_create_parent(tx, business_id, name).await {
        Ok(parent) => {
            tx.release_savepoint(PARENT_SAVEPOINT).await?;
            Ok(Some(parent.id))
        }
        Err(err) => {
            error!(
                business_id = %business_id,
                parent = name,
                error = %err,
                "failed to create parent collection, continuing without parent"
            );
            tx.rollback_to_savepoint(PARENT_SAVEPOINT).await?;
            tx.release_savepoint(PARENT_SAVEPOINT).await?;
            Ok(None)
        }
    }
}

async fn find_or_create_parent(
    tx: &mut dyn CatalogTx,
    business_id: BusinessId,
    name: &str,
) -> StoreResult<Collection> {
    if let Some(existing) = tx.find_collection_by_name(business_id, name).await? {
        return Ok(existing);
    }
    let parent = tx.insert_collection(&synthetic_parent(business_id, name)).await?;
    info!(collection_id = %parent.id, name, "parent collection created");
    Ok(parent)
}

/// Every collection below `root`, deepest first. Parent cycles are cut.
async fn descendants(tx: &mut dyn CatalogTx, root: CollectionId) -> StoreResult<Vec<CollectionId>> {
    let mut seen = BTreeSet::from([root]);
    let mut order = Vec::new();
    let mut frontier = vec![root];
    while let Some(id) = frontier.pop() {
        for child in tx.list_children(id).await? {
            if seen.insert(child.id) {
                order.push(child.id);
                frontier.push(child.id);
            }
        }
    }
    order.reverse();
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCatalogStore;
    use shelfwise_catalog::{BusinessDraft, ParentRef, AUTO_PARENT_DESCRIPTION};
    use shelfwise_core::UserId;

    async fn setup() -> (CollectionHierarchyManager<InMemoryCatalogStore>, BusinessId) {
        let store = InMemoryCatalogStore::new();
        let mut tx = store.begin().await.unwrap();
        let business = tx.insert_business(&BusinessDraft::new("Acme")).await.unwrap();
        tx.commit().await.unwrap();
        (CollectionHierarchyManager::new(store), business.id)
    }

    fn draft(business_id: BusinessId, name: &str, parent: ParentRef) -> CollectionDraft {
        CollectionDraft::new(business_id, name).with_parent(parent)
    }

    #[tokio::test]
    async fn predefined_key_synthesizes_parent() {
        let (manager, acme) = setup().await;
        let boots = manager
            .create(draft(acme, "Boots", ParentRef::Predefined("shoes".into())))
            .await
            .unwrap();

        let view = manager.get(boots.id).await.unwrap();
        let parent = view.parent.expect("parent");
        assert_eq!(parent.name, "Shoes");

        let parent = manager.get(parent.id).await.unwrap();
        assert_eq!(
            parent.collection.description.as_deref(),
            Some(AUTO_PARENT_DESCRIPTION)
        );
        assert!(parent.collection.active);
        assert_eq!(parent.collection.parent_id, None);
    }

    #[tokio::test]
    async fn unknown_predefined_key_is_rejected() {
        let (manager, acme) = setup().await;
        let err = manager
            .create(draft(acme, "Gizmos", ParentRef::Predefined("gadgets".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_business_or_parent_is_a_validation_error() {
        let (manager, acme) = setup().await;
        let err = manager
            .create(draft(BusinessId::new(99), "Boots", ParentRef::Absent))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));

        let err = manager
            .create(draft(acme, "Boots", ParentRef::Id(CollectionId::new(99))))
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn string_parent_id_from_json_is_used_as_id() {
        let (manager, acme) = setup().await;
        let shoes = manager.create(draft(acme, "Shoes", ParentRef::Absent)).await.unwrap();

        let json = format!(
            r#"{{"business_id": {acme}, "name": "Boots", "parent": "{}"}}"#,
            shoes.id
        );
        let boots: CollectionDraft = serde_json::from_str(&json).unwrap();
        let boots = manager.create(boots).await.unwrap();
        assert_eq!(boots.parent_id, Some(shoes.id));
    }

    #[tokio::test]
    async fn update_of_missing_collection_is_not_found() {
        let (manager, _) = setup().await;
        let err = manager
            .update(CollectionId::new(7), CollectionChanges::default().name("x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::NotFound {
                entity: "collection",
                id: 7
            }
        ));
    }

    #[tokio::test]
    async fn detach_policy_promotes_children() {
        let (manager, acme) = setup().await;
        let manager = manager.with_delete_policy(DeletePolicy::Detach);
        let parent = manager.create(draft(acme, "Shoes", ParentRef::Absent)).await.unwrap();
        let child = manager
            .create(draft(acme, "Boots", ParentRef::Id(parent.id)))
            .await
            .unwrap();

        manager.delete(parent.id).await.unwrap();
        let child = manager.get(child.id).await.unwrap();
        assert_eq!(child.collection.parent_id, None);
    }

    #[tokio::test]
    async fn cascade_policy_removes_descendants() {
        let (manager, acme) = setup().await;
        let manager = manager.with_delete_policy(DeletePolicy::Cascade);
        let root = manager.create(draft(acme, "Shoes", ParentRef::Absent)).await.unwrap();
        let child = manager
            .create(draft(acme, "Boots", ParentRef::Id(root.id)))
            .await
            .unwrap();
        let grandchild = manager
            .create(draft(acme, "Chelsea", ParentRef::Id(child.id)))
            .await
            .unwrap();
        let other = manager.create(draft(acme, "Hats", ParentRef::Absent)).await.unwrap();

        manager.delete(root.id).await.unwrap();
        for gone in [root.id, child.id, grandchild.id] {
            assert!(matches!(
                manager.get(gone).await,
                Err(CatalogError::NotFound { .. })
            ));
        }
        assert!(manager.get(other.id).await.is_ok());
    }

    #[tokio::test]
    async fn forest_and_active_listing() {
        let (manager, acme) = setup().await;
        let shoes = manager.create(draft(acme, "Shoes", ParentRef::Absent)).await.unwrap();
        manager
            .create(draft(acme, "Boots", ParentRef::Id(shoes.id)).inactive())
            .await
            .unwrap();

        let forest = manager.forest_for_tenant(&Role::ADMIN, &[]).await.unwrap();
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].children.len(), 1);

        let active = manager.active_for_business(acme).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, shoes.id);
    }

    #[tokio::test]
    async fn principal_listing_uses_its_memberships() {
        let (manager, acme) = setup().await;
        manager.create(draft(acme, "Shoes", ParentRef::Absent)).await.unwrap();

        let member = Principal::new(UserId::new(1), Role::USER, vec![acme]);
        let views = manager.list_for_principal(&member).await.unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].business_name.as_deref(), Some("Acme"));

        let outsider = Principal::new(UserId::new(2), Role::USER, vec![BusinessId::new(42)]);
        assert!(manager.list_for_principal(&outsider).await.unwrap().is_empty());
    }
}
