//! In-memory catalog store for tests and local runs.
//!
//! Transactions are serialized: `begin` takes the store lock and holds it
//! until the transaction is committed or dropped. Writes are staged on a copy
//! of the state and swapped in on commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use shelfwise_catalog::{
    Business, BusinessDraft, Collection, Item, ItemDraft, NewCollection, User, UserDraft,
};
use shelfwise_core::{BusinessId, BusinessScoped, CollectionId, Entity, ItemId, UserId};

use super::{BusinessFilter, CatalogStore, CatalogTx, StoreError, StoreResult};

/// Rows of one entity type keyed by id, with an autoincrement counter.
#[derive(Debug, Clone)]
struct Table<E: Entity> {
    rows: BTreeMap<E::Id, E>,
    next_id: i64,
}

impl<E: Entity> Default for Table<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<E> Table<E>
where
    E: Entity + Clone,
    E::Id: From<i64>,
{
    fn insert_with(&mut self, build: impl FnOnce(E::Id) -> E) -> E {
        let id = <E::Id as From<i64>>::from(self.next_id);
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        row
    }

    fn get(&self, id: E::Id) -> Option<E> {
        self.rows.get(&id).cloned()
    }

    fn contains(&self, id: E::Id) -> bool {
        self.rows.contains_key(&id)
    }

    fn replace(&mut self, table: &'static str, row: E, raw_id: i64) -> StoreResult<E> {
        match self.rows.get_mut(&row.id()) {
            Some(slot) => {
                *slot = row.clone();
                Ok(row)
            }
            None => Err(StoreError::RowNotFound { table, id: raw_id }),
        }
    }

    fn remove(&mut self, id: E::Id) -> bool {
        self.rows.remove(&id).is_some()
    }
}

impl<E> Table<E>
where
    E: Entity + BusinessScoped + Clone,
{
    fn scoped(&self, filter: BusinessFilter<'_>) -> Vec<E> {
        self.rows
            .values()
            .filter(|row| filter.is_none_or(|ids| ids.contains(&row.business_id())))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
struct CatalogState {
    businesses: Table<Business>,
    collections: Table<Collection>,
    items: Table<Item>,
    users: Table<User>,
    memberships: BTreeSet<(UserId, BusinessId)>,
}

impl CatalogState {
    fn require_business(&self, id: BusinessId) -> StoreResult<()> {
        if self.businesses.contains(id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("business {id} does not exist")))
        }
    }

    fn require_collection(&self, id: CollectionId) -> StoreResult<()> {
        if self.collections.contains(id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("collection {id} does not exist")))
        }
    }

    fn require_user(&self, id: UserId) -> StoreResult<()> {
        if self.users.contains(id) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!("user {id} does not exist")))
        }
    }

    fn remove_collection_cascade(&mut self, id: CollectionId) -> bool {
        if !self.collections.remove(id) {
            return false;
        }
        self.items.rows.retain(|_, item| item.collection_id != id);
        true
    }
}

/// Shared in-memory catalog. Cloning shares the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogStore {
    state: Arc<Mutex<CatalogState>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn begin(&self) -> StoreResult<Box<dyn CatalogTx>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx {
            guard: Some(guard),
            working,
            savepoints: Vec::new(),
        }))
    }
}

struct InMemoryTx {
    guard: Option<OwnedMutexGuard<CatalogState>>,
    working: CatalogState,
    savepoints: Vec<(&'static str, CatalogState)>,
}

impl InMemoryTx {
    fn state(&mut self) -> StoreResult<&mut CatalogState> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionClosed);
        }
        Ok(&mut self.working)
    }

    fn savepoint_index(&self, name: &str) -> StoreResult<usize> {
        self.savepoints
            .iter()
            .rposition(|(n, _)| *n == name)
            .ok_or_else(|| StoreError::Backend(format!("no such savepoint: {name}")))
    }
}

#[async_trait]
impl CatalogTx for InMemoryTx {
    async fn insert_business(&mut self, draft: &BusinessDraft) -> StoreResult<Business> {
        let state = self.state()?;
        let now = Utc::now();
        Ok(state.businesses.insert_with(|id| Business {
            id,
            name: draft.name.clone(),
            logo: draft.logo.clone(),
            address: draft.address.clone(),
            created_at: now,
            updated_at: now,
        }))
    }

    async fn get_business(&mut self, id: BusinessId) -> StoreResult<Option<Business>> {
        Ok(self.state()?.businesses.get(id))
    }

    async fn list_businesses(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Business>> {
        Ok(self.state()?.businesses.scoped(filter))
    }

    async fn update_business(&mut self, business: &Business) -> StoreResult<Business> {
        let mut row = business.clone();
        row.updated_at = Utc::now();
        self.state()?
            .businesses
            .replace("businesses", row, business.id.get())
    }

    async fn delete_business(&mut self, id: BusinessId) -> StoreResult<bool> {
        let state = self.state()?;
        if !state.businesses.remove(id) {
            return Ok(false);
        }
        state.collections.rows.retain(|_, c| c.business_id != id);
        state.items.rows.retain(|_, i| i.business_id != id);
        state.memberships.retain(|(_, b)| *b != id);
        Ok(true)
    }

    async fn insert_collection(&mut self, new: &NewCollection) -> StoreResult<Collection> {
        let state = self.state()?;
        state.require_business(new.business_id)?;
        let now = Utc::now();
        Ok(state.collections.insert_with(|id| Collection {
            id,
            business_id: new.business_id,
            name: new.name.clone(),
            description: new.description.clone(),
            parent_id: new.parent_id,
            active: new.active,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn get_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>> {
        Ok(self.state()?.collections.get(id))
    }

    async fn find_collection_by_name(
        &mut self,
        business_id: BusinessId,
        name: &str,
    ) -> StoreResult<Option<Collection>> {
        Ok(self
            .state()?
            .collections
            .rows
            .values()
            .find(|c| c.business_id == business_id && c.name == name)
            .cloned())
    }

    async fn list_collections(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Collection>> {
        Ok(self.state()?.collections.scoped(filter))
    }

    async fn list_children(&mut self, parent_id: CollectionId) -> StoreResult<Vec<Collection>> {
        Ok(self
            .state()?
            .collections
            .rows
            .values()
            .filter(|c| c.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn update_collection(&mut self, collection: &Collection) -> StoreResult<Collection> {
        let state = self.state()?;
        state.require_business(collection.business_id)?;
        let mut row = collection.clone();
        row.updated_at = Utc::now();
        state
            .collections
            .replace("collections", row, collection.id.get())
    }

    async fn delete_collection(&mut self, id: CollectionId) -> StoreResult<bool> {
        Ok(self.state()?.remove_collection_cascade(id))
    }

    async fn detach_children(&mut self, parent_id: CollectionId) -> StoreResult<u64> {
        let now = Utc::now();
        let mut changed = 0;
        for child in self.state()?.collections.rows.values_mut() {
            if child.parent_id == Some(parent_id) {
                child.parent_id = None;
                child.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn insert_item(&mut self, draft: &ItemDraft) -> StoreResult<Item> {
        let state = self.state()?;
        state.require_business(draft.business_id)?;
        state.require_collection(draft.collection_id)?;
        let now = Utc::now();
        Ok(state.items.insert_with(|id| Item {
            id,
            business_id: draft.business_id,
            collection_id: draft.collection_id,
            title: draft.title.clone(),
            introduction: draft.introduction.clone(),
            description: draft.description.clone(),
            image_path: draft.image_path.clone(),
            active: draft.active,
            created_at: now,
            updated_at: now,
        }))
    }

    async fn get_item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.state()?.items.get(id))
    }

    async fn list_items(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Item>> {
        Ok(self.state()?.items.scoped(filter))
    }

    async fn update_item(&mut self, item: &Item) -> StoreResult<Item> {
        let state = self.state()?;
        state.require_business(item.business_id)?;
        state.require_collection(item.collection_id)?;
        let mut row = item.clone();
        row.updated_at = Utc::now();
        state.items.replace("items", row, item.id.get())
    }

    async fn delete_item(&mut self, id: ItemId) -> StoreResult<bool> {
        Ok(self.state()?.items.remove(id))
    }

    async fn reassign_items(
        &mut self,
        collection_id: CollectionId,
        business_id: BusinessId,
    ) -> StoreResult<u64> {
        let state = self.state()?;
        state.require_business(business_id)?;
        let now = Utc::now();
        let mut changed = 0;
        for item in state.items.rows.values_mut() {
            if item.collection_id == collection_id && item.business_id != business_id {
                item.business_id = business_id;
                item.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn insert_user(&mut self, draft: &UserDraft) -> StoreResult<User> {
        let state = self.state()?;
        if state.users.rows.values().any(|u| u.email == draft.email) {
            return Err(StoreError::Constraint(format!(
                "email {} is already registered",
                draft.email
            )));
        }
        let now = Utc::now();
        Ok(state.users.insert_with(|id| User {
            id,
            name: draft.name.clone(),
            email: draft.email.clone(),
            role: draft.role.clone(),
            created_at: now,
        }))
    }

    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state()?.users.get(id))
    }

    async fn list_users(&mut self) -> StoreResult<Vec<User>> {
        Ok(self.state()?.users.rows.values().cloned().collect())
    }

    async fn attach_member(&mut self, user_id: UserId, business_id: BusinessId) -> StoreResult<bool> {
        let state = self.state()?;
        state.require_user(user_id)?;
        state.require_business(business_id)?;
        Ok(state.memberships.insert((user_id, business_id)))
    }

    async fn detach_member(&mut self, user_id: UserId, business_id: BusinessId) -> StoreResult<bool> {
        Ok(self.state()?.memberships.remove(&(user_id, business_id)))
    }

    async fn business_ids_of(&mut self, user_id: UserId) -> StoreResult<Vec<BusinessId>> {
        Ok(self
            .state()?
            .memberships
            .iter()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, b)| *b)
            .collect())
    }

    async fn member_count(&mut self, business_id: BusinessId) -> StoreResult<u64> {
        Ok(self
            .state()?
            .memberships
            .iter()
            .filter(|(_, b)| *b == business_id)
            .count() as u64)
    }

    async fn savepoint(&mut self, name: &'static str) -> StoreResult<()> {
        let snapshot = self.state()?.clone();
        self.savepoints.push((name, snapshot));
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> StoreResult<()> {
        self.state()?;
        let index = self.savepoint_index(name)?;
        // The savepoint itself stays active, later ones are discarded.
        self.savepoints.truncate(index + 1);
        self.working = self.savepoints[index].1.clone();
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &'static str) -> StoreResult<()> {
        self.state()?;
        let index = self.savepoint_index(name)?;
        self.savepoints.truncate(index);
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self.guard.take().ok_or(StoreError::TransactionClosed)?;
        *guard = std::mem::take(&mut self.working);
        self.savepoints.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        self.guard.take().ok_or(StoreError::TransactionClosed)?;
        self.working = CatalogState::default();
        self.savepoints.clear();
        Ok(())
    }
}
