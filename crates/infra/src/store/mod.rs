//! Transactional catalog storage.
//!
//! All access goes through a [`CatalogTx`] obtained from
//! [`CatalogStore::begin`]. Writes become visible to other transactions only
//! after [`CatalogTx::commit`]; a transaction dropped without committing is
//! rolled back. Savepoints let a caller undo one step of a transaction
//! without abandoning the rest.
//!
//! Referential rules every backend enforces:
//! - collections, items and memberships require their business to exist
//! - items require their collection to exist
//! - deleting a business deletes its collections, items and memberships
//! - deleting a collection deletes its items, but never touches child
//!   collections (`parent_id` is not a foreign key)

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use shelfwise_catalog::{
    Business, BusinessDraft, Collection, Item, ItemDraft, NewCollection, User, UserDraft,
};
use shelfwise_core::{BusinessId, CollectionId, ItemId, UserId};

pub use memory::InMemoryCatalogStore;
pub use sqlite::SqliteCatalogStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A foreign key, unique or not-null rule rejected the write.
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// An update targeted a row that does not exist.
    #[error("{table} row {id} not found")]
    RowNotFound { table: &'static str, id: i64 },

    /// The transaction was already committed or rolled back.
    #[error("transaction already finished")]
    TransactionClosed,

    /// Any other backend failure (IO, pool, decoding, ...).
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Which businesses a listing is restricted to. `None` lists every row.
pub type BusinessFilter<'a> = Option<&'a [BusinessId]>;

/// Entry point of a catalog storage backend.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Start a transaction.
    async fn begin(&self) -> StoreResult<Box<dyn CatalogTx>>;
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn begin(&self) -> StoreResult<Box<dyn CatalogTx>> {
        (**self).begin().await
    }
}

/// One open transaction against the catalog.
#[async_trait]
pub trait CatalogTx: Send {
    // Businesses.
    async fn insert_business(&mut self, draft: &BusinessDraft) -> StoreResult<Business>;
    async fn get_business(&mut self, id: BusinessId) -> StoreResult<Option<Business>>;
    async fn list_businesses(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Business>>;
    async fn update_business(&mut self, business: &Business) -> StoreResult<Business>;
    async fn delete_business(&mut self, id: BusinessId) -> StoreResult<bool>;

    // Collections.
    async fn insert_collection(&mut self, new: &NewCollection) -> StoreResult<Collection>;
    async fn get_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>>;
    /// Lowest-id collection of `business_id` named exactly `name`.
    async fn find_collection_by_name(
        &mut self,
        business_id: BusinessId,
        name: &str,
    ) -> StoreResult<Option<Collection>>;
    async fn list_collections(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Collection>>;
    async fn list_children(&mut self, parent_id: CollectionId) -> StoreResult<Vec<Collection>>;
    async fn update_collection(&mut self, collection: &Collection) -> StoreResult<Collection>;
    async fn delete_collection(&mut self, id: CollectionId) -> StoreResult<bool>;
    /// Null out `parent_id` on every child of `parent_id`; returns how many changed.
    async fn detach_children(&mut self, parent_id: CollectionId) -> StoreResult<u64>;

    // Items.
    async fn insert_item(&mut self, draft: &ItemDraft) -> StoreResult<Item>;
    async fn get_item(&mut self, id: ItemId) -> StoreResult<Option<Item>>;
    async fn list_items(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Item>>;
    async fn update_item(&mut self, item: &Item) -> StoreResult<Item>;
    async fn delete_item(&mut self, id: ItemId) -> StoreResult<bool>;
    /// Move every item of `collection_id` to `business_id`; returns how many changed.
    async fn reassign_items(
        &mut self,
        collection_id: CollectionId,
        business_id: BusinessId,
    ) -> StoreResult<u64>;

    // Users and memberships.
    async fn insert_user(&mut self, draft: &UserDraft) -> StoreResult<User>;
    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>>;
    async fn list_users(&mut self) -> StoreResult<Vec<User>>;
    /// Returns `false` when the membership already existed.
    async fn attach_member(&mut self, user_id: UserId, business_id: BusinessId) -> StoreResult<bool>;
    /// Returns `false` when there was no such membership.
    async fn detach_member(&mut self, user_id: UserId, business_id: BusinessId) -> StoreResult<bool>;
    async fn business_ids_of(&mut self, user_id: UserId) -> StoreResult<Vec<BusinessId>>;
    async fn member_count(&mut self, business_id: BusinessId) -> StoreResult<u64>;

    // Transaction control.
    async fn savepoint(&mut self, name: &'static str) -> StoreResult<()>;
    async fn rollback_to_savepoint(&mut self, name: &'static str) -> StoreResult<()>;
    async fn release_savepoint(&mut self, name: &'static str) -> StoreResult<()>;
    async fn commit(&mut self) -> StoreResult<()>;
    async fn rollback(&mut self) -> StoreResult<()>;
}
