//! SQLite-backed catalog store (sqlx).
//!
//! ## Error Mapping
//!
//! | sqlx error | StoreError |
//! |------------|------------|
//! | Database (unique / foreign key / not null / check) | `Constraint` |
//! | Database (other) | `Backend` |
//! | PoolClosed, Io, decode, ... | `Backend` |
//!
//! Foreign keys are switched on for every connection, so the `ON DELETE
//! CASCADE` clauses of the schema do the cascading deletes.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::instrument;

use shelfwise_auth::Role;
use shelfwise_catalog::{
    Business, BusinessDraft, Collection, Item, ItemDraft, NewCollection, User, UserDraft,
};
use shelfwise_core::{BusinessId, CollectionId, ItemId, UserId};

use super::{BusinessFilter, CatalogStore, CatalogTx, StoreError, StoreResult};

/// Idempotent schema bootstrap, applied in order by [`SqliteCatalogStore::migrate`].
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS businesses (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        logo        TEXT NULL,
        address     TEXT NULL,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        email       TEXT NOT NULL UNIQUE,
        role        TEXT NOT NULL DEFAULT 'user',
        created_at  TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_business (
        user_id     INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        business_id INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
        created_at  TEXT NOT NULL,
        PRIMARY KEY (user_id, business_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collections (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        business_id INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
        name        TEXT NOT NULL,
        description TEXT NULL,
        parent_id   INTEGER NULL,
        active      INTEGER NOT NULL DEFAULT 1,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS collections_business_id_idx ON collections (business_id)",
    "CREATE INDEX IF NOT EXISTS collections_parent_id_idx ON collections (parent_id)",
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        business_id   INTEGER NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
        collection_id INTEGER NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
        title         TEXT NOT NULL,
        introduction  TEXT NULL,
        description   TEXT NULL,
        image_path    TEXT NULL,
        active        INTEGER NOT NULL DEFAULT 1,
        created_at    TEXT NOT NULL,
        updated_at    TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS items_business_id_idx ON items (business_id)",
    "CREATE INDEX IF NOT EXISTS items_collection_id_idx ON items (collection_id)",
];

const BUSINESS_COLUMNS: &str = "id, name, logo, address, created_at, updated_at";
const COLLECTION_COLUMNS: &str =
    "id, business_id, name, description, parent_id, active, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, business_id, collection_id, title, introduction, description, \
                            image_path, active, created_at, updated_at";
const USER_COLUMNS: &str = "id, name, email, role, created_at";

/// SQLite catalog store over a sqlx connection pool.
#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    /// Open (creating if missing) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| map_sqlx_error("connect", e))?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self { pool })
    }

    /// A private in-memory database, already migrated.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| map_sqlx_error("connect", e))?
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create missing tables and indexes.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("migrate", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn begin(&self) -> StoreResult<Box<dyn CatalogTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;
        Ok(Box::new(SqliteTx { tx: Some(tx) }))
    }
}

/// Open sqlx transaction; `None` once committed or rolled back.
struct SqliteTx {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteTx {
    fn conn(&mut self) -> StoreResult<&mut SqliteConnection> {
        self.tx.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }

    async fn raw(&mut self, operation: &'static str, sql: String) -> StoreResult<()> {
        sqlx::query(&sql)
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct BusinessRow {
    id: i64,
    name: String,
    logo: Option<String>,
    address: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BusinessRow> for Business {
    fn from(row: BusinessRow) -> Self {
        Self {
            id: BusinessId::new(row.id),
            name: row.name,
            logo: row.logo,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CollectionRow {
    id: i64,
    business_id: i64,
    name: String,
    description: Option<String>,
    parent_id: Option<i64>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CollectionRow> for Collection {
    fn from(row: CollectionRow) -> Self {
        Self {
            id: CollectionId::new(row.id),
            business_id: BusinessId::new(row.business_id),
            name: row.name,
            description: row.description,
            parent_id: row.parent_id.map(CollectionId::new),
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ItemRow {
    id: i64,
    business_id: i64,
    collection_id: i64,
    title: String,
    introduction: Option<String>,
    description: Option<String>,
    image_path: Option<String>,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: ItemId::new(row.id),
            business_id: BusinessId::new(row.business_id),
            collection_id: CollectionId::new(row.collection_id),
            title: row.title,
            introduction: row.introduction,
            description: row.description,
            image_path: row.image_path,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            name: row.name,
            email: row.email,
            role: Role::normalized(&row.role),
            created_at: row.created_at,
        }
    }
}

/// `SELECT <columns> FROM <table> [WHERE business_column IN (...)] ORDER BY id`.
///
/// Returns `None` when the filter is an empty set, which can match nothing.
fn scoped_select<'a>(
    columns: &str,
    table: &str,
    business_column: &str,
    filter: BusinessFilter<'_>,
) -> Option<QueryBuilder<'a, Sqlite>> {
    let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM {table}"));
    if let Some(ids) = filter {
        if ids.is_empty() {
            return None;
        }
        qb.push(format!(" WHERE {business_column} IN ("));
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.get());
        }
        separated.push_unseparated(")");
    }
    qb.push(" ORDER BY id");
    Some(qb)
}

#[async_trait]
impl CatalogTx for SqliteTx {
    #[instrument(skip(self, draft), fields(name = %draft.name), err)]
    async fn insert_business(&mut self, draft: &BusinessDraft) -> StoreResult<Business> {
        let now = Utc::now();
        let row: BusinessRow = sqlx::query_as(&format!(
            "INSERT INTO businesses (name, logo, address, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING {BUSINESS_COLUMNS}"
        ))
        .bind(&draft.name)
        .bind(&draft.logo)
        .bind(&draft.address)
        .bind(now)
        .bind(now)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_business", e))?;
        Ok(row.into())
    }

    async fn get_business(&mut self, id: BusinessId) -> StoreResult<Option<Business>> {
        let row: Option<BusinessRow> =
            sqlx::query_as(&format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?"))
                .bind(id.get())
                .fetch_optional(self.conn()?)
                .await
                .map_err(|e| map_sqlx_error("get_business", e))?;
        Ok(row.map(Into::into))
    }

    async fn list_businesses(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Business>> {
        let Some(mut qb) = scoped_select(BUSINESS_COLUMNS, "businesses", "id", filter) else {
            return Ok(Vec::new());
        };
        let rows: Vec<BusinessRow> = qb
            .build_query_as()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_businesses", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, business), fields(id = %business.id), err)]
    async fn update_business(&mut self, business: &Business) -> StoreResult<Business> {
        let row: Option<BusinessRow> = sqlx::query_as(&format!(
            "UPDATE businesses SET name = ?, logo = ?, address = ?, updated_at = ? \
             WHERE id = ? RETURNING {BUSINESS_COLUMNS}"
        ))
        .bind(&business.name)
        .bind(&business.logo)
        .bind(&business.address)
        .bind(Utc::now())
        .bind(business.id.get())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("update_business", e))?;
        row.map(Into::into).ok_or(StoreError::RowNotFound {
            table: "businesses",
            id: business.id.get(),
        })
    }

    #[instrument(skip(self), err)]
    async fn delete_business(&mut self, id: BusinessId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM businesses WHERE id = ?")
            .bind(id.get())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("delete_business", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, new), fields(business_id = %new.business_id, name = %new.name), err)]
    async fn insert_collection(&mut self, new: &NewCollection) -> StoreResult<Collection> {
        let now = Utc::now();
        let row: CollectionRow = sqlx::query_as(&format!(
            "INSERT INTO collections \
             (business_id, name, description, parent_id, active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(new.business_id.get())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.parent_id.map(CollectionId::get))
        .bind(new.active)
        .bind(now)
        .bind(now)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_collection", e))?;
        Ok(row.into())
    }

    async fn get_collection(&mut self, id: CollectionId) -> StoreResult<Option<Collection>> {
        let row: Option<CollectionRow> =
            sqlx::query_as(&format!("SELECT {COLLECTION_COLUMNS} FROM collections WHERE id = ?"))
                .bind(id.get())
                .fetch_optional(self.conn()?)
                .await
                .map_err(|e| map_sqlx_error("get_collection", e))?;
        Ok(row.map(Into::into))
    }

    async fn find_collection_by_name(
        &mut self,
        business_id: BusinessId,
        name: &str,
    ) -> StoreResult<Option<Collection>> {
        let row: Option<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections \
             WHERE business_id = ? AND name = ? ORDER BY id LIMIT 1"
        ))
        .bind(business_id.get())
        .bind(name)
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("find_collection_by_name", e))?;
        Ok(row.map(Into::into))
    }

    async fn list_collections(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Collection>> {
        let Some(mut qb) = scoped_select(COLLECTION_COLUMNS, "collections", "business_id", filter)
        else {
            return Ok(Vec::new());
        };
        let rows: Vec<CollectionRow> = qb
            .build_query_as()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_collections", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_children(&mut self, parent_id: CollectionId) -> StoreResult<Vec<Collection>> {
        let rows: Vec<CollectionRow> = sqlx::query_as(&format!(
            "SELECT {COLLECTION_COLUMNS} FROM collections WHERE parent_id = ? ORDER BY id"
        ))
        .bind(parent_id.get())
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("list_children", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, collection), fields(id = %collection.id), err)]
    async fn update_collection(&mut self, collection: &Collection) -> StoreResult<Collection> {
        let row: Option<CollectionRow> = sqlx::query_as(&format!(
            "UPDATE collections SET business_id = ?, name = ?, description = ?, parent_id = ?, \
             active = ?, updated_at = ? WHERE id = ? RETURNING {COLLECTION_COLUMNS}"
        ))
        .bind(collection.business_id.get())
        .bind(&collection.name)
        .bind(&collection.description)
        .bind(collection.parent_id.map(CollectionId::get))
        .bind(collection.active)
        .bind(Utc::now())
        .bind(collection.id.get())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("update_collection", e))?;
        row.map(Into::into).ok_or(StoreError::RowNotFound {
            table: "collections",
            id: collection.id.get(),
        })
    }

    #[instrument(skip(self), err)]
    async fn delete_collection(&mut self, id: CollectionId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE id = ?")
            .bind(id.get())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("delete_collection", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn detach_children(&mut self, parent_id: CollectionId) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE collections SET parent_id = NULL, updated_at = ? WHERE parent_id = ?")
                .bind(Utc::now())
                .bind(parent_id.get())
                .execute(self.conn()?)
                .await
                .map_err(|e| map_sqlx_error("detach_children", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, draft), fields(business_id = %draft.business_id, title = %draft.title), err)]
    async fn insert_item(&mut self, draft: &ItemDraft) -> StoreResult<Item> {
        let now = Utc::now();
        let row: ItemRow = sqlx::query_as(&format!(
            "INSERT INTO items (business_id, collection_id, title, introduction, description, \
             image_path, active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {ITEM_COLUMNS}"
        ))
        .bind(draft.business_id.get())
        .bind(draft.collection_id.get())
        .bind(&draft.title)
        .bind(&draft.introduction)
        .bind(&draft.description)
        .bind(&draft.image_path)
        .bind(draft.active)
        .bind(now)
        .bind(now)
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_item", e))?;
        Ok(row.into())
    }

    async fn get_item(&mut self, id: ItemId) -> StoreResult<Option<Item>> {
        let row: Option<ItemRow> =
            sqlx::query_as(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?"))
                .bind(id.get())
                .fetch_optional(self.conn()?)
                .await
                .map_err(|e| map_sqlx_error("get_item", e))?;
        Ok(row.map(Into::into))
    }

    async fn list_items(&mut self, filter: BusinessFilter<'_>) -> StoreResult<Vec<Item>> {
        let Some(mut qb) = scoped_select(ITEM_COLUMNS, "items", "business_id", filter) else {
            return Ok(Vec::new());
        };
        let rows: Vec<ItemRow> = qb
            .build_query_as()
            .fetch_all(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("list_items", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, item), fields(id = %item.id), err)]
    async fn update_item(&mut self, item: &Item) -> StoreResult<Item> {
        let row: Option<ItemRow> = sqlx::query_as(&format!(
            "UPDATE items SET business_id = ?, collection_id = ?, title = ?, introduction = ?, \
             description = ?, image_path = ?, active = ?, updated_at = ? \
             WHERE id = ? RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item.business_id.get())
        .bind(item.collection_id.get())
        .bind(&item.title)
        .bind(&item.introduction)
        .bind(&item.description)
        .bind(&item.image_path)
        .bind(item.active)
        .bind(Utc::now())
        .bind(item.id.get())
        .fetch_optional(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("update_item", e))?;
        row.map(Into::into).ok_or(StoreError::RowNotFound {
            table: "items",
            id: item.id.get(),
        })
    }

    #[instrument(skip(self), err)]
    async fn delete_item(&mut self, id: ItemId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id.get())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("delete_item", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn reassign_items(
        &mut self,
        collection_id: CollectionId,
        business_id: BusinessId,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE items SET business_id = ?, updated_at = ? \
             WHERE collection_id = ? AND business_id <> ?",
        )
        .bind(business_id.get())
        .bind(Utc::now())
        .bind(collection_id.get())
        .bind(business_id.get())
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("reassign_items", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, draft), fields(email = %draft.email), err)]
    async fn insert_user(&mut self, draft: &UserDraft) -> StoreResult<User> {
        let row: UserRow = sqlx::query_as(&format!(
            "INSERT INTO users (name, email, role, created_at) VALUES (?, ?, ?, ?) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&draft.name)
        .bind(&draft.email)
        .bind(draft.role.as_str())
        .bind(Utc::now())
        .fetch_one(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(row.into())
    }

    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
                .bind(id.get())
                .fetch_optional(self.conn()?)
                .await
                .map_err(|e| map_sqlx_error("get_user", e))?;
        Ok(row.map(Into::into))
    }

    async fn list_users(&mut self) -> StoreResult<Vec<User>> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY id"))
                .fetch_all(self.conn()?)
                .await
                .map_err(|e| map_sqlx_error("list_users", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), err)]
    async fn attach_member(&mut self, user_id: UserId, business_id: BusinessId) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_business (user_id, business_id, created_at) VALUES (?, ?, ?) \
             ON CONFLICT (user_id, business_id) DO NOTHING",
        )
        .bind(user_id.get())
        .bind(business_id.get())
        .bind(Utc::now())
        .execute(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("attach_member", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn detach_member(&mut self, user_id: UserId, business_id: BusinessId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM user_business WHERE user_id = ? AND business_id = ?")
            .bind(user_id.get())
            .bind(business_id.get())
            .execute(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("detach_member", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn business_ids_of(&mut self, user_id: UserId) -> StoreResult<Vec<BusinessId>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT business_id FROM user_business WHERE user_id = ? ORDER BY business_id",
        )
        .bind(user_id.get())
        .fetch_all(self.conn()?)
        .await
        .map_err(|e| map_sqlx_error("business_ids_of", e))?;
        Ok(ids.into_iter().map(BusinessId::new).collect())
    }

    async fn member_count(&mut self, business_id: BusinessId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_business WHERE business_id = ?")
            .bind(business_id.get())
            .fetch_one(self.conn()?)
            .await
            .map_err(|e| map_sqlx_error("member_count", e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn savepoint(&mut self, name: &'static str) -> StoreResult<()> {
        self.raw("savepoint", format!("SAVEPOINT {name}")).await
    }

    async fn rollback_to_savepoint(&mut self, name: &'static str) -> StoreResult<()> {
        self.raw("rollback_to_savepoint", format!("ROLLBACK TO SAVEPOINT {name}"))
            .await
    }

    async fn release_savepoint(&mut self, name: &'static str) -> StoreResult<()> {
        self.raw("release_savepoint", format!("RELEASE SAVEPOINT {name}"))
            .await
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(&mut self) -> StoreResult<()> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

/// Map sqlx errors to [`StoreError`] (see the module docs for the table).
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => StoreError::Constraint(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
