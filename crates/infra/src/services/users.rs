use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use shelfwise_auth::Principal;
use shelfwise_catalog::{User, UserDraft};
use shelfwise_core::{BusinessId, UserId};

use super::{CatalogError, CatalogResult};
use crate::store::{CatalogStore, StoreError};

/// A user with the businesses it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    #[serde(flatten)]
    pub user: User,
    pub business_ids: Vec<BusinessId>,
}

/// Users and their resolution into policy principals.
#[derive(Debug, Clone)]
pub struct UserDirectory<S> {
    store: S,
}

impl<S> UserDirectory<S>
where
    S: CatalogStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a user. Emails are unique (case-insensitively).
    #[instrument(skip(self, draft), err)]
    pub async fn create_user(&self, draft: UserDraft) -> CatalogResult<User> {
        let draft = draft.validate()?;
        let mut tx = self.store.begin().await?;
        let user = match tx.insert_user(&draft).await {
            Ok(user) => user,
            Err(StoreError::Constraint(_)) => {
                return Err(CatalogError::Validation(format!(
                    "email {} has already been taken",
                    draft.email
                )));
            }
            Err(err) => return Err(err.into()),
        };
        tx.commit().await?;
        info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> CatalogResult<UserView> {
        let mut tx = self.store.begin().await?;
        let user = tx
            .get_user(id)
            .await?
            .ok_or_else(|| CatalogError::not_found("user", id))?;
        let business_ids = tx.business_ids_of(id).await?;
        tx.commit().await?;
        Ok(UserView { user, business_ids })
    }

    pub async fn list_users(&self) -> CatalogResult<Vec<UserView>> {
        let mut tx = self.store.begin().await?;
        let users = tx.list_users().await?;
        let mut views = Vec::with_capacity(users.len());
        for user in users {
            let business_ids = tx.business_ids_of(user.id).await?;
            views.push(UserView { user, business_ids });
        }
        tx.commit().await?;
        Ok(views)
    }

    /// Role and memberships of a user, as consumed by the listing policy.
    pub async fn principal(&self, id: UserId) -> CatalogResult<Principal> {
        let view = self.get_user(id).await?;
        Ok(Principal::new(view.user.id, view.user.role, view.business_ids))
    }
}
