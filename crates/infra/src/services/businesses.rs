use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use shelfwise_auth::{authorize_member, visibility, Principal, Role};
use shelfwise_catalog::{Business, BusinessChanges, BusinessDraft};
use shelfwise_core::{BusinessId, UserId};

use super::{CatalogError, CatalogResult, ListScope};
use crate::store::{CatalogStore, CatalogTx};

/// A business with its number of member users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessView {
    #[serde(flatten)]
    pub business: Business,
    pub member_count: u64,
}

/// Business management and user membership.
#[derive(Debug, Clone)]
pub struct BusinessService<S> {
    store: S,
}

impl<S> BusinessService<S>
where
    S: CatalogStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, draft), err)]
    pub async fn create(&self, draft: BusinessDraft) -> CatalogResult<Business> {
        let draft = draft.validate()?;
        let mut tx = self.store.begin().await?;
        let business = tx.insert_business(&draft).await?;
        tx.commit().await?;
        info!(business_id = %business.id, "business created");
        Ok(business)
    }

    pub async fn get(&self, id: BusinessId) -> CatalogResult<BusinessView> {
        let mut tx = self.store.begin().await?;
        let business = existing(&mut *tx, id).await?;
        let member_count = tx.member_count(id).await?;
        tx.commit().await?;
        Ok(BusinessView {
            business,
            member_count,
        })
    }

    #[instrument(skip(self, changes), err)]
    pub async fn update(&self, id: BusinessId, changes: BusinessChanges) -> CatalogResult<Business> {
        let mut tx = self.store.begin().await?;
        let mut business = existing(&mut *tx, id).await?;
        changes.apply_to(&mut business)?;
        let updated = tx.update_business(&business).await?;
        tx.commit().await?;
        info!(business_id = %id, "business updated");
        Ok(updated)
    }

    /// Update on behalf of a member. Non-members (other than admins) are
    /// refused before anything is read.
    pub async fn update_as_member(
        &self,
        principal: &Principal,
        id: BusinessId,
        changes: BusinessChanges,
    ) -> CatalogResult<Business> {
        authorize_member(principal, id)?;
        self.update(id, changes).await
    }

    /// Delete a business together with its collections, items and
    /// memberships. Returns the deleted row.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, id: BusinessId) -> CatalogResult<Business> {
        let mut tx = self.store.begin().await?;
        let business = existing(&mut *tx, id).await?;
        tx.delete_business(id).await?;
        tx.commit().await?;
        info!(business_id = %id, "business deleted");
        Ok(business)
    }

    pub async fn list_for_tenant(
        &self,
        role: &Role,
        business_ids: &[BusinessId],
    ) -> CatalogResult<Vec<Business>> {
        let scope = ListScope::from(&visibility(role, business_ids));
        let Some(filter) = scope.filter() else {
            return Ok(Vec::new());
        };
        let mut tx = self.store.begin().await?;
        let businesses = tx.list_businesses(filter).await?;
        tx.commit().await?;
        Ok(businesses)
    }

    /// Create a business and make `user_id` its first member, atomically.
    #[instrument(skip(self, draft), err)]
    pub async fn register_for_user(
        &self,
        user_id: UserId,
        draft: BusinessDraft,
    ) -> CatalogResult<Business> {
        let draft = draft.validate()?;
        let mut tx = self.store.begin().await?;
        if tx.get_user(user_id).await?.is_none() {
            return Err(CatalogError::not_found("user", user_id));
        }
        let business = tx.insert_business(&draft).await?;
        tx.attach_member(user_id, business.id).await?;
        tx.commit().await?;
        info!(business_id = %business.id, user_id = %user_id, "business registered");
        Ok(business)
    }

    /// Add a membership. Returns `false` if the user was already a member.
    #[instrument(skip(self), err)]
    pub async fn join(&self, user_id: UserId, business_id: BusinessId) -> CatalogResult<bool> {
        let mut tx = self.store.begin().await?;
        if tx.get_user(user_id).await?.is_none() {
            return Err(CatalogError::not_found("user", user_id));
        }
        existing(&mut *tx, business_id).await?;
        let joined = tx.attach_member(user_id, business_id).await?;
        tx.commit().await?;
        Ok(joined)
    }

    /// Remove a membership; the business itself stays. Returns `false` if
    /// there was nothing to remove.
    #[instrument(skip(self), err)]
    pub async fn leave(&self, user_id: UserId, business_id: BusinessId) -> CatalogResult<bool> {
        let mut tx = self.store.begin().await?;
        let left = tx.detach_member(user_id, business_id).await?;
        tx.commit().await?;
        Ok(left)
    }
}

async fn existing(tx: &mut dyn CatalogTx, id: BusinessId) -> CatalogResult<Business> {
    tx.get_business(id)
        .await?
        .ok_or_else(|| CatalogError::not_found("business", id))
}
