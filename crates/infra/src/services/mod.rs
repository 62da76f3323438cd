//! Catalog services: the operations callers (the CLI, tests, a future HTTP
//! layer) invoke. Each operation runs in one store transaction and maps
//! failures onto [`CatalogError`].

pub mod businesses;
pub mod collections;
pub mod items;
pub mod users;

use thiserror::Error;

use shelfwise_auth::{AuthzError, Visibility};
use shelfwise_catalog::Business;
use shelfwise_core::{BusinessId, DomainError};

use crate::store::{BusinessFilter, CatalogTx, StoreError};

pub use businesses::{BusinessService, BusinessView};
pub use collections::CollectionHierarchyManager;
pub use items::ItemService;
pub use users::{UserDirectory, UserView};

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Errors surfaced by the catalog services.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Missing or malformed input, or a reference to a row that does not exist.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl CatalogError {
    pub fn not_found(entity: &'static str, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => Self::Validation(msg),
        }
    }
}

impl From<AuthzError> for CatalogError {
    fn from(err: AuthzError) -> Self {
        Self::Forbidden(err.to_string())
    }
}

/// How a listing translates into a store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ListScope {
    All,
    Only(Vec<BusinessId>),
    Nothing,
}

impl ListScope {
    /// `None` when the query can be skipped because nothing is visible.
    pub(crate) fn filter(&self) -> Option<BusinessFilter<'_>> {
        match self {
            ListScope::All => Some(None),
            ListScope::Only(ids) => Some(Some(ids.as_slice())),
            ListScope::Nothing => None,
        }
    }
}

impl From<&Visibility> for ListScope {
    fn from(visibility: &Visibility) -> Self {
        match visibility {
            Visibility::All => ListScope::All,
            Visibility::Businesses(ids) if ids.is_empty() => ListScope::Nothing,
            Visibility::Businesses(ids) => ListScope::Only(ids.iter().copied().collect()),
            Visibility::Nothing => ListScope::Nothing,
        }
    }
}

/// Load a business that a write refers to; a missing one is bad input.
pub(crate) async fn referenced_business(
    tx: &mut dyn CatalogTx,
    id: BusinessId,
) -> CatalogResult<Business> {
    tx.get_business(id)
        .await?
        .ok_or_else(|| CatalogError::Validation(format!("business {id} does not exist")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfwise_auth::{visibility, Role};

    #[test]
    fn domain_errors_become_validation_errors() {
        let err: CatalogError = DomainError::validation("name is required").into();
        assert!(matches!(err, CatalogError::Validation(msg) if msg == "name is required"));
    }

    #[test]
    fn membership_errors_become_forbidden() {
        let err: CatalogError = AuthzError::NotAMember(BusinessId::new(3)).into();
        assert!(matches!(err, CatalogError::Forbidden(_)));
    }

    #[test]
    fn list_scope_follows_visibility() {
        assert_eq!(ListScope::from(&visibility(&Role::ADMIN, &[])), ListScope::All);
        assert_eq!(
            ListScope::from(&visibility(&Role::USER, &[BusinessId::new(5)])),
            ListScope::Only(vec![BusinessId::new(5)])
        );
        assert_eq!(ListScope::from(&visibility(&Role::USER, &[])), ListScope::Nothing);
        assert_eq!(ListScope::from(&visibility(&Role::new("guest"), &[])), ListScope::Nothing);
        assert_eq!(ListScope::Nothing.filter(), None);
    }
}
