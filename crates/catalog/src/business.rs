use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelfwise_core::validation::{optional_text, required_text, NAME_MAX, TEXT_MAX, URL_MAX};
use shelfwise_core::{BusinessId, BusinessScoped, DomainResult, Entity};

/// A tenant: owns collections and items, has member users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    pub id: BusinessId,
    pub name: String,
    /// Stored logo path or URL (file storage is external).
    pub logo: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Business {
    type Id = BusinessId;

    fn id(&self) -> BusinessId {
        self.id
    }
}

impl BusinessScoped for Business {
    fn business_id(&self) -> BusinessId {
        self.id
    }
}

/// Input for creating a business.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessDraft {
    pub name: String,
    pub logo: Option<String>,
    pub address: Option<String>,
}

impl BusinessDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    /// Normalize and check every field.
    pub fn validate(self) -> DomainResult<Self> {
        Ok(Self {
            name: required_text("name", &self.name, NAME_MAX)?,
            logo: optional_text("logo", self.logo.as_deref(), URL_MAX)?,
            address: optional_text("address", self.address.as_deref(), TEXT_MAX)?,
        })
    }
}

/// Partial update of a business. `None` leaves a field untouched; the inner
/// `Option` of nullable fields clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessChanges {
    pub name: Option<String>,
    pub logo: Option<Option<String>>,
    pub address: Option<Option<String>>,
}

impl BusinessChanges {
    /// Validate the changes and apply them to `business`.
    ///
    /// On error `business` is left untouched.
    pub fn apply_to(&self, business: &mut Business) -> DomainResult<()> {
        let name = match &self.name {
            Some(name) => required_text("name", name, NAME_MAX)?,
            None => business.name.clone(),
        };
        let logo = match &self.logo {
            Some(logo) => optional_text("logo", logo.as_deref(), URL_MAX)?,
            None => business.logo.clone(),
        };
        let address = match &self.address {
            Some(address) => optional_text("address", address.as_deref(), TEXT_MAX)?,
            None => business.address.clone(),
        };

        business.name = name;
        business.logo = logo;
        business.address = address;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfwise_core::DomainError;

    fn business() -> Business {
        Business {
            id: BusinessId::new(1),
            name: "Acme".to_string(),
            logo: Some("logos/acme.png".to_string()),
            address: Some("1 Main St".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn draft_validation_normalizes_fields() {
        let draft = BusinessDraft::new("  Acme ").with_address("  ").validate().unwrap();
        assert_eq!(draft.name, "Acme");
        assert_eq!(draft.address, None);
    }

    #[test]
    fn draft_rejects_missing_name() {
        let err = BusinessDraft::new("").validate().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn changes_clear_nullable_fields() {
        let mut b = business();
        let changes = BusinessChanges {
            logo: Some(None),
            ..BusinessChanges::default()
        };
        changes.apply_to(&mut b).unwrap();
        assert_eq!(b.logo, None);
        assert_eq!(b.address.as_deref(), Some("1 Main St"));
    }

    #[test]
    fn invalid_changes_leave_business_untouched() {
        let mut b = business();
        let changes = BusinessChanges {
            name: Some("Renamed".to_string()),
            address: Some(Some("x".repeat(TEXT_MAX + 1))),
            ..BusinessChanges::default()
        };
        assert!(changes.apply_to(&mut b).is_err());
        assert_eq!(b.name, "Acme");
        assert_eq!(b.address.as_deref(), Some("1 Main St"));
    }
}
