use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shelfwise_core::validation::{optional_text, required_text, NAME_MAX, URL_MAX};
use shelfwise_core::{
    BusinessId, BusinessScoped, CollectionId, DomainError, DomainResult, Entity, ItemId,
};

use crate::collection::Collection;

/// A catalog entry. Always belongs to one business and one collection of
/// that business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub business_id: BusinessId,
    pub collection_id: CollectionId,
    pub title: String,
    pub introduction: Option<String>,
    pub description: Option<String>,
    /// Path returned by the external file storage.
    pub image_path: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> ItemId {
        self.id
    }
}

impl BusinessScoped for Item {
    fn business_id(&self) -> BusinessId {
        self.business_id
    }
}

fn default_active() -> bool {
    true
}

/// Input for creating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDraft {
    pub business_id: BusinessId,
    pub collection_id: CollectionId,
    pub title: String,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl ItemDraft {
    pub fn new(business_id: BusinessId, collection_id: CollectionId, title: impl Into<String>) -> Self {
        Self {
            business_id,
            collection_id,
            title: title.into(),
            introduction: None,
            description: None,
            image_path: None,
            active: true,
        }
    }

    pub fn with_image(mut self, path: impl Into<String>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    pub fn validate(self) -> DomainResult<Self> {
        Ok(Self {
            title: required_text("title", &self.title, NAME_MAX)?,
            introduction: normalize_long(self.introduction.as_deref()),
            description: normalize_long(self.description.as_deref()),
            image_path: optional_text("image_path", self.image_path.as_deref(), URL_MAX)?,
            ..self
        })
    }
}

// Introduction and description are unbounded text columns.
fn normalize_long(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// The collection an item points at must belong to the item's business.
pub fn ensure_collection_matches(business_id: BusinessId, collection: &Collection) -> DomainResult<()> {
    if collection.business_id != business_id {
        return Err(DomainError::validation(format!(
            "collection {} belongs to business {}, not {}",
            collection.id, collection.business_id, business_id
        )));
    }
    Ok(())
}

/// Partial update of an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChanges {
    pub business_id: Option<BusinessId>,
    pub collection_id: Option<CollectionId>,
    pub title: Option<String>,
    pub introduction: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub image_path: Option<Option<String>>,
    pub active: Option<bool>,
}

impl ItemChanges {
    pub fn apply_to(&self, item: &mut Item) -> DomainResult<()> {
        let title = match &self.title {
            Some(title) => required_text("title", title, NAME_MAX)?,
            None => item.title.clone(),
        };
        let image_path = match &self.image_path {
            Some(path) => optional_text("image_path", path.as_deref(), URL_MAX)?,
            None => item.image_path.clone(),
        };

        if let Some(business_id) = self.business_id {
            item.business_id = business_id;
        }
        if let Some(collection_id) = self.collection_id {
            item.collection_id = collection_id;
        }
        if let Some(introduction) = &self.introduction {
            item.introduction = normalize_long(introduction.as_deref());
        }
        if let Some(description) = &self.description {
            item.description = normalize_long(description.as_deref());
        }
        if let Some(active) = self.active {
            item.active = active;
        }
        item.title = title;
        item.image_path = image_path;
        Ok(())
    }
}

/// An item with the names of its business and collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub business_name: Option<String>,
    pub collection_name: Option<String>,
}

impl BusinessScoped for ItemView {
    fn business_id(&self) -> BusinessId {
        self.item.business_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(business: i64) -> Collection {
        Collection {
            id: CollectionId::new(7),
            business_id: BusinessId::new(business),
            name: "Boots".to_string(),
            description: None,
            parent_id: None,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn draft_requires_title() {
        let err = ItemDraft::new(BusinessId::new(1), CollectionId::new(7), " ")
            .validate()
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn draft_normalizes_optional_text() {
        let mut draft = ItemDraft::new(BusinessId::new(1), CollectionId::new(7), "Chelsea boot");
        draft.introduction = Some("   ".into());
        draft.description = Some(" Leather ".into());
        let draft = draft.validate().unwrap();
        assert_eq!(draft.introduction, None);
        assert_eq!(draft.description.as_deref(), Some("Leather"));
    }

    #[test]
    fn collection_must_belong_to_the_same_business() {
        assert!(ensure_collection_matches(BusinessId::new(1), &collection(1)).is_ok());
        assert!(ensure_collection_matches(BusinessId::new(2), &collection(1)).is_err());
    }

    #[test]
    fn changes_can_clear_the_image() {
        let mut item = Item {
            id: ItemId::new(1),
            business_id: BusinessId::new(1),
            collection_id: CollectionId::new(7),
            title: "Chelsea boot".into(),
            introduction: None,
            description: None,
            image_path: Some("items/boot.png".into()),
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let changes = ItemChanges {
            image_path: Some(None),
            ..ItemChanges::default()
        };
        changes.apply_to(&mut item).unwrap();
        assert_eq!(item.image_path, None);
        assert_eq!(item.title, "Chelsea boot");
    }
}
