use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use shelfwise_core::validation::{optional_text, required_text, NAME_MAX, TEXT_MAX};
use shelfwise_core::{BusinessId, BusinessScoped, CollectionId, DomainResult, Entity};

use crate::hierarchy::guard_self_parent;

/// A named category owned by one business, optionally nested under a parent.
///
/// `parent_id` is a plain nullable reference: nothing prevents it from
/// pointing at a row that has since been deleted, so readers must treat a
/// missing parent as "no parent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub business_id: BusinessId,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<CollectionId>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Collection {
    type Id = CollectionId;

    fn id(&self) -> CollectionId {
        self.id
    }
}

impl BusinessScoped for Collection {
    fn business_id(&self) -> BusinessId {
        self.business_id
    }
}

/// How a caller names the parent of a new collection.
///
/// Serialized untagged: `null`, a number, or a predefined key string.
/// Deserialization follows [`ParentRef::parse`], so `"12"` is an id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParentRef {
    /// Top-level collection.
    #[default]
    Absent,
    /// An existing collection.
    Id(CollectionId),
    /// A key from the predefined parent table (e.g. `"shoes"`).
    Predefined(String),
}

impl ParentRef {
    /// Interpret a raw form value.
    ///
    /// Blank means no parent, a positive integer is an id, a non-positive
    /// integer is treated as no parent, anything else is a predefined key.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => ParentRef::Absent,
            Some(s) => match s.parse::<i64>() {
                Ok(n) if n > 0 => ParentRef::Id(CollectionId::new(n)),
                Ok(_) => ParentRef::Absent,
                Err(_) => ParentRef::Predefined(s.to_string()),
            },
        }
    }
}

impl<'de> Deserialize<'de> for ParentRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Option::<Raw>::deserialize(deserializer)? {
            None => ParentRef::Absent,
            Some(Raw::Number(n)) if n > 0 => ParentRef::Id(CollectionId::new(n)),
            Some(Raw::Number(_)) => ParentRef::Absent,
            Some(Raw::Text(text)) => ParentRef::parse(Some(&text)),
        })
    }
}

impl From<Option<CollectionId>> for ParentRef {
    fn from(value: Option<CollectionId>) -> Self {
        value.map_or(ParentRef::Absent, ParentRef::Id)
    }
}

fn default_active() -> bool {
    true
}

/// Create request for a collection, before its parent is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDraft {
    pub business_id: BusinessId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent: ParentRef,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl CollectionDraft {
    pub fn new(business_id: BusinessId, name: impl Into<String>) -> Self {
        Self {
            business_id,
            name: name.into(),
            description: None,
            parent: ParentRef::Absent,
            active: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = parent;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Normalize and check the plain text fields. The parent reference is
    /// resolved separately (see [`crate::hierarchy::plan_parent`]).
    pub fn validate(self) -> DomainResult<Self> {
        Ok(Self {
            name: required_text("name", &self.name, NAME_MAX)?,
            description: optional_text("description", self.description.as_deref(), TEXT_MAX)?,
            ..self
        })
    }

    /// Row to insert once the parent id is known.
    pub fn into_new(self, parent_id: Option<CollectionId>) -> NewCollection {
        NewCollection {
            business_id: self.business_id,
            name: self.name,
            description: self.description,
            parent_id,
            active: self.active,
        }
    }
}

/// A validated collection row ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCollection {
    pub business_id: BusinessId,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<CollectionId>,
    pub active: bool,
}

/// Partial update of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionChanges {
    pub business_id: Option<BusinessId>,
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub parent_id: Option<Option<CollectionId>>,
    pub active: Option<bool>,
}

impl CollectionChanges {
    pub fn business(mut self, business_id: BusinessId) -> Self {
        self.business_id = Some(business_id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    pub fn parent(mut self, parent_id: Option<CollectionId>) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }

    /// Validate the changes and apply them to `collection`.
    ///
    /// A parent equal to the collection itself is silently replaced by no
    /// parent. On error `collection` is left untouched.
    pub fn apply_to(&self, collection: &mut Collection) -> DomainResult<()> {
        let name = match &self.name {
            Some(name) => required_text("name", name, NAME_MAX)?,
            None => collection.name.clone(),
        };
        let description = match &self.description {
            Some(description) => optional_text("description", description.as_deref(), TEXT_MAX)?,
            None => collection.description.clone(),
        };

        if let Some(business_id) = self.business_id {
            collection.business_id = business_id;
        }
        if let Some(parent_id) = self.parent_id {
            collection.parent_id = guard_self_parent(collection.id, parent_id);
        }
        if let Some(active) = self.active {
            collection.active = active;
        }
        collection.name = name;
        collection.description = description;
        Ok(())
    }
}

/// Id and name of a resolved parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSummary {
    pub id: CollectionId,
    pub name: String,
}

impl From<&Collection> for ParentSummary {
    fn from(value: &Collection) -> Self {
        Self {
            id: value.id,
            name: value.name.clone(),
        }
    }
}

/// A collection with its business name and resolved parent, as handed to
/// renderers. `parent` is `None` both for top-level collections and for
/// collections whose parent row no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionView {
    #[serde(flatten)]
    pub collection: Collection,
    pub business_name: Option<String>,
    pub parent: Option<ParentSummary>,
}

impl BusinessScoped for CollectionView {
    fn business_id(&self) -> BusinessId {
        self.collection.business_id
    }
}
