//! Collection hierarchy rules.
//!
//! Collections form a shallow forest per business through a nullable
//! `parent_id`. There is no cycle detection and no balancing: the rules here
//! only decide where a new collection hangs, keep a collection from being its
//! own parent, and arrange rows into a forest for display.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use shelfwise_core::{BusinessId, CollectionId, DomainError, DomainResult};

use crate::collection::{Collection, NewCollection, ParentRef};

/// Description given to parents synthesized from the predefined table.
pub const AUTO_PARENT_DESCRIPTION: &str = "Auto-created parent category";

/// One entry of the predefined parent table: the key callers send and the
/// collection name it materializes as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredefinedParent {
    pub key: String,
    pub name: String,
}

impl PredefinedParent {
    /// Entry whose display name is the key with its first letter uppercased.
    pub fn from_key(key: impl Into<String>) -> Self {
        let key = key.into().trim().to_lowercase();
        let name = capitalize(&key);
        Self { key, name }
    }
}

/// The fixed set of category keys usable as a parent without an existing id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredefinedParents {
    entries: Vec<PredefinedParent>,
}

impl PredefinedParents {
    pub fn new(entries: Vec<PredefinedParent>) -> Self {
        Self { entries }
    }

    pub fn from_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self::new(keys.into_iter().map(PredefinedParent::from_key).collect())
    }

    /// Case-insensitive lookup by key.
    pub fn lookup(&self, key: &str) -> Option<&PredefinedParent> {
        let key = key.trim();
        self.entries.iter().find(|p| p.key.eq_ignore_ascii_case(key))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PredefinedParent> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PredefinedParents {
    fn default() -> Self {
        Self::from_keys(["shoes", "clothing", "accessories", "electronics", "furniture"])
    }
}

/// Uppercase the first character (`"shoes"` -> `"Shoes"`).
pub fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Where a new collection should hang.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentPlan {
    /// No parent.
    Root,
    /// Under an existing collection (existence is checked by the caller).
    Existing(CollectionId),
    /// Under the business's collection with this name, created if missing.
    Synthesize { name: String },
}

/// Turn a parent reference into a plan, using the predefined table for keys.
pub fn plan_parent(parent: &ParentRef, predefined: &PredefinedParents) -> DomainResult<ParentPlan> {
    match parent {
        ParentRef::Absent => Ok(ParentPlan::Root),
        ParentRef::Id(id) => Ok(ParentPlan::Existing(*id)),
        ParentRef::Predefined(key) => predefined
            .lookup(key)
            .map(|p| ParentPlan::Synthesize {
                name: p.name.clone(),
            })
            .ok_or_else(|| {
                DomainError::validation(format!("unknown predefined parent category '{key}'"))
            }),
    }
}

/// The row inserted when a predefined parent has to be materialized.
pub fn synthetic_parent(business_id: BusinessId, name: &str) -> NewCollection {
    NewCollection {
        business_id,
        name: name.to_string(),
        description: Some(AUTO_PARENT_DESCRIPTION.to_string()),
        parent_id: None,
        active: true,
    }
}

/// A collection can never be its own parent; such a request becomes "no parent".
pub fn guard_self_parent(id: CollectionId, parent_id: Option<CollectionId>) -> Option<CollectionId> {
    parent_id.filter(|p| *p != id)
}

/// What happens to children when their parent collection is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Children keep their (now dangling) `parent_id`.
    #[default]
    Orphan,
    /// Children become top-level collections.
    Detach,
    /// Children (and, transitively, their descendants) are deleted too.
    Cascade,
}

impl core::str::FromStr for DeletePolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orphan" => Ok(Self::Orphan),
            "detach" => Ok(Self::Detach),
            "cascade" => Ok(Self::Cascade),
            other => Err(DomainError::validation(format!(
                "delete policy must be one of: orphan, detach, cascade (got '{other}')"
            ))),
        }
    }
}

/// A collection with its children, for tree rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionNode {
    #[serde(flatten)]
    pub collection: Collection,
    pub children: Vec<CollectionNode>,
}

/// Arrange collections into a forest.
///
/// Roots are collections without a parent, collections whose parent is not
/// among `collections` (deleted or not visible), and, as a last resort, any
/// row not reachable from another root (parent cycles). Siblings keep id
/// order. Every input row appears exactly once.
pub fn build_forest(collections: Vec<Collection>) -> Vec<CollectionNode> {
    let present: HashSet<CollectionId> = collections.iter().map(|c| c.id).collect();

    let mut by_id: BTreeMap<CollectionId, Collection> = BTreeMap::new();
    let mut children: HashMap<CollectionId, Vec<CollectionId>> = HashMap::new();
    let mut roots = Vec::new();

    for c in collections {
        match c.parent_id {
            Some(parent) if parent != c.id && present.contains(&parent) => {
                children.entry(parent).or_default().push(c.id)
            }
            _ => roots.push(c.id),
        }
        by_id.insert(c.id, c);
    }
    for ids in children.values_mut() {
        ids.sort();
    }
    roots.sort();

    let mut visited = HashSet::new();
    let mut forest: Vec<CollectionNode> = roots
        .into_iter()
        .filter_map(|id| build_node(id, &by_id, &children, &mut visited))
        .collect();

    let stranded: Vec<CollectionId> = by_id.keys().copied().filter(|id| !visited.contains(id)).collect();
    for id in stranded {
        if let Some(node) = build_node(id, &by_id, &children, &mut visited) {
            forest.push(node);
        }
    }
    forest
}

fn build_node(
    id: CollectionId,
    by_id: &BTreeMap<CollectionId, Collection>,
    children: &HashMap<CollectionId, Vec<CollectionId>>,
    visited: &mut HashSet<CollectionId>,
) -> Option<CollectionNode> {
    if !visited.insert(id) {
        return None;
    }
    let collection = by_id.get(&id)?.clone();
    let kids = children
        .get(&id)
        .map(|ids| {
            ids.iter()
                .filter_map(|child| build_node(*child, by_id, children, visited))
                .collect()
        })
        .unwrap_or_default();
    Some(CollectionNode {
        collection,
        children: kids,
    })
}
