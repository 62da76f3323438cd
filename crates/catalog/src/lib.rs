//! Catalog domain module.
//!
//! Businesses own collections, collections own items, users belong to
//! businesses. Everything here is deterministic domain logic (no IO, no
//! storage): records, validated drafts, change sets and the hierarchy rules
//! for collections.

pub mod business;
pub mod collection;
pub mod hierarchy;
pub mod item;
pub mod user;

pub use business::{Business, BusinessChanges, BusinessDraft};
pub use collection::{
    Collection, CollectionChanges, CollectionDraft, CollectionView, NewCollection, ParentRef,
    ParentSummary,
};
pub use hierarchy::{
    build_forest, guard_self_parent, plan_parent, CollectionNode, DeletePolicy, ParentPlan,
    PredefinedParent, PredefinedParents, AUTO_PARENT_DESCRIPTION,
};
pub use item::{Item, ItemChanges, ItemDraft, ItemView};
pub use user::{User, UserDraft};
