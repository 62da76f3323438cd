//! `shelfwise-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod validation;

pub use entity::{BusinessScoped, Entity};
pub use error::{DomainError, DomainResult};
pub use id::{BusinessId, CollectionId, ItemId, UserId};
