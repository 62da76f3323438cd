//! `shelfwise-auth`: pure authorization boundary.
//!
//! This crate is intentionally decoupled from transport and storage: callers
//! resolve who the user is, this crate decides what they may see.

pub mod authorize;
pub mod principal;
pub mod roles;

pub use authorize::{authorize_member, visibility, AuthzError, Visibility};
pub use principal::Principal;
pub use roles::Role;
