//! `userdesk-core` — domain building blocks shared by the session and client crates.
//!
//! This crate contains **pure domain** types (no HTTP, no persistence).

pub mod entity;
pub mod error;
pub mod id;
pub mod query;
pub mod user;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::UserId;
pub use query::{FilterCriteria, Page, Pagination, SortDirection, SortOrder};
pub use user::{UserDraft, UserRecord};
pub use value_object::ValueObject;
