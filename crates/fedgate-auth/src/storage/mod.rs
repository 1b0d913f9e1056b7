//! Directory service abstraction.
//!
//! The login engine never talks to a user store directly. It relies on the
//! [`DirectoryService`] trait for user lookup, creation, profile completion
//! and system role assignment.
//!
//! # Implementations
//!
//! Storage implementations are provided in separate crates:
//!
//! - `fedgate-directory-memory` - concurrent in-memory directory

pub mod directory;

pub use directory::{
    DirectoryError, DirectoryResult, DirectoryService, DirectoryUser, RoleAssignment,
    RoleDescriptor, SYSTEM_SCOPE,
};
