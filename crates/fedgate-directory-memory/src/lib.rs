//! In-memory directory backend for the fedgate login engine.
//!
//! This crate provides an in-memory implementation of the `DirectoryService`
//! trait from `fedgate-auth`, using papaya lock-free HashMap for the user
//! records so that concurrent logins of the same principal race safely.
//!
//! # Example
//!
//! ```ignore
//! use fedgate_directory_memory::InMemoryDirectory;
//! use fedgate_auth::DirectoryService;
//!
//! let directory = InMemoryDirectory::from_fixture(fixture)?;
//! let alice = directory.find_user_by_username("alice").await?;
//! ```

mod directory_impl;
pub mod fixture;
pub mod storage;

pub use fedgate_auth::{DirectoryError, DirectoryService, DirectoryUser};
pub use fixture::{DirectoryFixture, FixtureAssignment, FixtureError, FixtureUser};
pub use storage::InMemoryDirectory;

/// Type alias for a shareable directory instance.
pub type DynDirectory = std::sync::Arc<dyn DirectoryService>;

/// Creates a new, empty in-memory directory.
pub fn create_directory() -> DynDirectory {
    std::sync::Arc::new(InMemoryDirectory::new())
}
