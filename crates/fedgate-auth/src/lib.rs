//! # fedgate-auth
//!
//! Federated login engine for a learning management system.
//!
//! An external identity provider authenticates the user and hands over an
//! attribute assertion. This crate turns that assertion into a local session:
//!
//! - resolves the local username from a configured attribute
//! - decides whether an unknown principal may be provisioned just-in-time
//! - maps course claims and authorizes the login
//! - reconciles system roles against the role claims
//! - materializes the session and resolves the post-login redirect
//! - aggregates the errors of the attempt and decides what the user sees
//!
//! ## Modules
//!
//! - [`assertion`] - Attribute assertions and username extraction
//! - [`config`] - Login engine configuration
//! - [`provisioning`] - Just-in-time provisioning gate and user creation
//! - [`courses`] - Course claim mapping
//! - [`authorization`] - Login authorization and hook override
//! - [`roles`] - System role reconciliation
//! - [`session`] - Session materialization
//! - [`redirect`] - Post-login redirect resolution
//! - [`report`] - Error aggregation and reporting
//! - [`hooks`] - Extension points
//! - [`idp`] - Identity provider client interface
//! - [`log_sink`] - Auxiliary login log
//! - [`storage`] - Directory service abstraction
//! - [`pipeline`] - Stage orchestration

pub mod assertion;
pub mod authorization;
pub mod config;
pub mod courses;
pub mod error;
pub mod hooks;
pub mod idp;
pub mod log_sink;
pub mod pipeline;
pub mod provisioning;
pub mod redirect;
pub mod report;
pub mod roles;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

pub use assertion::{Assertion, DEFAULT_USERNAME_ATTRIBUTE, PrincipalIdentity};
pub use authorization::AuthorizationVerdict;
pub use config::{ConfigError, CourseEntry, CourseSupport, CourseTableConfig, LoginConfig};
pub use courses::{CourseMapper, CourseMapping, MappedCourse, TableCourseMapper};
pub use error::{ErrorCategory, LoginError};
pub use hooks::{HookRegistry, HookVerdict, LoginHooks, NoopHooks};
pub use idp::{AuthState, IdentityProvider, IdpError, StaticIdentityProvider};
pub use log_sink::{
    FileLogSink, LogEntry, LogLevel, LogSink, LogSinkError, LogSinkExt, MemoryLogSink,
    TracingLogSink,
};
pub use pipeline::{
    CompletedLogin, LoginContext, LoginOutcome, LoginPipeline, LoginRequest, LogoutRequest,
};
pub use provisioning::ProvisioningAction;
pub use redirect::RedirectTarget;
pub use report::{ErrorPage, ErrorSet};
pub use roles::{RoleMappingTable, RoleOp};
pub use session::LoggedInPrincipal;
pub use storage::{
    DirectoryError, DirectoryResult, DirectoryService, DirectoryUser, RoleAssignment,
    RoleDescriptor, SYSTEM_SCOPE,
};

/// Type alias for login pipeline results.
pub type LoginResult<T> = Result<T, LoginError>;
