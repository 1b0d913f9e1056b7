//! Login pipeline orchestration.
//!
//! [`LoginPipeline::run`] drives one login attempt through its stages:
//!
//! 1. obtain the assertion from the identity provider
//! 2. filter attributes and extract the username
//! 3. look the principal up and gate just-in-time provisioning
//! 4. map course claims and authorize the login
//! 5. create the user if needed and reconcile system roles
//! 6. materialize the session and resolve the redirect
//!
//! A [`LoginContext`] carries the per-attempt state from stage to stage. The
//! first terminating error stops the attempt; non-terminating course
//! enrollment errors accumulate in the context and are reported once the
//! login completes.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::LoginResult;
use crate::assertion::{Assertion, PrincipalIdentity};
use crate::authorization::authorize;
use crate::config::{ConfigError, LoginConfig};
use crate::courses::{CourseMapper, CourseMapping, TableCourseMapper};
use crate::error::{ErrorCategory, LoginError};
use crate::hooks::{LoginHooks, NoopHooks};
use crate::idp::{AuthState, IdentityProvider, IdpError};
use crate::log_sink::{FileLogSink, LogSink, LogSinkExt, TracingLogSink};
use crate::provisioning::{ProvisioningAction, authorize_provisioning, provision_user};
use crate::redirect;
use crate::report::{ErrorPage, ErrorSet, ReportOutcome, report};
use crate::roles::{RoleOp, RoleSync};
use crate::session::{LoggedInPrincipal, materialize};
use crate::storage::DirectoryService;

// =============================================================================
// Requests
// =============================================================================

/// Incoming login request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    /// Destination explicitly requested with the login.
    pub wants_url: Option<String>,
    /// Destination stashed in the session before the login started.
    pub session_wants_url: Option<String>,
    /// Only consult an existing provider session, never force authentication.
    pub passive: bool,
}

/// Incoming logout request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogoutRequest {
    /// URI of the script that received the logout.
    pub script_uri: Option<String>,
    /// Page the user came from.
    pub referer: Option<String>,
}

impl LogoutRequest {
    /// Returns where the user goes once logged out.
    ///
    /// The script URI with the login endpoint path removed, otherwise the
    /// referer, otherwise `/`.
    #[must_use]
    pub fn return_url(&self, login_endpoint_path: &str) -> String {
        let endpoint = login_endpoint_path.trim_start_matches('/');
        if let Some(uri) = non_blank(self.script_uri.as_deref()) {
            if endpoint.is_empty() {
                return uri.to_string();
            }
            return uri.replace(endpoint, "");
        }
        non_blank(self.referer.as_deref())
            .unwrap_or("/")
            .to_string()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Context and outcome
// =============================================================================

/// State of one login attempt, owned by the pipeline while it runs.
#[derive(Debug, Clone)]
pub struct LoginContext {
    /// The request being served.
    pub request: LoginRequest,
    /// The pipeline's copy of the assertion, after attribute filtering.
    pub assertion: Assertion,
    /// Non-terminating errors recorded so far.
    pub errors: ErrorSet,
    /// Course mapping, when course enrollment is in use.
    pub course_mapping: Option<CourseMapping>,
    /// Role operations applied to the directory.
    pub role_ops: Vec<RoleOp>,
}

impl LoginContext {
    /// Creates the context of a new attempt.
    #[must_use]
    pub fn new(request: LoginRequest, assertion: Assertion) -> Self {
        Self {
            request,
            assertion,
            errors: ErrorSet::new(),
            course_mapping: None,
            role_ops: Vec::new(),
        }
    }
}

/// A login that went through every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedLogin {
    /// The session to install.
    pub principal: LoggedInPrincipal,
    /// Whether the user was created by this login.
    pub provisioning: ProvisioningAction,
    /// Role operations applied to the directory.
    pub role_ops: Vec<RoleOp>,
    /// Course mapping carried forward for enrollment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_mapping: Option<CourseMapping>,
}

/// Final result of a login or logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoginOutcome {
    /// Send the user to `location`.
    Redirect {
        /// Target URL.
        location: String,
        /// The completed login, absent for provider redirects and logouts.
        #[serde(skip_serializing_if = "Option::is_none")]
        login: Option<Box<CompletedLogin>>,
    },
    /// Show an error page.
    ErrorPage {
        /// Messages and the way out.
        page: ErrorPage,
        /// The completed login, when the errors did not prevent it.
        #[serde(skip_serializing_if = "Option::is_none")]
        login: Option<Box<CompletedLogin>>,
    },
}

impl LoginOutcome {
    /// Returns where the user is sent next.
    #[must_use]
    pub fn location(&self) -> &str {
        match self {
            Self::Redirect { location, .. } => location,
            Self::ErrorPage { page, .. } => &page.redirect,
        }
    }

    /// Returns the completed login, if any.
    #[must_use]
    pub fn login(&self) -> Option<&CompletedLogin> {
        match self {
            Self::Redirect { login, .. } | Self::ErrorPage { login, .. } => login.as_deref(),
        }
    }

    /// Returns the error page, if one is shown.
    #[must_use]
    pub fn error_page(&self) -> Option<&ErrorPage> {
        match self {
            Self::ErrorPage { page, .. } => Some(page),
            Self::Redirect { .. } => None,
        }
    }

    /// Returns `true` if an error page is shown.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error_page().is_some()
    }
}

enum Acquired {
    Assertion(Assertion),
    Redirect(String),
}

// =============================================================================
// Pipeline
// =============================================================================

/// Runs login attempts against one configuration and set of collaborators.
///
/// Cheap to share: every collaborator sits behind an `Arc`, and the pipeline
/// keeps no per-attempt state.
#[derive(Clone)]
pub struct LoginPipeline {
    config: Arc<LoginConfig>,
    idp: Arc<dyn IdentityProvider>,
    directory: Arc<dyn DirectoryService>,
    courses: Arc<dyn CourseMapper>,
    hooks: Arc<dyn LoginHooks>,
    sink: Arc<dyn LogSink>,
}

impl LoginPipeline {
    /// Creates a pipeline with the table course mapper, no hooks, and the log
    /// sink selected by `log_file`.
    ///
    /// # Errors
    ///
    /// Returns any error from [`LoginConfig::validate`]; a pipeline never runs
    /// on an unchecked configuration.
    pub fn new(
        config: LoginConfig,
        idp: Arc<dyn IdentityProvider>,
        directory: Arc<dyn DirectoryService>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let courses = Arc::new(TableCourseMapper::new(
            &config.courses,
            config.role_mapping.clone(),
        ));
        let sink: Arc<dyn LogSink> = match config.log_file.as_deref() {
            Some(path) => Arc::new(FileLogSink::new(path)),
            None => Arc::new(TracingLogSink),
        };

        Ok(Self {
            config: Arc::new(config),
            idp,
            directory,
            courses,
            hooks: Arc::new(NoopHooks),
            sink,
        })
    }

    /// Replaces the hook set.
    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn LoginHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Replaces the course mapper.
    #[must_use]
    pub fn with_course_mapper(mut self, courses: Arc<dyn CourseMapper>) -> Self {
        self.courses = courses;
        self
    }

    /// Replaces the log sink.
    #[must_use]
    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LoginConfig {
        &self.config
    }

    /// Runs one login attempt.
    #[instrument(skip_all, fields(passive = request.passive))]
    pub async fn run(&self, request: LoginRequest) -> LoginOutcome {
        let assertion = match self.acquire_assertion(&request).await {
            Ok(Acquired::Assertion(assertion)) => assertion,
            Ok(Acquired::Redirect(location)) => {
                debug!(%location, "Sending user to the identity provider");
                return LoginOutcome::Redirect {
                    location,
                    login: None,
                };
            }
            Err(err) => return self.fail(ErrorSet::new(), &err, self.config.site_root()),
        };

        let mut ctx = LoginContext::new(request, assertion);
        match self.complete_login(&mut ctx).await {
            Ok(login) => self.finish(ctx, login),
            Err(err) => self.fail(ctx.errors, &err, self.config.login_page_url()),
        }
    }

    /// Logs the user out, through the identity provider when single logout
    /// is enabled.
    #[instrument(skip_all)]
    pub async fn logout(&self, request: LogoutRequest) -> LoginOutcome {
        let return_url = request.return_url(&self.config.login_endpoint_path);
        if !self.config.single_logout {
            return LoginOutcome::Redirect {
                location: return_url,
                login: None,
            };
        }

        match self.idp.logout(&return_url).await {
            Ok(location) => {
                info!(%location, "Single logout started");
                LoginOutcome::Redirect {
                    location,
                    login: None,
                }
            }
            Err(e) => self.fail(
                ErrorSet::new(),
                &unavailable(e),
                self.config.site_root(),
            ),
        }
    }

    async fn acquire_assertion(&self, request: &LoginRequest) -> LoginResult<Acquired> {
        // Passive requests reuse a provider session and only fall back to
        // authentication when there is none.
        if request.passive && self.idp.is_authenticated().await.map_err(unavailable)? {
            return Ok(Acquired::Assertion(
                self.idp.attributes().await.map_err(unavailable)?,
            ));
        }

        match self.idp.require_auth().await.map_err(unavailable)? {
            AuthState::AlreadyAuthenticated(assertion) => Ok(Acquired::Assertion(assertion)),
            AuthState::RedirectIssued { location } => Ok(Acquired::Redirect(location)),
        }
    }

    async fn complete_login(&self, ctx: &mut LoginContext) -> LoginResult<CompletedLogin> {
        let config = &self.config;

        self.hooks.filter_attributes(&mut ctx.assertion).await;
        let username = PrincipalIdentity::from_assertion(&ctx.assertion, &config.username_attribute)?;

        let found = self
            .directory
            .find_user_by_username(username.as_str())
            .await
            .map_err(|e| LoginError::directory_write(username.as_str(), e))?;
        let exists = found.is_some()
            && self
                .hooks
                .user_exists(&username, &ctx.assertion, true)
                .await;
        // A hook may hide a user the directory knows about.
        let found = found.filter(|_| exists);

        authorize_provisioning(exists, config.disable_jit, &username)?;

        let any_course_active = self.map_courses(ctx, &username).await;
        authorize(
            &username,
            &ctx.assertion,
            exists,
            any_course_active,
            self.hooks.as_ref(),
        )
        .await
        .into_result(&username)?;

        let provisioned =
            provision_user(self.directory.as_ref(), &username, found, OffsetDateTime::now_utc())
                .await?;
        if config.log_extra_info {
            self.sink.info(&format!("{username} logged"));
        }

        if let Some(claims) = ctx.assertion.get(&config.role_attribute) {
            let sync = RoleSync::new(
                self.directory.as_ref(),
                &config.role_mapping,
                self.sink.as_ref(),
                config.log_extra_info,
            );
            let ops = sync.plan(&provisioned.user, claims).await?;
            sync.apply(&provisioned.user, &ops).await?;
            ctx.role_ops = ops;
        } else {
            debug!(%username, attribute = %config.role_attribute, "No role claims, roles left untouched");
        }

        let principal = materialize(
            self.directory.as_ref(),
            &provisioned.user,
            &ctx.assertion,
            &config.site_root(),
            self.hooks.as_ref(),
        )
        .await?;
        info!(%username, action = %provisioned.action, "Login completed");

        Ok(CompletedLogin {
            principal,
            provisioning: provisioned.action,
            role_ops: std::mem::take(&mut ctx.role_ops),
            course_mapping: ctx.course_mapping.take(),
        })
    }

    /// Maps course claims, recording mapping problems in the context.
    ///
    /// Returns `None` when course enrollment is not in use.
    async fn map_courses(&self, ctx: &mut LoginContext, username: &PrincipalIdentity) -> Option<bool> {
        if !self.config.course_support.is_enabled() {
            return None;
        }
        // Validation guarantees the attribute whenever course support is on.
        let attribute = self.config.course_attribute.as_deref()?;
        let claims = ctx.assertion.get(attribute).unwrap_or_default();
        if claims.is_empty() {
            debug!(%username, attribute, "No course claims in assertion");
        }

        let mapping = self.courses.map_courses(username, claims).await;
        for message in &mapping.errors {
            ctx.errors.push(ErrorCategory::CourseEnrollment, message.as_str());
        }
        let any_course_active = mapping.any_course_active;
        ctx.course_mapping = Some(mapping);
        Some(any_course_active)
    }

    fn finish(&self, ctx: LoginContext, login: CompletedLogin) -> LoginOutcome {
        let site_root = self.config.site_root();
        let target = redirect::resolve(
            ctx.request.wants_url.as_deref(),
            ctx.request.session_wants_url.as_deref(),
            &self.config.login_endpoint_path,
            &site_root,
        );

        let login = Some(Box::new(login));
        match report(
            ctx.errors,
            target.as_str(),
            self.sink.as_ref(),
            self.config.effective_suppressed_categories(),
            false,
        ) {
            ReportOutcome::Proceed => LoginOutcome::Redirect {
                location: target.into_string(),
                login,
            },
            ReportOutcome::Display(page) => LoginOutcome::ErrorPage { page, login },
        }
    }

    fn fail(&self, mut errors: ErrorSet, err: &LoginError, fallback: String) -> LoginOutcome {
        warn!(error = %err, category = %err.category(), "Login failed");
        errors.record(err);

        match report(
            errors,
            &fallback,
            self.sink.as_ref(),
            self.config.effective_suppressed_categories(),
            err.force_display(),
        ) {
            ReportOutcome::Display(page) => LoginOutcome::ErrorPage { page, login: None },
            ReportOutcome::Proceed => LoginOutcome::Redirect {
                location: fallback,
                login: None,
            },
        }
    }

    /// Returns the log file, if the pipeline was built with one.
    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.config.log_file.as_deref()
    }
}

fn unavailable(err: IdpError) -> LoginError {
    LoginError::assertion_unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use url::Url;

    use super::*;
    use crate::config::{CourseEntry, CourseSupport};
    use crate::hooks::HookVerdict;
    use crate::idp::StaticIdentityProvider;
    use crate::log_sink::MemoryLogSink;
    use crate::roles::{ROLE_ACTOR, RoleMappingTable, effective_ops};
    use crate::storage::RoleDescriptor;
    use crate::testing::MockDirectory;

    const SSO: &str = "https://idp.example.org/sso";
    const SLO: &str = "https://idp.example.org/slo";

    fn config() -> LoginConfig {
        let mut config = LoginConfig::new("uid", "affiliation", false, CourseSupport::NoSupport);
        config.site_root = "https://learn.example.org".to_string();
        config.role_mapping = RoleMappingTable::new()
            .with_role("editingteacher", ["staff"])
            .with_role("student", ["learner"]);
        config
    }

    fn course_config() -> LoginConfig {
        let mut config = config();
        config.course_support = CourseSupport::Internal;
        config.course_attribute = Some("courses".to_string());
        config.courses.mapping.insert(
            "math101".to_string(),
            CourseEntry {
                course: "MATH-101".to_string(),
                active: true,
            },
        );
        config
    }

    fn directory() -> Arc<MockDirectory> {
        Arc::new(MockDirectory::new().with_roles(vec![
            RoleDescriptor::new("r-teacher", "editingteacher"),
            RoleDescriptor::new("r-student", "student"),
        ]))
    }

    fn idp(assertion: Assertion) -> Arc<StaticIdentityProvider> {
        Arc::new(StaticIdentityProvider::authenticated(
            assertion,
            Url::parse(SSO).unwrap(),
            Url::parse(SLO).unwrap(),
        ))
    }

    fn anonymous_idp() -> Arc<StaticIdentityProvider> {
        Arc::new(StaticIdentityProvider::anonymous(
            Url::parse(SSO).unwrap(),
            Url::parse(SLO).unwrap(),
        ))
    }

    fn pipeline(
        config: LoginConfig,
        idp: Arc<dyn IdentityProvider>,
        directory: Arc<MockDirectory>,
        sink: Arc<MemoryLogSink>,
    ) -> LoginPipeline {
        LoginPipeline::new(config, idp, directory)
            .unwrap()
            .with_log_sink(sink)
    }

    fn messages(outcome: &LoginOutcome, category: ErrorCategory) -> Vec<String> {
        outcome
            .error_page()
            .and_then(|page| page.errors.get(category))
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    struct CountingMapper {
        calls: AtomicUsize,
        inner: TableCourseMapper,
    }

    #[async_trait]
    impl CourseMapper for CountingMapper {
        async fn map_courses(&self, username: &PrincipalIdentity, claims: &[String]) -> CourseMapping {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.map_courses(username, claims).await
        }
    }

    struct BrokenIdp;

    #[async_trait]
    impl IdentityProvider for BrokenIdp {
        async fn is_authenticated(&self) -> Result<bool, IdpError> {
            Err(IdpError::Unreachable("connection refused".to_string()))
        }

        async fn attributes(&self) -> Result<Assertion, IdpError> {
            Err(IdpError::Unreachable("connection refused".to_string()))
        }

        async fn require_auth(&self) -> Result<AuthState, IdpError> {
            Err(IdpError::Unreachable("connection refused".to_string()))
        }

        async fn logout(&self, _return_url: &str) -> Result<String, IdpError> {
            Err(IdpError::Unreachable("connection refused".to_string()))
        }
    }

    struct DenyAll;

    #[async_trait]
    impl LoginHooks for DenyAll {
        async fn authorize_user(
            &self,
            _username: &PrincipalIdentity,
            _assertion: &Assertion,
            _authorized: bool,
        ) -> HookVerdict {
            HookVerdict::Denied("Account suspended".to_string())
        }
    }

    struct HideEveryone;

    #[async_trait]
    impl LoginHooks for HideEveryone {
        async fn user_exists(
            &self,
            _username: &PrincipalIdentity,
            _assertion: &Assertion,
            _exists: bool,
        ) -> bool {
            false
        }
    }

    struct RenameMail;

    #[async_trait]
    impl LoginHooks for RenameMail {
        async fn filter_attributes(&self, assertion: &mut Assertion) {
            if let Some(values) = assertion.remove("mail") {
                assertion.insert("uid", values);
            }
        }
    }

    #[tokio::test]
    async fn test_existing_user_roles_reconciled() {
        let directory = directory();
        let alice = directory.add_user("alice");
        directory.grant(&alice.id, "r-student", ROLE_ACTOR);
        let sink = Arc::new(MemoryLogSink::new());
        let assertion = Assertion::new()
            .with_attribute("uid", ["Alice"])
            .with_attribute("affiliation", ["staff"]);

        let outcome = pipeline(config(), idp(assertion), directory.clone(), sink)
            .run(LoginRequest::default())
            .await;

        assert_eq!(outcome.location(), "https://learn.example.org/");
        let login = outcome.login().unwrap();
        assert_eq!(login.provisioning, ProvisioningAction::Existing);
        assert_eq!(
            login.role_ops,
            vec![
                RoleOp::Assign(RoleDescriptor::new("r-teacher", "editingteacher")),
                RoleOp::Unassign(RoleDescriptor::new("r-student", "student")),
            ]
        );
        assert_eq!(
            directory.assignments_of(&alice.id),
            vec![("r-teacher".to_string(), ROLE_ACTOR.to_string())]
        );
        assert!(login.principal.logged_in);
        assert_eq!(login.principal.user.username, "alice");
    }

    #[tokio::test]
    async fn test_second_login_is_idempotent() {
        let directory = directory();
        let alice = directory.add_user("alice");
        let assertion = Assertion::new()
            .with_attribute("uid", ["alice"])
            .with_attribute("affiliation", ["staff"]);
        let pipeline = pipeline(
            config(),
            idp(assertion),
            directory.clone(),
            Arc::new(MemoryLogSink::new()),
        );

        pipeline.run(LoginRequest::default()).await;
        let first = directory.assignments_of(&alice.id);
        let outcome = pipeline.run(LoginRequest::default()).await;

        assert_eq!(directory.assignments_of(&alice.id), first);
        let ops = &outcome.login().unwrap().role_ops;
        assert!(ops.iter().all(|op| matches!(op, RoleOp::Unassign(_))));

        let held: HashSet<String> = first.into_iter().map(|(role_id, _)| role_id).collect();
        assert!(effective_ops(ops, &held).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_login() {
        let directory = directory();
        let assertion = Assertion::new()
            .with_attribute("uid", ["newbie"])
            .with_attribute("courses", ["x"]);
        let config = LoginConfig::new("uid", "", false, CourseSupport::Internal);

        let err = LoginPipeline::new(config, idp(assertion.clone()), directory.clone())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Missing(field) if field == "role_attribute"));

        let mut config = LoginConfig::new("uid", "affiliation", false, CourseSupport::Internal);
        config.site_root = "https://learn.example.org".to_string();
        let err = LoginPipeline::new(config, idp(assertion), directory.clone())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Missing(field) if field.starts_with("course_attribute")));
        assert_eq!(directory.find_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_username_never_touches_directory() {
        let directory = directory();
        let assertion = Assertion::new().with_attribute("mail", ["x@example.org"]);

        let outcome = pipeline(
            config(),
            idp(assertion),
            directory.clone(),
            Arc::new(MemoryLogSink::new()),
        )
        .run(LoginRequest::default())
        .await;

        assert_eq!(directory.find_calls(), 0);
        assert_eq!(
            messages(&outcome, ErrorCategory::Login),
            vec!["Attribute 'uid' was not found in the identity assertion"]
        );
        assert_eq!(outcome.location(), "https://learn.example.org/auth/fedgate/login");
    }

    #[tokio::test]
    async fn test_jit_disabled_stops_before_course_mapping() {
        let mut config = course_config();
        config.disable_jit = true;
        let directory = directory();
        let mapper = Arc::new(CountingMapper {
            calls: AtomicUsize::new(0),
            inner: TableCourseMapper::new(&config.courses, config.role_mapping.clone()),
        });
        let assertion = Assertion::new()
            .with_attribute("uid", ["bob"])
            .with_attribute("courses", ["math101"]);

        let outcome = pipeline(
            config,
            idp(assertion),
            directory.clone(),
            Arc::new(MemoryLogSink::new()),
        )
        .with_course_mapper(mapper.clone())
        .run(LoginRequest::default())
        .await;

        assert_eq!(mapper.calls.load(Ordering::SeqCst), 0);
        assert_eq!(directory.create_calls(), 0);
        assert_eq!(
            messages(&outcome, ErrorCategory::Login),
            vec!["User 'bob' does not exist and automatic account creation is disabled"]
        );
    }

    #[tokio::test]
    async fn test_hook_hiding_user_triggers_jit_gate() {
        let mut config = config();
        config.disable_jit = true;
        let directory = directory();
        directory.add_user("alice");

        let outcome = pipeline(
            config,
            idp(Assertion::new().with_attribute("uid", ["alice"])),
            directory,
            Arc::new(MemoryLogSink::new()),
        )
        .with_hooks(Arc::new(HideEveryone))
        .run(LoginRequest::default())
        .await;

        assert!(outcome.is_error());
        assert!(outcome.login().is_none());
    }

    #[tokio::test]
    async fn test_absent_role_claims_leave_roles_untouched() {
        let directory = directory();
        let alice = directory.add_user("alice");
        directory.grant(&alice.id, "r-student", ROLE_ACTOR);

        let outcome = pipeline(
            config(),
            idp(Assertion::new().with_attribute("uid", ["alice"])),
            directory.clone(),
            Arc::new(MemoryLogSink::new()),
        )
        .run(LoginRequest::default())
        .await;

        assert!(outcome.login().unwrap().role_ops.is_empty());
        assert_eq!(
            directory.assignments_of(&alice.id),
            vec![("r-student".to_string(), ROLE_ACTOR.to_string())]
        );
    }

    #[tokio::test]
    async fn test_unknown_user_with_active_course_provisioned() {
        let directory = directory();
        let assertion = Assertion::new()
            .with_attribute("uid", ["carol"])
            .with_attribute("courses", ["math101"]);

        let outcome = pipeline(
            course_config(),
            idp(assertion),
            directory.clone(),
            Arc::new(MemoryLogSink::new()),
        )
        .run(LoginRequest::default())
        .await;

        let login = outcome.login().unwrap();
        assert_eq!(login.provisioning, ProvisioningAction::Created);
        assert!(login.course_mapping.as_ref().unwrap().any_course_active);
        assert!(directory.user("carol").is_some());
    }

    #[tokio::test]
    async fn test_unknown_user_without_course_claims_denied() {
        let directory = directory();

        let outcome = pipeline(
            course_config(),
            idp(Assertion::new().with_attribute("uid", ["dave"])),
            directory.clone(),
            Arc::new(MemoryLogSink::new()),
        )
        .run(LoginRequest::default())
        .await;

        assert_eq!(
            messages(&outcome, ErrorCategory::Login),
            vec!["User 'dave' is not authorized: no mapped course is active"]
        );
        assert_eq!(directory.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_hook_denial_is_displayed() {
        let directory = directory();
        directory.add_user("alice");

        let outcome = pipeline(
            config(),
            idp(Assertion::new().with_attribute("uid", ["alice"])),
            directory,
            Arc::new(MemoryLogSink::new()),
        )
        .with_hooks(Arc::new(DenyAll))
        .run(LoginRequest::default())
        .await;

        assert_eq!(messages(&outcome, ErrorCategory::Login), vec!["Account suspended"]);
    }

    #[tokio::test]
    async fn test_course_errors_suppressed_to_log() {
        let mut config = course_config();
        config.dont_display_to_user = true;
        let directory = directory();
        directory.add_user("erin");
        let sink = Arc::new(MemoryLogSink::new());
        let assertion = Assertion::new()
            .with_attribute("uid", ["erin"])
            .with_attribute("courses", ["chem300"]);

        let outcome = pipeline(config, idp(assertion), directory, sink.clone())
            .run(LoginRequest::default())
            .await;

        assert!(!outcome.is_error());
        assert!(outcome.login().is_some());
        assert_eq!(sink.messages(), vec!["Course 'chem300' of user 'erin' is not mapped"]);
    }

    #[tokio::test]
    async fn test_course_errors_displayed_after_login() {
        let directory = directory();
        directory.add_user("erin");
        let sink = Arc::new(MemoryLogSink::new());
        let assertion = Assertion::new()
            .with_attribute("uid", ["erin"])
            .with_attribute("courses", ["chem300"]);

        let outcome = pipeline(course_config(), idp(assertion), directory, sink.clone())
            .run(LoginRequest {
                wants_url: Some("https://learn.example.org/course/7".to_string()),
                ..LoginRequest::default()
            })
            .await;

        assert_eq!(
            messages(&outcome, ErrorCategory::CourseEnrollment),
            vec!["Course 'chem300' of user 'erin' is not mapped"]
        );
        assert_eq!(outcome.location(), "https://learn.example.org/course/7");
        assert!(outcome.login().is_some());
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn test_extra_info_logged() {
        let mut config = config();
        config.log_extra_info = true;
        let directory = directory();
        directory.add_user("alice");
        let sink = Arc::new(MemoryLogSink::new());
        let assertion = Assertion::new()
            .with_attribute("uid", ["alice"])
            .with_attribute("affiliation", ["learner"]);

        pipeline(config, idp(assertion), directory, sink.clone())
            .run(LoginRequest::default())
            .await;

        assert_eq!(
            sink.messages(),
            vec![
                "alice logged",
                "System role editingteacher unassigned from alice",
                "System role student assigned to alice",
            ]
        );
    }

    #[tokio::test]
    async fn test_incomplete_profile_fails_login() {
        let directory = directory();
        let bob = directory.add_user("bob");
        directory.hide_profile(&bob.id);

        let outcome = pipeline(
            config(),
            idp(Assertion::new().with_attribute("uid", ["bob"])),
            directory,
            Arc::new(MemoryLogSink::new()),
        )
        .run(LoginRequest::default())
        .await;

        assert_eq!(
            messages(&outcome, ErrorCategory::Login),
            vec!["Could not load the complete profile of user 'bob'"]
        );
    }

    #[tokio::test]
    async fn test_filter_hook_runs_before_extraction() {
        let directory = directory();
        directory.add_user("frank@example.org");

        let outcome = pipeline(
            config(),
            idp(Assertion::new().with_attribute("mail", ["Frank@Example.org"])),
            directory,
            Arc::new(MemoryLogSink::new()),
        )
        .with_hooks(Arc::new(RenameMail))
        .run(LoginRequest::default())
        .await;

        assert_eq!(
            outcome.login().unwrap().principal.user.username,
            "frank@example.org"
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_request_redirects_to_idp() {
        for passive in [false, true] {
            let outcome = pipeline(
                config(),
                anonymous_idp(),
                directory(),
                Arc::new(MemoryLogSink::new()),
            )
            .run(LoginRequest {
                passive,
                ..LoginRequest::default()
            })
            .await;

            assert_eq!(
                outcome,
                LoginOutcome::Redirect {
                    location: SSO.to_string(),
                    login: None,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_idp_failure_shown_with_site_root() {
        let outcome = pipeline(
            config(),
            Arc::new(BrokenIdp),
            directory(),
            Arc::new(MemoryLogSink::new()),
        )
        .run(LoginRequest::default())
        .await;

        assert_eq!(outcome.location(), "https://learn.example.org/");
        assert_eq!(
            messages(&outcome, ErrorCategory::Login),
            vec!["Identity provider unavailable: Identity provider unreachable: connection refused"]
        );
    }

    #[tokio::test]
    async fn test_redirect_never_targets_login_endpoint() {
        let directory = directory();
        directory.add_user("alice");

        let outcome = pipeline(
            config(),
            idp(Assertion::new().with_attribute("uid", ["alice"])),
            directory,
            Arc::new(MemoryLogSink::new()),
        )
        .run(LoginRequest {
            wants_url: None,
            session_wants_url: Some("https://learn.example.org/auth/fedgate/index?x=1".to_string()),
            passive: false,
        })
        .await;

        assert_eq!(outcome.location(), "https://learn.example.org/");
    }

    #[tokio::test]
    async fn test_logout_without_single_logout() {
        let outcome = pipeline(
            config(),
            anonymous_idp(),
            directory(),
            Arc::new(MemoryLogSink::new()),
        )
        .logout(LogoutRequest {
            script_uri: Some("https://learn.example.org/auth/fedgate/index".to_string()),
            referer: Some("https://learn.example.org/my".to_string()),
        })
        .await;

        assert_eq!(outcome.location(), "https://learn.example.org/");
    }

    #[tokio::test]
    async fn test_single_logout_goes_through_idp() {
        let mut config = config();
        config.single_logout = true;

        let outcome = pipeline(
            config,
            anonymous_idp(),
            directory(),
            Arc::new(MemoryLogSink::new()),
        )
        .logout(LogoutRequest {
            script_uri: None,
            referer: Some("https://learn.example.org/my".to_string()),
        })
        .await;

        assert_eq!(
            outcome.location(),
            "https://idp.example.org/slo?ReturnTo=https%3A%2F%2Flearn.example.org%2Fmy"
        );
    }

    #[test]
    fn test_logout_return_url_fallbacks() {
        assert_eq!(LogoutRequest::default().return_url("auth/fedgate/index"), "/");
        assert_eq!(
            LogoutRequest {
                script_uri: Some("  ".to_string()),
                referer: Some("https://learn.example.org/my".to_string()),
            }
            .return_url("auth/fedgate/index"),
            "https://learn.example.org/my"
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = LoginOutcome::Redirect {
            location: SSO.to_string(),
            login: None,
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"outcome": "redirect", "location": SSO})
        );
    }
}
