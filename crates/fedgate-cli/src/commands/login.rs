use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fedgate_auth::{
    Assertion, HookRegistry, IdentityProvider, LoginConfig, LoginPipeline, LoginRequest,
    StaticIdentityProvider,
};
use fedgate_directory_memory::{DirectoryFixture, InMemoryDirectory};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::debug;
use url::Url;

use crate::cli::{LoginArgs, OutputFormat};
use crate::output::{print_outcome, print_success, print_warning};

pub fn read_assertion(path: &Path) -> Result<Assertion> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read assertion {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid assertion {}: expected an object of string arrays", path.display()))
}

pub async fn login(args: &LoginArgs, hooks: &HookRegistry, format: OutputFormat) -> Result<()> {
    let config = LoginConfig::load(&args.config)?;
    let hooks = hooks.resolve(config.hooks.as_deref())?;

    let sso_url = Url::parse(&args.sso_url).context("Invalid --sso-url")?;
    let slo_url = Url::parse(&args.slo_url).context("Invalid --slo-url")?;
    let idp: Arc<dyn IdentityProvider> = match &args.assertion {
        Some(path) if !args.anonymous => Arc::new(StaticIdentityProvider::authenticated(
            read_assertion(path)?,
            sso_url,
            slo_url,
        )),
        _ => Arc::new(StaticIdentityProvider::anonymous(sso_url, slo_url)),
    };

    let directory = Arc::new(match &args.directory {
        Some(path) => InMemoryDirectory::load(path)?,
        None => InMemoryDirectory::new(),
    });
    debug!(users = directory.user_count(), "Directory ready");

    let pipeline = LoginPipeline::new(config, idp, directory.clone())?.with_hooks(hooks);
    let outcome = pipeline
        .run(LoginRequest {
            wants_url: args.wants_url.clone(),
            session_wants_url: args.session_wants_url.clone(),
            passive: args.passive,
        })
        .await;

    print_outcome(&outcome, format)?;
    if let Some(log_file) = pipeline.log_file() {
        debug!(path = %log_file.display(), "Operator log written");
    }

    let snapshot = directory.snapshot().await;
    if matches!(format, OutputFormat::Table) && outcome.login().is_some() {
        print_directory(&snapshot);
    }

    if let Some(path) = &args.save_directory {
        let content = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write directory {}", path.display()))?;
        if matches!(format, OutputFormat::Table) {
            print_success(&format!("Directory saved to {}", path.display()));
        }
    }

    match (outcome.is_error(), outcome.login().is_some()) {
        (true, false) => anyhow::bail!("Login refused"),
        (true, true) if matches!(format, OutputFormat::Table) => {
            print_warning("Login completed with errors shown to the user");
        }
        _ => {}
    }
    Ok(())
}

/// Prints the users of the directory with their role assignments.
fn print_directory(snapshot: &DirectoryFixture) {
    let mut builder = Builder::default();
    builder.push_record(["Username", "ID", "Role assignments"]);
    for user in &snapshot.users {
        let roles = user
            .assignments
            .iter()
            .map(|a| a.role.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        builder.push_record([
            user.username.as_str(),
            user.id.as_deref().unwrap_or("-"),
            roles.as_str(),
        ]);
    }
    println!("{}", builder.build().with(Style::rounded()));
}
