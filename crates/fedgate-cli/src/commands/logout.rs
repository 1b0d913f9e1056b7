use std::sync::Arc;

use anyhow::{Context, Result};
use fedgate_auth::{LoginConfig, LoginPipeline, LogoutRequest, StaticIdentityProvider};
use fedgate_directory_memory::create_directory;
use url::Url;

use crate::cli::{LogoutArgs, OutputFormat};
use crate::output::print_outcome;

pub async fn logout(args: &LogoutArgs, format: OutputFormat) -> Result<()> {
    let config = LoginConfig::load(&args.config)?;
    let slo_url = Url::parse(&args.slo_url).context("Invalid --slo-url")?;
    // Logout never reads an assertion; the sign-on URL is unused.
    let idp = Arc::new(StaticIdentityProvider::anonymous(slo_url.clone(), slo_url));

    let outcome = LoginPipeline::new(config, idp, create_directory())?
        .logout(LogoutRequest {
            script_uri: args.script_uri.clone(),
            referer: args.referer.clone(),
        })
        .await;

    print_outcome(&outcome, format)?;
    if outcome.is_error() {
        anyhow::bail!("Logout failed");
    }
    Ok(())
}
