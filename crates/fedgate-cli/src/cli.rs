use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "fedgate")]
#[command(about = "fedgate CLI: run federated logins against a local directory")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Log level filter (RUST_LOG wins when set)
    #[arg(long, global = true, env = "FEDGATE_LOG", default_value = "warn")]
    pub log_level: String,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one login attempt
    Login(LoginArgs),
    /// Compute the logout redirect
    Logout(LogoutArgs),
    /// Check or generate configuration files
    Config(ConfigArgs),
}

#[derive(clap::Args)]
pub struct LoginArgs {
    /// Login configuration (TOML)
    #[arg(short, long, env = "FEDGATE_CONFIG")]
    pub config: PathBuf,
    /// Identity assertion (JSON object of attribute name to values)
    #[arg(short, long, required_unless_present = "anonymous")]
    pub assertion: Option<PathBuf>,
    /// Directory fixture (JSON); starts empty when omitted
    #[arg(short, long)]
    pub directory: Option<PathBuf>,
    /// Write the directory back to this file after the login
    #[arg(long)]
    pub save_directory: Option<PathBuf>,
    /// Destination requested with the login
    #[arg(long)]
    pub wants_url: Option<String>,
    /// Destination stashed in the session
    #[arg(long)]
    pub session_wants_url: Option<String>,
    /// Only reuse an existing provider session
    #[arg(long)]
    pub passive: bool,
    /// Simulate a request without a provider session
    #[arg(long, conflicts_with = "assertion")]
    pub anonymous: bool,
    /// Identity provider single sign-on URL
    #[arg(long, default_value = "https://idp.example.org/sso")]
    pub sso_url: String,
    /// Identity provider single logout URL
    #[arg(long, default_value = "https://idp.example.org/slo")]
    pub slo_url: String,
}

#[derive(clap::Args)]
pub struct LogoutArgs {
    /// Login configuration (TOML)
    #[arg(short, long, env = "FEDGATE_CONFIG")]
    pub config: PathBuf,
    /// URI of the script that received the logout
    #[arg(long)]
    pub script_uri: Option<String>,
    /// Page the user came from
    #[arg(long)]
    pub referer: Option<String>,
    /// Identity provider single logout URL
    #[arg(long, default_value = "https://idp.example.org/slo")]
    pub slo_url: String,
}

#[derive(clap::Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Check(ConfigCheckArgs),
    /// Print a starter configuration
    Init(ConfigInitArgs),
}

#[derive(clap::Args)]
pub struct ConfigCheckArgs {
    /// Configuration file to check
    pub path: PathBuf,
}

#[derive(clap::Args)]
pub struct ConfigInitArgs {
    /// Attribute holding the username
    #[arg(long, default_value = fedgate_auth::DEFAULT_USERNAME_ATTRIBUTE)]
    pub username_attribute: String,
    /// Attribute holding the role claims
    #[arg(long, default_value = "eduPersonAffiliation")]
    pub role_attribute: String,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
