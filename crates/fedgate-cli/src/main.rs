mod cli;
mod commands;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use fedgate_auth::HookRegistry;

use cli::{Cli, Commands, ConfigCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing_with_level(&cli.log_level);
    let format = cli.format.unwrap_or_default();
    // Hook sets are registered by embedding applications; the CLI ships none.
    let hooks = HookRegistry::new();

    match &cli.command {
        Commands::Login(args) => commands::login::login(args, &hooks, format).await?,
        Commands::Logout(args) => commands::logout::logout(args, format).await?,
        Commands::Config(args) => match &args.command {
            ConfigCommands::Check(check_args) => commands::config::check(check_args, &hooks, format)?,
            ConfigCommands::Init(init_args) => commands::config::init(init_args)?,
        },
    }

    Ok(())
}
