//! Dossier CLI: provisioning for the storage credentials the gateway needs.
//!
//! Reads the same environment as the server (`GOOGLE_OAUTH_CREDENTIALS_PATH`,
//! `GOOGLE_TOKEN_PATH`, `BREAKER_*`).

use anyhow::Context;
use clap::{Parser, Subcommand};
use dossier_cli::{init_tracing, summarize};
use dossier_core::Config;
use dossier_infra::{AuthBootstrap, CircuitBreakers, OperationCategory, StdinCodeSource};
use dossier_storage::factory::http_client;
use dossier_storage::{ClientSecrets, GoogleOAuthClient, TokenStore};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "dossier", about = "Dossier gateway provisioning")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain Google Drive credentials through the consent flow
    Authorize {
        /// Run the consent flow even when a token record already exists
        #[arg(long)]
        force: bool,
    },
    /// Show the stored token record
    TokenInfo,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize token summary")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    config.breaker_policy().validate()?;

    let breakers = CircuitBreakers::new(config.breaker_policy());
    let bootstrap = AuthBootstrap::new(
        TokenStore::new(&config.drive().token_path),
        breakers.get(OperationCategory::Bootstrap).clone(),
    );

    match cli.command {
        Commands::Authorize { force } => {
            let secret = ClientSecrets::load(&config.drive().credentials_path)
                .await
                .context("Failed to load OAuth client secrets")?;
            let oauth = GoogleOAuthClient::new(http_client()?, secret);

            let token = if force {
                bootstrap.authorize(&oauth, &StdinCodeSource).await?
            } else {
                bootstrap.acquire(&oauth, &StdinCodeSource).await?
            };
            print_json(&summarize(bootstrap.store().path(), &token))?;
        }
        Commands::TokenInfo => {
            let token = bootstrap.require_cached().await?;
            print_json(&summarize(bootstrap.store().path(), &token))?;
        }
    }

    Ok(())
}
