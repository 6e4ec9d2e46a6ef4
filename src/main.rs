use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod bot;
use bot::Moderator;

mod config;
use config::BotConfig;

mod ghapi;
use ghapi::{AppCredentials, GitHubClient};

mod webhooks;
use webhooks::{GitHubSecret, RequestThrottle};

#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Configuration file for closebot, settings can also come from the environment
    #[arg(short, long, env = "CLOSEBOT_CONFIG")]
    config: Option<PathBuf>,

    /// File of environment variables loaded before reading the configuration
    #[arg(long, default_value = ".env")]
    env_file: PathBuf,
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let opts = Opts::parse();
    if let Err(e) = dotenv::from_path(&opts.env_file) {
        debug!("not loading {}: {}", opts.env_file.display(), e);
    }

    let config = BotConfig::load(opts.config.as_deref()).context("invalid configuration")?;

    let credentials = AppCredentials::from_pem_file(
        config.github.app_id,
        config.github.installation_id,
        &config.github.private_key_path,
    )
    .context("couldn't load GitHub App credentials")?;
    let client = GitHubClient::new(&config.github.api_url, credentials)
        .context("couldn't create GitHub client")?;

    let moderator = Moderator::new(config.moderation.clone(), Arc::new(client));

    let figment = rocket::Config::figment()
        .merge(("address", config.address))
        .merge(("port", config.port));

    info!(
        "closing issues for {} on {}:{}",
        config.moderation.authorized_user, config.address, config.port
    );

    let rocket = webhooks::build(
        figment,
        moderator,
        GitHubSecret(config.github.webhook_secret.clone()),
        RequestThrottle::new(config.requests_per_second),
    );
    rocket
        .launch()
        .await
        .map(|_| ())
        .map_err(|err| anyhow!("webhook server failed: {}", err))
}
