use std::sync::Arc;

use approval_desk::api::{self, AppState};
use approval_desk::users::{SharedUserDirectory, StaticUserDirectory};
use approval_desk::{notify, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    if config.dev_mode {
        tracing::warn!("DEV_MODE enabled: authentication is disabled");
    }

    let users: SharedUserDirectory = Arc::new(StaticUserDirectory::load(&config.users_file)?);
    let notifier = notify::from_config(config.mail.clone());
    let state = AppState::open(config, users, notifier)?;

    api::serve(Arc::new(state)).await
}
