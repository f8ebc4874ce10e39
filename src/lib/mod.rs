pub mod application;
pub mod cli;
pub mod config;
pub mod constants;
pub mod domain;
pub mod infrastructure;

pub use application::{conversation, session, tooling};
pub use cli::Cli;
pub use config::{AppConfig, ConfigError};
pub use domain::types;
pub use infrastructure::{model, server};

use application::conversation::ConversationOptions;
use application::session::SessionRegistry;
use application::tooling::TransportFactory;
use config::ProviderStore;
use constants::{SESSION_IDLE_TIMEOUT_SECS, SESSION_SWEEP_INTERVAL_SECS};
use infrastructure::model::ChatCompletionsClient;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

pub async fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    init_tracing();
    info!("Starting mcp-conductor");
    debug!(
        config = %cli.config.display(),
        rest_addr = %cli.rest_addr,
        max_rounds = ?cli.max_rounds,
        no_heartbeat = cli.no_heartbeat,
        "CLI arguments parsed"
    );

    let mut app_config = AppConfig::load(&cli.config)?;
    if let Some(max_rounds) = cli.max_rounds {
        app_config.max_rounds = max_rounds;
    }
    if cli.no_heartbeat {
        app_config.heartbeat = false;
    }
    info!(
        providers = app_config.providers.len(),
        model = app_config.model.model.as_str(),
        "Loaded configuration"
    );

    let registry = Arc::new(build_registry(&cli, app_config));
    registry.spawn_reaper(
        Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS),
        Duration::from_secs(SESSION_IDLE_TIMEOUT_SECS),
    );
    server::serve(registry, cli.rest_addr).await?;
    info!("mcp-conductor finished");
    Ok(())
}

fn build_registry(cli: &Cli, config: AppConfig) -> SessionRegistry {
    let factory = Arc::new(TransportFactory::new(config.heartbeat));
    let model = Arc::new(ChatCompletionsClient::from_settings(&config.model));
    let options = ConversationOptions::default().with_max_rounds(config.max_rounds);
    SessionRegistry::new(config.providers, factory, model, options)
        .with_store(ProviderStore::new(cli.config.clone()))
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_level(true)
            .init();
    });
}
