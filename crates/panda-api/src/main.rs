use panda_api::{setup, telemetry};
use panda_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load configuration
    let config = Config::from_env()?;

    telemetry::init_telemetry();
    tracing::info!(
        environment = %config.environment,
        backend = %config.storage_backend(),
        "Configuration loaded and validated successfully"
    );

    let (_state, router) = setup::initialize_app(&config).await?;

    setup::server::start_server(&config, router).await?;

    Ok(())
}
