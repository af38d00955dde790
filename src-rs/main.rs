use anyhow::Context;

use browserpilot::config::AppConfig;
use browserpilot::{host, init_logger, set_log_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let config = AppConfig::load().context("Failed to load configuration")?;
    set_log_level(config.log_level);
    log::debug!(
        "Configuration resolved: provider={}, model={}",
        config.provider.provider(),
        config.provider.model()
    );

    if host::run(&config).await.context("Failed to start")?.is_none() {
        log::info!("Finished without a result");
    }
    Ok(())
}
