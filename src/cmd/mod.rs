pub mod config;
pub mod devices;
pub mod purge;
pub mod subnets;
pub mod vulns;

use crate::api::ApiClient;
use crate::config::{Config, ConfigManager};
use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};

/// Build an API client from the resolved configuration
pub(crate) fn build_client(manager: &ConfigManager, config: &Config) -> Result<ApiClient> {
    let token = manager.api_token(config)?;
    Ok(ApiClient::new(&config.api.base_url, token))
}

/// Create a spinner for long-running harvests
pub(crate) fn create_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}
