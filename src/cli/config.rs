use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::utils::ConsoleNotifier;
use crate::cli::OutputFormat;
use crate::client::ApiClient;
use crate::config;
use crate::session::FileStorage;

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = if let Ok(custom_dir) = std::env::var("CONSOLE_CLI_CONFIG_DIR") {
        PathBuf::from(custom_dir)
    } else {
        let home = std::env::var("HOME").map_err(|_| anyhow::anyhow!("HOME environment variable not set"))?;
        PathBuf::from(home).join(".config").join("admin-console").join("cli")
    };

    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// Directory holding the persisted access and refresh tokens
pub fn session_dir() -> anyhow::Result<PathBuf> {
    Ok(get_config_dir()?.join("session"))
}

/// Client wired to the on-disk session and a terminal notifier
pub fn build_client(output_format: &OutputFormat) -> anyhow::Result<ApiClient> {
    let storage = FileStorage::new(session_dir()?)?;
    let notifier = ConsoleNotifier::new(output_format.clone());
    let client = ApiClient::new(config::config(), Arc::new(storage), Arc::new(notifier))?;
    Ok(client)
}
