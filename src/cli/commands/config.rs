use clap::Subcommand;
use serde_json::json;

use crate::cli::config::session_dir;
use crate::cli::OutputFormat;
use crate::config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    #[command(about = "Show the effective client configuration")]
    Show,
}

pub async fn handle(cmd: ConfigCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = config::config();
            let session_dir = session_dir()?;

            match output_format {
                OutputFormat::Json => {
                    let response = json!({
                        "success": true,
                        "config": config,
                        "session_dir": session_dir.display().to_string(),
                    });
                    println!("{}", serde_json::to_string_pretty(&response)?);
                }
                OutputFormat::Text => {
                    println!("Environment:   {:?}", config.environment);
                    println!("API base URL:  {}", config.api.base_url);
                    println!("Timeout:       {}s", config.api.timeout_secs);
                    println!("Realtime URL:  {}", config.realtime.url);
                    println!(
                        "Reconnect:     every {}s, {} attempts",
                        config.realtime.reconnect_delay_secs, config.realtime.max_reconnect_attempts
                    );
                    println!("Session dir:   {}", session_dir.display());
                }
            }
            Ok(())
        }
    }
}
