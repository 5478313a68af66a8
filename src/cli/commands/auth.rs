use std::io::{self, BufRead, Write};

use clap::Subcommand;
use serde_json::json;

use crate::cli::config::build_client;
use crate::cli::utils::{output_success, output_value, report_failure};
use crate::cli::OutputFormat;
use crate::session::Session;

#[derive(Subcommand)]
pub enum AuthCommands {
    #[command(about = "Login to server")]
    Login {
        #[arg(help = "Username")]
        username: String,
        #[arg(long, help = "Password (will prompt if not provided)")]
        password: Option<String>,
    },

    #[command(about = "Logout from server")]
    Logout,

    #[command(about = "Show current authentication status")]
    Status,

    #[command(about = "Refresh authentication token")]
    Refresh,

    #[command(about = "Show current user information")]
    Whoami,
}

pub async fn handle(cmd: AuthCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let client = build_client(&output_format)?;

    match cmd {
        AuthCommands::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_password()?,
            };

            match client.login(&username, &password).await {
                Ok(session) => output_success(
                    &output_format,
                    &format!("Logged in as {}", username),
                    Some(session_summary(&session)),
                ),
                Err(e) => report_failure(&output_format, e),
            }
        }
        AuthCommands::Logout => {
            client.logout().await;
            output_success(&output_format, "Logged out", None)
        }
        AuthCommands::Status => {
            let session = client.session();
            let message = if session.is_empty() {
                "Not logged in".to_string()
            } else {
                match session.identity().and_then(|identity| identity.username.clone()) {
                    Some(username) => format!("Logged in as {}", username),
                    None => "Logged in".to_string(),
                }
            };

            output_success(&output_format, &message, Some(session_summary(&session)))?;
            if let (OutputFormat::Text, Some(expires_at)) = (
                &output_format,
                session.identity().and_then(|identity| identity.expires_at),
            ) {
                println!("  access token expires at {}", expires_at.to_rfc3339());
            }
            Ok(())
        }
        AuthCommands::Refresh => match client.refresh_now().await {
            Ok(session) => output_success(&output_format, "Session refreshed", Some(session_summary(&session))),
            Err(e) => report_failure(&output_format, e),
        },
        AuthCommands::Whoami => {
            let user = client.current_user().await?;
            output_value(&output_format, &user)
        }
    }
}

fn session_summary(session: &Session) -> serde_json::Value {
    json!({
        "authenticated": !session.is_empty(),
        "has_refresh_token": session.refresh_token().is_some(),
        "identity": session.identity(),
    })
}

fn prompt_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(anyhow::anyhow!("Password is required"));
    }
    Ok(password)
}
