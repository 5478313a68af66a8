use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::error::ApiError;
use crate::notify::Notifier;

/// Output a success message in the appropriate format
pub fn output_success(
    output_format: &OutputFormat,
    message: &str,
    data: Option<Value>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(obj)) = (data, response.as_object_mut()) {
                obj.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(
    output_format: &OutputFormat,
    message: &str,
    error_code: Option<&str>,
) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Report a failed API call and hand the error back to `main` for the exit code.
/// Text mode leaves the printing to `main`.
pub fn report_failure(output_format: &OutputFormat, error: ApiError) -> anyhow::Result<()> {
    if let OutputFormat::Json = output_format {
        output_error(output_format, error.message(), Some(error.error_code()))?;
    }
    Err(error.into())
}

/// Output an API payload; text mode pretty-prints the JSON as well
pub fn output_value(output_format: &OutputFormat, data: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "success": true, "data": data }))?);
        }
        OutputFormat::Text => match data {
            Value::Null => println!("(no content)"),
            Value::String(s) => println!("{}", s),
            other => println!("{}", serde_json::to_string_pretty(other)?),
        },
    }
    Ok(())
}

/// Parse `key=value` pairs given on the command line
pub fn parse_key_value(raw: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", raw))?;
    if key.is_empty() {
        return Err(anyhow::anyhow!("Empty key in '{}'", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Notices from the client, written to stderr so stdout stays parseable.
pub struct ConsoleNotifier {
    output_format: OutputFormat,
}

impl ConsoleNotifier {
    pub fn new(output_format: OutputFormat) -> Self {
        Self { output_format }
    }
}

impl Notifier for ConsoleNotifier {
    fn warning(&self, message: &str) {
        eprintln!("Warning: {}", message);
    }

    fn error(&self, message: &str) {
        if let OutputFormat::Text = self.output_format {
            eprintln!("Error: {}", message);
        }
    }

    fn notification(&self, title: &str, content: &str) {
        eprintln!("{}: {}", title, content);
    }

    fn session_expired(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn redirect_to_login(&self) {
        eprintln!("Run `console auth login <username>` to sign in.");
    }
}
