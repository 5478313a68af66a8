use clap::Args;
use reqwest::Method;

use crate::cli::config::build_client;
use crate::cli::utils::{output_value, parse_key_value, report_failure};
use crate::cli::OutputFormat;
use crate::client::RequestDescriptor;

#[derive(Args)]
pub struct RequestArgs {
    #[arg(help = "HTTP method (GET, POST, PUT, DELETE, PATCH)")]
    pub method: String,

    #[arg(help = "Path relative to the API base URL, e.g. /system/users/1")]
    pub path: String,

    #[arg(long = "query", short = 'q', help = "Query parameter as key=value (repeatable)")]
    pub query: Vec<String>,

    #[arg(long, short = 'd', help = "JSON request body")]
    pub data: Option<String>,
}

pub async fn handle(args: RequestArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .map_err(|_| anyhow::anyhow!("Invalid HTTP method: {}", args.method))?;

    let mut descriptor = RequestDescriptor::new(method, args.path);
    for raw in &args.query {
        let (key, value) = parse_key_value(raw)?;
        descriptor = descriptor.with_query(key, value);
    }
    if let Some(data) = &args.data {
        let body = serde_json::from_str(data)
            .map_err(|e| anyhow::anyhow!("Request body is not valid JSON: {}", e))?;
        descriptor = descriptor.with_body(body);
    }

    let client = build_client(&output_format)?;
    match client.send(descriptor).await {
        Ok(data) => output_value(&output_format, &data),
        Err(e) => report_failure(&output_format, e),
    }
}
