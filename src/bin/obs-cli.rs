use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use ledger_observability::correlation::{add_to_headers, CorrelationId};

#[derive(Parser)]
#[command(name = "obs-cli")]
#[command(about = "Query the ledger observability admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    /// Correlation id sent with the request (generated when omitted)
    #[arg(long)]
    correlation_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pipeline status (sampling, log level, buffer)
    Status,
    /// Tracker summary
    Summary,
    /// Summary plus raw collector aggregates
    Export,
    /// Recently finished spans
    Spans {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Prometheus exposition text
    Metrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let correlation_id = cli
        .correlation_id
        .map(CorrelationId::from)
        .unwrap_or_else(CorrelationId::generate);

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );
    add_to_headers(&mut headers, &correlation_id);

    let path = match &cli.command {
        Commands::Status => "/admin/status".to_string(),
        Commands::Summary => "/admin/summary".to_string(),
        Commands::Export => "/admin/export".to_string(),
        Commands::Spans { limit } => format!("/admin/spans?limit={limit}"),
        Commands::Metrics => "/metrics".to_string(),
    };

    let res = client
        .get(format!("{}{}", cli.url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    match cli.command {
        Commands::Metrics => print_text(res).await,
        _ => print_response(res).await,
    }
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if status.is_success() {
        println!("{}", text);
    } else {
        eprintln!("Error: Admin API returned status {}: {}", status, text);
    }
    Ok(())
}
