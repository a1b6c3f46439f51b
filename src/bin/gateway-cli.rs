use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator CLI for the marketplace API gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:5000")]
    url: String,

    /// Internal API key, sent as `x-internal-request`.
    #[arg(short, long, env = "INTERNAL_API_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Show gateway version, mode and configured services
    Info,
    /// Issue a one-time passcode for a subject
    OtpIssue { subject: String },
    /// Verify a one-time passcode
    OtpVerify { subject: String, code: String },
    /// Show an attachment scan result
    ScanStatus { id: String },
    /// Report a scan outcome (clean or infected), as a scan engine would
    ScanComplete {
        id: String,
        status: String,
        #[arg(long)]
        details: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    headers.insert("x-internal-request", HeaderValue::from_str(&cli.key)?);

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
        Commands::Info => client.get(format!("{}/", base)).send().await?,
        Commands::OtpIssue { subject } => {
            client
                .post(format!("{}/internal/otp/issue", base))
                .headers(headers)
                .json(&json!({ "subject": subject }))
                .send()
                .await?
        }
        Commands::OtpVerify { subject, code } => {
            client
                .post(format!("{}/internal/otp/verify", base))
                .headers(headers)
                .json(&json!({ "subject": subject, "code": code }))
                .send()
                .await?
        }
        Commands::ScanStatus { id } => {
            client
                .get(format!("{}/internal/scans/{}", base, id))
                .headers(headers)
                .send()
                .await?
        }
        Commands::ScanComplete { id, status, details } => {
            client
                .post(format!("{}/internal/scans/{}/complete", base, id))
                .headers(headers)
                .json(&json!({ "status": status, "details": details }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
