use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "scan-cli")]
#[command(about = "Command-line client for the scan gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    /// Access token from the login redirect.
    #[arg(short, long, env = "SCAN_ACCESS_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Raw,
    Gist,
}

impl Source {
    fn as_str(self) -> &'static str {
        match self {
            Source::Raw => "raw",
            Source::Gist => "gist",
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway liveness
    Health,
    /// Show the account behind the token
    Whoami,
    /// Scan a file for security issues
    Scan {
        file: PathBuf,
        #[arg(long, value_enum, default_value = "raw")]
        source: Source,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(token) = &cli.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
    }

    match cli.command {
        Commands::Health => {
            let res = client.get(format!("{base}/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Whoami => {
            let res = client
                .get(format!("{base}/api/auth/user"))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Scan { file, source } => {
            let content = tokio::fs::read_to_string(&file).await?;
            let res = client
                .post(format!("{base}/api/scan"))
                .headers(headers)
                .json(&json!({ "source": source.as_str(), "content": content }))
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    for name in ["x-ratelimit-limit", "x-ratelimit-remaining", "x-ratelimit-reset", "retry-after"] {
        if let Some(value) = res.headers().get(name).and_then(|v| v.to_str().ok()) {
            eprintln!("{name}: {value}");
        }
    }

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
