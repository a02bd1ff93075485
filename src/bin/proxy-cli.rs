use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Control CLI for the tunnel proxy", long_about = None)]
struct Cli {
    #[arg(short, long, env = "TUNNEL_PROXY_URL", default_value = "http://localhost:5000")]
    url: String,

    /// Bearer token, when the proxy has `admin.api_key` set.
    #[arg(short, long, env = "TUNNEL_PROXY_API_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current backend address
    Status,
    /// Point the proxy at a new backend
    Update {
        /// Absolute http:// or https:// URL
        tunnel_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let res = match cli.command {
        Commands::Status => {
            client.get(format!("{}/status", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Update { tunnel_url } => {
            client.post(format!("{}/update_tunnel", base))
                .headers(headers)
                .json(&json!({ "tunnel_url": tunnel_url }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
        eprintln!("Response: {}", text);
        std::process::exit(1);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
