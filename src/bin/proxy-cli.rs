use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Command-line client for the resilient proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a query through the provider chain
    Resolve { query: String },
    /// Show provider and circuit breaker status
    Health,
    /// Print orchestration events as they happen
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Resolve { query } => {
            let res = client
                .get(format!("{}/resolve", cli.url))
                .query(&[("query", query.as_str())])
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{}/health", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Watch => {
            let ws_url = format!("{}/ws/heartbeat", cli.url.replacen("http", "ws", 1));
            let (mut stream, _) = connect_async(ws_url.as_str()).await?;
            while let Some(message) = stream.next().await {
                match message? {
                    Message::Text(text) => println!("{}", text.as_str()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            eprintln!("Stream closed");
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: proxy returned status {}", status);
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}
