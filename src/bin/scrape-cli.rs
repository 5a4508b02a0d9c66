use std::time::Duration;

use clap::{Parser, Subcommand};

use scrape_relay::http::response::ErrorBody;
use scrape_relay::orchestrator::{ScrapeResult, ScrapeStatus};

#[derive(Parser)]
#[command(name = "scrape-cli")]
#[command(about = "Command-line client for the scraping server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the scraping server is up
    Health,
    /// Scrape a URL and print a summary
    Scrape {
        url: String,
        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
        /// Seconds to wait for the result
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Health => {
            check_health(&client, &server).await?;
            println!("Server at {} is healthy", server);
        }
        Commands::Scrape { url, json, timeout } => {
            check_health(&client, &server).await?;

            let res = client
                .get(format!("{}/scrape", server))
                .query(&[("url", url.as_str())])
                .timeout(Duration::from_secs(timeout))
                .send()
                .await?;

            let status = res.status();
            if !status.is_success() {
                let message = match res.json::<ErrorBody>().await {
                    Ok(body) => body.message,
                    Err(_) => status.to_string(),
                };
                return Err(format!("Server returned {}: {}", status.as_u16(), message).into());
            }

            let result: ScrapeResult = res.json().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }
            if result.status == ScrapeStatus::Error {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn check_health(client: &reqwest::Client, server: &str) -> Result<(), Box<dyn std::error::Error>> {
    let res = client
        .get(format!("{}/health", server))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .map_err(|e| format!("Server not reachable at {}: {}", server, e))?;

    if !res.status().is_success() {
        return Err(format!("Health check failed with status {}", res.status()).into());
    }
    Ok(())
}

fn print_summary(result: &ScrapeResult) {
    println!("URL:       {}", result.url);
    println!("Timestamp: {}", result.timestamp);

    if result.status == ScrapeStatus::Error {
        println!("Status:    error");
        if let Some(message) = &result.message {
            println!("Message:   {}", message);
        }
        return;
    }
    println!("Status:    success");

    if let Some(data) = &result.scraping_data {
        println!();
        println!("Title:     {}", data.title.as_deref().unwrap_or("(none)"));
        println!("Links:     {}", data.links.len());
        println!("Images:    {}", data.images_count);
        if let Some(language) = &data.language {
            println!("Language:  {}", language);
        }

        let headers: Vec<String> = data
            .structure
            .iter()
            .map(|(tag, count)| format!("{}={}", tag, count))
            .collect();
        if !headers.is_empty() {
            println!("Headers:   {}", headers.join(", "));
        }

        if !data.meta_tags.is_empty() {
            println!("Meta tags:");
            for (name, content) in &data.meta_tags {
                println!("  {:<20} {}", name, truncate(content, 60));
            }
        }
    }

    if let Some(processing) = &result.processing_data {
        println!();
        println!("Processing:");
        if let Some(error) = &processing.error {
            println!("  error:       {}", error);
        }
        println!(
            "  screenshot:  {}",
            match &processing.screenshot {
                Some(png) => format!("{} bytes (base64)", png.len()),
                None => "none".to_string(),
            }
        );
        match &processing.performance {
            Some(perf) => println!(
                "  performance: {} ms, {} KB total, {} requests",
                perf.load_time_ms, perf.total_size_kb, perf.num_requests
            ),
            None => println!("  performance: none"),
        }
        println!("  thumbnails:  {}", processing.thumbnails.len());
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
