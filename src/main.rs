use anyhow::Result;
use colored::Colorize;
use std::sync::Arc;
use vectr::api_server_axum;
use vectr::app_config::AppConfig;
use vectr::chain::{sanitize_ticker, ViewStatus};
use vectr::logging;
use vectr::{OptionChainService, ServiceConfig, YahooClient};

/// Compute one chart view and print a summary plus the JSON payload
async fn run_single(ticker: &str) -> Result<()> {
    println!("{}", "=".repeat(60).blue());
    println!("{}", "Vectr Single Ticker".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!();

    let ticker = sanitize_ticker(ticker)?;
    let service = OptionChainService::new(Arc::new(YahooClient::new()?), ServiceConfig::from_env());

    println!("{} Fetching option chain for {}...", "→".cyan(), ticker.yellow());
    let start_time = std::time::Instant::now();
    let view = service.compute_option_chain_view(&ticker).await?;
    let elapsed = start_time.elapsed();

    println!();
    println!("{}", "=".repeat(60).blue());
    println!("{}", "Results".cyan().bold());
    println!("{}", "=".repeat(60).blue());

    if let Some(quote) = &view.quote {
        println!(
            "{} {} ({}) {:.2}  {:+.2} ({:+.2}%)",
            "✓".green(),
            quote.company_name,
            quote.symbol.yellow(),
            quote.current_price,
            quote.daily_change,
            quote.daily_change_pct
        );
    }

    match &view.status {
        ViewStatus::Complete => println!("{} Expirations: {}", "✓".green(), view.dates.len()),
        ViewStatus::Partial { failed_dates } => {
            println!("{} Expirations: {}", "✓".green(), view.dates.len());
            println!("{} Unavailable: {}", "⚠".yellow(), failed_dates.join(", "));
        }
        ViewStatus::NoOptionsListed => println!("{} No options listed", "ℹ".blue()),
        ViewStatus::EmptyChain => println!("{} No usable option rows", "ℹ".blue()),
    }

    println!(
        "{} Net volume: calls {} / puts {}",
        "ℹ".blue(),
        view.totals.volume.calls_text,
        view.totals.volume.puts_text
    );
    println!(
        "{} Net premium: calls {} / puts {}",
        "ℹ".blue(),
        view.totals.premium.calls_text,
        view.totals.premium.puts_text
    );

    if !view.annotations.is_empty() {
        println!();
        println!("{}", "Most active contracts:".cyan());
        for annotation in &view.annotations {
            let line = format!("{} {}", annotation.date, annotation.text.replace('\n', " · "));
            if annotation.highlight {
                println!("  {} {}", "★".magenta(), line);
            } else {
                println!("  {} {}", "•".white(), line);
            }
        }
    }

    println!("{} Time taken: {:.2}s", "⏱".yellow(), elapsed.as_secs_f64());
    println!();
    println!("{}", serde_json::to_string_pretty(&view)?);

    Ok(())
}

/// Run API server mode
async fn run_server(port: u16) -> Result<()> {
    println!("{}", "=".repeat(60).blue());
    println!("{}", "Vectr API Server".green().bold());
    println!("{}", "=".repeat(60).blue());
    println!();

    api_server_axum::start_server(port).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = logging::init_logging()?;

    let app_config = AppConfig::from_env();
    app_config.print_banner();

    if let Err(e) = app_config.validate() {
        eprintln!("{} {}", "✗".red(), e);
        eprintln!("Set VECTR_MODE environment variable to control execution mode");
        eprintln!("Examples:");
        eprintln!("  VECTR_MODE=server VECTR_PORT=5000 cargo run   # Start API server on port 5000");
        eprintln!("  VECTR_MODE=single VECTR_TICKER=SPY cargo run  # Print one chart view");
        std::process::exit(1);
    }

    match app_config.mode.as_str() {
        "single" => run_single(&app_config.ticker).await?,
        _ => run_server(app_config.port).await?,
    }

    Ok(())
}
