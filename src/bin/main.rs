use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portfolio_bot::bot::Bot;
use portfolio_bot::chat::telegram::Telegram;
use portfolio_bot::config::Config;
use portfolio_bot::holdings::HoldingsStore;
use portfolio_bot::ingest::IngestionLoop;
use portfolio_bot::pricing::feeds::HttpFeeds;
use portfolio_bot::pricing::PriceResolver;

#[derive(Parser, Debug)]
struct Args {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Answer chat commands until interrupted (default)
    Run,
    /// Value the portfolio once, send the report and exit
    Report,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("{}=debug,reqwest=info", env!("CARGO_CRATE_NAME")).into()
        }))
        .with(fmt::layer())
        .init();

    let args = Args::parse();
    let bot = build_bot(&args.config)?;

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => run(bot, &args.config).await,
        Commands::Report => report(bot).await,
    }
}

fn build_bot(config: &Config) -> Result<Bot<Telegram, HttpFeeds>> {
    let chat = Telegram::new(
        &config.telegram_token,
        &config.telegram_chat_id,
        config.poll_timeout(),
    )?;
    let feeds = HttpFeeds::new(&config.finnhub_api_key)?;
    let resolver = PriceResolver::new(feeds, &config.currency, config.fallback_rate);
    let store = HoldingsStore::new(&config.portfolio_file);

    Ok(Bot::new(chat, store, resolver))
}

async fn run(bot: Bot<Telegram, HttpFeeds>, config: &Config) -> Result<()> {
    let portfolio = bot.store().load().await;
    info!(
        "Loaded {} holdings from {} : {}",
        portfolio.len(),
        bot.store().path().display(),
        portfolio
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::task::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed listening for interrupt : {}", err);
            // dropping the sender would stop the loop
            std::future::pending::<()>().await;
        }
        info!("Interrupted, finishing current event");
        let _ = shutdown_tx.send(true);
    });

    info!("{}", "STARTING BOT".green());

    let mut ingestion = IngestionLoop::new(bot, config.ingestion());
    ingestion.run(shutdown_rx).await;

    info!("{}", "BOT STOPPED".yellow());
    Ok(())
}

async fn report(bot: Bot<Telegram, HttpFeeds>) -> Result<()> {
    info!("{}", "SENDING REPORT".green());
    if !bot.report().await {
        bail!("Portfolio report was not delivered");
    }
    info!("Portfolio report sent");
    Ok(())
}
