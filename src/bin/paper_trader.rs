use anyhow::Context;
use book_imbalance::utils::init_from_config;
use book_imbalance::{
    Config, ImbalanceError, MarketEvent, OrderBookImbalance, PaperHost, StrategyError,
};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Replay market events through the imbalance strategy against a paper host
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to $CONFIG_FILE or config/paper.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-lines file of quote / delta events
    #[arg(short, long)]
    events: PathBuf,

    /// Print Prometheus metrics when the replay ends
    #[arg(long)]
    print_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    init_from_config(&config.logging)?;

    info!("Starting Order Book Imbalance - Paper Trading Mode");
    info!("Environment: {}", config.general.environment);

    let host = PaperHost::new().with_instrument(config.instrument.clone());
    let mut strategy = OrderBookImbalance::new(config.strategy.clone(), host)?;
    strategy.on_start()?;

    // Feed reader runs on its own task; events are handled one at a time here
    let (event_tx, mut event_rx) = mpsc::channel::<MarketEvent>(1024);
    let reader = tokio::spawn(read_events(args.events.clone(), event_tx));

    let mut event_count: u64 = 0;
    let mut trade_count: u64 = 0;

    while let Some(event) = event_rx.recv().await {
        event_count += 1;

        match strategy.on_event(&event) {
            Ok(decision) => {
                if decision.is_trade() {
                    trade_count += 1;
                }
            }
            Err(StrategyError::Engine(e @ ImbalanceError::InvalidDelta { .. })) => {
                warn!("{} - resetting book until the next snapshot", e);
                strategy.reset_book();
            }
            Err(e) => {
                error!("Event {} failed: {}", event_count, e);
            }
        }
    }

    let skipped = reader.await??;
    strategy.on_stop()?;

    info!("Replay finished");
    info!("   Events: {} ({} malformed lines skipped)", event_count, skipped);
    info!("   Orders: {}", trade_count);
    for order in strategy.host().orders() {
        info!(
            "   {} {:?} {} @ {}",
            order.client_order_id, order.side, order.quantity, order.price
        );
    }

    if args.print_metrics && config.metrics.enabled {
        println!("{}", strategy.metrics().render()?);
    }

    Ok(())
}

/// Parse the events file line by line, returning the number of skipped lines
async fn read_events(path: PathBuf, event_tx: mpsc::Sender<MarketEvent>) -> anyhow::Result<usize> {
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("Failed to open events file {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();

    let mut line_no = 0;
    let mut skipped = 0;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match serde_json::from_str::<MarketEvent>(line) {
            Ok(event) => {
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("Skipping line {}: {}", line_no, e);
                skipped += 1;
            }
        }
    }

    Ok(skipped)
}
