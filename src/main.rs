use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};

use lock_activity_sync::capabilities::fetch_lock_capabilities;
use lock_activity_sync::devices::{Brand, DeviceRegistry};
use lock_activity_sync::history::ActivityHistory;
use lock_activity_sync::streaming::backend::RecordingDeviceApi;
use lock_activity_sync::streaming::domain::PushActivityParser;
use lock_activity_sync::streaming::runtime::{BroadcastObserver, DispatchStats, PushDriver};
use lock_activity_sync::streaming::types::{PushEnvelope, PushMessage, PushSource};
use lock_activity_sync::{PushMessageDispatcher, RefreshScheduler, SyncConfig};

#[derive(Parser)]
#[command(author, version, about = "Replays push messages through the dedup and refresh pipeline")]
struct Args {
    /// JSON array of devices.
    #[arg(long)]
    devices: PathBuf,

    /// Push messages, one JSON object per line.
    #[arg(long)]
    messages: PathBuf,

    /// JSON file with delay overrides in milliseconds.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    soon_delay_ms: Option<u64>,

    #[arg(long)]
    cooldown_delay_ms: Option<u64>,

    #[arg(long)]
    initial_resync_delay_ms: Option<u64>,

    /// Skip the startup resync timers.
    #[arg(long)]
    no_setup: bool,

    /// Seconds to wait after the last message for refresh chains to drain.
    #[arg(long, default_value_t = 10)]
    linger_secs: u64,

    #[arg(long, value_enum, default_value_t = BrandArg::YaleHome)]
    brand: BrandArg,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum BrandArg {
    August,
    YaleHome,
    YaleGlobal,
}

impl From<BrandArg> for Brand {
    fn from(b: BrandArg) -> Self {
        match b {
            BrandArg::August => Brand::August,
            BrandArg::YaleHome => Brand::YaleHome,
            BrandArg::YaleGlobal => Brand::YaleGlobal,
        }
    }
}

/// One line of the messages file. `observed_at` defaults to replay time.
#[derive(Debug, Deserialize)]
struct MessageLine {
    device_id: String,
    #[serde(default)]
    observed_at: Option<chrono::DateTime<Utc>>,
    source: PushSource,
    message: PushMessage,
}

#[derive(Debug)]
struct ReplayResult {
    total_time: Duration,
    stats: DispatchStats,
    fetches: usize,
    notifications: usize,
    history_entries: usize,
}

fn build_config(args: &Args) -> Result<SyncConfig> {
    let base = match &args.config {
        Some(path) => SyncConfig::load(path)?,
        None => SyncConfig::default(),
    };
    let overrides = lock_activity_sync::config::ConfigFile {
        soon_delay_ms: args.soon_delay_ms,
        cooldown_delay_ms: args.cooldown_delay_ms,
        initial_resync_delay_ms: args.initial_resync_delay_ms,
    };
    Ok(base.merge(&overrides).validate()?)
}

fn read_messages(path: &Path) -> Result<Vec<PushEnvelope>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read messages from {}", path.display()))?;

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let parsed: MessageLine = serde_json::from_str(line)
                .with_context(|| format!("{}:{}: invalid push message", path.display(), n + 1))?;
            Ok(PushEnvelope {
                device_id: parsed.device_id,
                observed_at: parsed.observed_at.unwrap_or_else(Utc::now),
                message: parsed.message,
                source: parsed.source,
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = build_config(&args)?;
    println!("[MAIN] {:?}", config);

    let raw_devices = std::fs::read_to_string(&args.devices)
        .with_context(|| format!("failed to read devices from {}", args.devices.display()))?;
    let registry = Arc::new(DeviceRegistry::from_json_str(&raw_devices)?);
    let envelopes = read_messages(&args.messages)?;

    let result = run_replay(&args, config, registry, envelopes).await?;
    print_summary(&result);

    Ok(())
}

async fn run_replay(
    args: &Args,
    config: SyncConfig,
    registry: Arc<DeviceRegistry>,
    envelopes: Vec<PushEnvelope>,
) -> Result<ReplayResult> {
    let t0 = Instant::now();

    let api = Arc::new(RecordingDeviceApi::new());
    let history = Arc::new(ActivityHistory::new());
    let observer = Arc::new(BroadcastObserver::new(256));
    let mut notifications = observer.subscribe();

    let counter = tokio::spawn(async move {
        let mut seen = 0;
        loop {
            match notifications.recv().await {
                Ok(_) => seen += 1,
                Err(broadcast::error::RecvError::Lagged(missed)) => seen += missed as usize,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        seen
    });

    let updated = fetch_lock_capabilities(api.as_ref(), &registry, args.brand.into()).await;
    log::info!("[MAIN] capabilities loaded for {} locks", updated);

    let scheduler = RefreshScheduler::new(api.clone(), history.clone(), config);
    if !args.no_setup {
        scheduler.setup(registry.house_ids());
    }

    let dispatcher = Arc::new(PushMessageDispatcher::new(
        registry,
        Arc::new(PushActivityParser::new()),
        history.clone(),
        scheduler,
        observer.clone(),
    ));

    let (tx, rx) = mpsc::channel(64);
    let driver = tokio::spawn(PushDriver::new(dispatcher.clone(), rx).run());

    println!("[MAIN] replaying {} messages", envelopes.len());
    for envelope in envelopes {
        tx.send(envelope)
            .await
            .context("push driver stopped early")?;
    }

    tokio::time::sleep(Duration::from_secs(args.linger_secs)).await;
    drop(tx);
    driver.await.context("push driver panicked")?;

    let stats = dispatcher.stats();
    drop(dispatcher);
    drop(observer);
    let notifications = counter.await.unwrap_or(0);

    Ok(ReplayResult {
        total_time: t0.elapsed(),
        stats,
        fetches: api.fetch_count(),
        notifications,
        history_entries: history.len(),
    })
}

fn print_summary(r: &ReplayResult) {
    println!();
    println!("==================================================");
    println!("                  REPLAY SUMMARY                  ");
    println!("==================================================");
    println!("{:<22} | {:>10}", "Metric", "Value");
    println!("--------------------------------------------------");
    println!("{:<22} | {:>10?}", "Total Time", r.total_time);
    println!("{:<22} | {:>10}", "Messages handled", r.stats.handled);
    println!("{:<22} | {:>10}", "Unknown devices", r.stats.unknown_devices);
    println!("{:<22} | {:>10}", "Activities extracted", r.stats.activities);
    println!("{:<22} | {:>10}", "Refreshes requested", r.stats.refreshes_requested);
    println!("{:<22} | {:>10}", "Refreshes skipped", r.stats.refreshes_skipped);
    println!("{:<22} | {:>10}", "Backend fetches", r.fetches);
    println!("{:<22} | {:>10}", "History entries", r.history_entries);
    println!("{:<22} | {:>10}", "Notifications", r.notifications);
    println!("--------------------------------------------------");

    let ratio = if r.stats.handled == 0 {
        0.0
    } else {
        r.stats.refreshes_skipped as f64 / r.stats.handled as f64
    };
    println!("Dedup ratio: {:.2}", ratio);
    println!("==================================================");
}
