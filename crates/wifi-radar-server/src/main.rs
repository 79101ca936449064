//! WiFi Radar server
//!
//! Scans nearby access points on a fixed period, correlates their RSSI
//! histories, lays them out in 3D and streams one `radar_snapshot` per cycle
//! to every viewer connected on `ws://<host>:<port>/ws`.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use wifi_radar_server::{
    connection_tracker, router, serve, AppState, RadarConfig, RadarEngine, RadarStatus, ScanDriver,
    SnapshotPublisher,
};
use wifi_radar_wifiscan::{
    platform_scanner, scanner_for_os, LiveScanOptions, SyntheticScanner, WlanScanPort,
};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "wifi-radar", about = "WiFi Radar correlation engine and snapshot server")]
struct Args {
    /// Address to bind the HTTP/WebSocket server to
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// HTTP port serving /ws, /health and the REST API
    #[arg(long, default_value = "8765")]
    port: u16,

    /// JSON configuration file; CLI flags override its values
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Data source: auto, linux, macos, synthetic
    #[arg(long, default_value = "auto")]
    source: String,

    /// Wireless interface for the Linux `iw` scanner
    #[arg(long, default_value = "wlan0")]
    interface: String,

    /// Read the kernel's cached results (`iw scan dump`) instead of scanning
    #[arg(long)]
    cached: bool,

    /// Path to the macOS CoreWLAN helper binary
    #[arg(long, value_name = "PATH", default_value = "mac_wifi")]
    helper: String,

    /// Path to static renderer files served under /ui
    #[arg(long, value_name = "PATH")]
    ui_path: Option<PathBuf>,

    /// Scan period in milliseconds
    #[arg(long)]
    period_ms: Option<u64>,

    /// Samples kept per network
    #[arg(long)]
    window: Option<usize>,

    /// Shared samples required before a pair is correlated
    #[arg(long)]
    min_overlap: Option<usize>,

    /// Minimum |r| for an edge in the snapshot
    #[arg(long)]
    edge_threshold: Option<f64>,

    /// Missed scan cycles before a network is dropped
    #[arg(long)]
    stale_after: Option<u32>,

    /// Layout ticks per scan cycle
    #[arg(long)]
    steps_per_cycle: Option<usize>,

    /// Seed for the synthetic scanner and layout
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut RadarConfig) {
        if let Some(v) = self.period_ms {
            config.scan.period_ms = v;
        }
        if let Some(v) = self.seed {
            config.scan.seed = v;
        }
        if let Some(v) = self.window {
            config.history.window = v;
        }
        if let Some(v) = self.stale_after {
            config.history.stale_after_cycles = v;
        }
        if let Some(v) = self.min_overlap {
            config.correlation.min_overlap = v;
        }
        if let Some(v) = self.edge_threshold {
            config.correlation.edge_threshold = v;
        }
        if let Some(v) = self.steps_per_cycle {
            config.layout.steps_per_cycle = v;
        }
    }
}

// ── Scan backend selection ───────────────────────────────────────────────────

impl Args {
    fn live_options(&self) -> LiveScanOptions {
        LiveScanOptions {
            interface: self.interface.clone(),
            cached: self.cached,
            helper: self.helper.clone(),
        }
    }
}

/// A live scanner is usable if one scan returns at least one network.
async fn returns_networks(scanner: Arc<dyn WlanScanPort>) -> bool {
    match tokio::task::spawn_blocking(move || scanner.scan()).await {
        Ok(Ok(obs)) => !obs.is_empty(),
        _ => false,
    }
}

async fn select_scanner(args: &Args, seed: u64) -> anyhow::Result<Arc<dyn WlanScanPort>> {
    let synthetic = || -> Arc<dyn WlanScanPort> { Arc::new(SyntheticScanner::new(seed, 4.0)) };
    let options = args.live_options();

    let scanner: Arc<dyn WlanScanPort> = match args.source.as_str() {
        "auto" => {
            info!("Auto-detecting data source...");
            let live = match platform_scanner(&options) {
                Ok(live) => returns_networks(Arc::clone(&live)).await.then_some(live),
                Err(e) => {
                    warn!("  {e}");
                    None
                }
            };
            match live {
                Some(live) => {
                    info!("  {} scanner returned networks", live.name());
                    live
                }
                None => {
                    info!("  No live scanner available, using synthetic data");
                    synthetic()
                }
            }
        }
        "linux" | "iw" => scanner_for_os("linux", &options)?,
        "macos" => scanner_for_os("macos", &options)?,
        "synthetic" | "simulate" => synthetic(),
        other => bail!("unknown --source `{other}` (expected auto, linux, macos or synthetic)"),
    };
    Ok(scanner)
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            RadarConfig::load(path)?
        }
        None => RadarConfig::default(),
    };
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    let scanner = select_scanner(&args, config.scan.seed).await?;
    info!(
        source = scanner.name(),
        period_ms = config.scan.period_ms,
        window = config.history.window,
        edge_threshold = config.correlation.edge_threshold,
        "Data source: {}",
        scanner.name()
    );

    let publisher = SnapshotPublisher::new(&config.publish);
    let status = RadarStatus::shared(scanner.name());
    let driver = ScanDriver::new(
        scanner,
        RadarEngine::new(&config),
        publisher.clone(),
        status.clone(),
        config.scan.period(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let driver_task = tokio::spawn(driver.run(shutdown_rx.clone()));

    let (connections, mut drain) = connection_tracker();
    let app = router(
        AppState {
            publisher,
            status,
            send_timeout: config.publish.send_timeout(),
            connections,
        },
        args.ui_path.clone(),
    );

    let addr = SocketAddr::new(args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("WebSocket viewers: ws://{addr}/ws");
    if args.ui_path.is_some() {
        info!("Renderer: http://{addr}/ui/index.html");
    }

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                error!("failed to install CTRL+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
        let _ = shutdown_tx.send(true);
    });

    serve(listener, app, shutdown_rx).await.context("HTTP server failed")?;

    if let Err(e) = driver_task.await {
        error!("scan driver task failed: {e}");
    }
    // The driver closed the publisher; viewers are sending their Close frames.
    let grace = config.publish.send_timeout() + Duration::from_secs(1);
    if !drain.wait(grace).await {
        warn!("viewer connections still open after {grace:?}");
    }
    info!("Server shut down cleanly");
    Ok(())
}
