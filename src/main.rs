//! Portfolio Insights CLI
//!
//! Visitor analytics for a personal portfolio site.

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use portfolio_insights::{
    classifier::{classify, ClientSignals, ScreenInfo},
    config::Config,
    identity::{FileKeyStore, IdentityResolver},
    report::{ReportFormat, ReportGenerator},
    scoring::{IntentScorer, ScoringInput, ScoringStrategy},
    session::{ClickTarget, ElementInfo, ScrollPosition, SessionController, Visibility},
    store::{DocumentStore, JsonFileStore},
    tracker::Tracker,
    transparency::{create_shared_log_with_persistence, SharedTrackingLog},
    SessionRecord, PRIVACY_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "portfolio-insights")]
#[command(version = VERSION)]
#[command(about = "Visitor analytics for a personal portfolio site", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct VisitArgs {
    /// Browser user agent string
    #[arg(long, default_value = "")]
    user_agent: String,

    /// Referring URL (empty for a direct visit)
    #[arg(long, default_value = "")]
    referrer: String,

    /// Screen as WIDTHxHEIGHT@RATIO, e.g. 390x844@3
    #[arg(long)]
    screen: Option<String>,

    /// Browser locale
    #[arg(long, default_value = "")]
    locale: String,
}

impl VisitArgs {
    fn signals(&self) -> ClientSignals {
        let screen = match self.screen.as_deref().map(ScreenInfo::parse) {
            Some(Some(screen)) => screen,
            Some(None) => {
                eprintln!("Warning: could not parse --screen, ignoring it");
                ScreenInfo::default()
            }
            None => ScreenInfo::default(),
        };
        ClientSignals {
            user_agent: self.user_agent.clone(),
            referrer: self.referrer.clone(),
            screen,
            locale: self.locale.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Record a visit; interactions are read from stdin
    Track {
        #[command(flatten)]
        visit: VisitArgs,

        /// End the session after this many seconds
        #[arg(long)]
        duration: Option<u64>,
    },

    /// Generate a report of recent visitors
    Report {
        /// Write CSV instead of text
        #[arg(long)]
        csv: bool,

        /// Trailing window in days
        #[arg(long)]
        days: Option<u32>,

        /// Maximum number of sessions
        #[arg(long)]
        limit: Option<usize>,

        /// Output directory
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Scoring policy (additive or weighted)
        #[arg(long)]
        scoring: Option<ScoringStrategy>,
    },

    /// Classify a visit without recording it
    Classify {
        #[command(flatten)]
        visit: VisitArgs,
    },

    /// Show this machine's client id
    Whoami,

    /// Show tracking status
    Status,

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,

    /// Serve reports over HTTP (requires server feature)
    #[cfg(feature = "server")]
    Serve {
        /// Port to bind to
        #[arg(long, default_value = "8787")]
        port: u16,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Track { visit, duration } => cmd_track(&visit, duration),
        Commands::Report {
            csv,
            days,
            limit,
            output,
            scoring,
        } => cmd_report(csv, days, limit, output, scoring),
        Commands::Classify { visit } => cmd_classify(&visit),
        Commands::Whoami => cmd_whoami(),
        Commands::Status => cmd_status(),
        Commands::Privacy => {
            println!("{PRIVACY_DECLARATION}");
            Ok(())
        }
        Commands::Config => cmd_config(),
        #[cfg(feature = "server")]
        Commands::Serve { port } => cmd_serve(port),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Using default configuration: {}", e);
            Config::default()
        }
    }
}

fn cmd_track(visit: &VisitArgs, duration: Option<u64>) -> anyhow::Result<()> {
    let config = load_config();
    config
        .ensure_directories()
        .context("Could not create data directories")?;

    println!("Portfolio Insights v{VERSION}");
    println!();

    let log = create_shared_log_with_persistence(config.tracking_log_path());
    // Built outside the runtime: the IP lookup client is blocking
    let tracker = Tracker::from_config(&config, log.clone());
    let runtime = tokio::runtime::Runtime::new().context("Could not start runtime")?;

    let (stop_tx, stop_rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Error setting Ctrl+C handler")?;

    let signals = visit.signals();
    runtime.block_on(async {
        let Some(session) = tracker.track_visit(signals).await else {
            eprintln!("Tracking is disabled for this visit (see log above).");
            return;
        };
        run_session(&session, duration, stop_rx).await;
        session.finalize().await;
        session.flush().await;

        let record = session.snapshot().await;
        print_session(&record, config.scoring.scorer().as_ref());
    });
    // A pending stdin read would block a plain drop
    runtime.shutdown_timeout(Duration::from_millis(500));

    save_log(&log);
    println!();
    println!("{}", log.summary());
    Ok(())
}

/// Feed stdin commands into the session until EOF, `quit`, Ctrl+C or the
/// optional duration elapses.
async fn run_session(
    session: &SessionController,
    duration: Option<u64>,
    mut stop_rx: tokio::sync::mpsc::UnboundedReceiver<()>,
) {
    println!("Session {} active", session.session_id());
    println!("Commands: scroll <offset> <viewport> <document> | click <label> | link <text>");
    println!("          hide | show | heartbeat | status | quit");
    println!();

    let deadline = async {
        match duration {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = &mut deadline => break,
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_command(session, line.trim()).await {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    eprintln!("Error reading stdin: {e}");
                    break;
                }
            },
        }
    }
}

async fn handle_command(session: &SessionController, line: &str) -> bool {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "" => {}
        "quit" | "exit" => return false,
        "scroll" => {
            let values: Vec<f64> = rest
                .split_whitespace()
                .filter_map(|v| v.parse().ok())
                .collect();
            if let [offset, viewport, document] = values[..] {
                let pct = session
                    .record_scroll(ScrollPosition::new(offset, viewport, document))
                    .await;
                println!("max scroll: {pct}%");
            } else {
                eprintln!("usage: scroll <offset> <viewport> <document>");
            }
        }
        "click" => {
            let target = ClickTarget::new(vec![ElementInfo::new("div").tracked(rest)]);
            report_click(session, &target).await;
        }
        "link" => {
            let target = ClickTarget::new(vec![ElementInfo::new("a").with_text(rest)]);
            report_click(session, &target).await;
        }
        "hide" => session.set_visibility(Visibility::Hidden).await,
        "show" => session.set_visibility(Visibility::Visible).await,
        "heartbeat" => {
            if session.heartbeat_now().await {
                println!("heartbeat queued");
            }
        }
        "status" => {
            let record = session.snapshot().await;
            println!(
                "active {}s, scroll {}%, {} events",
                record.active_secs,
                record.max_scroll_pct,
                record.events.len()
            );
        }
        other => eprintln!("unknown command: {other}"),
    }
    true
}

async fn report_click(session: &SessionController, target: &ClickTarget) {
    match session.record_click(target).await {
        Some(event) => println!("recorded: {}", event.label),
        None => println!("ignored (no trackable label)"),
    }
}

fn print_session(record: &SessionRecord, scorer: &dyn IntentScorer) {
    println!();
    println!("Session finalized");
    println!("  Source: {}", record.context.source);
    println!(
        "  Device: {} ({})",
        record.context.device_model, record.context.device_type
    );
    println!("  Visit: #{}", record.visit_number);
    println!("  Active time: {}s", record.active_secs);
    println!("  Max scroll: {}%", record.max_scroll_pct);
    println!("  Interactions: {}", record.events.len());
    println!(
        "  Intent ({}): {}",
        scorer.name(),
        scorer.score(&ScoringInput::from_record(record))
    );
}

fn cmd_report(
    csv: bool,
    days: Option<u32>,
    limit: Option<usize>,
    output: Option<PathBuf>,
    scoring: Option<ScoringStrategy>,
) -> anyhow::Result<()> {
    let mut config = load_config();
    if let Some(output) = output {
        config.export_path = output;
    }
    if let Some(scoring) = scoring {
        config.scoring = scoring;
    }

    let log = create_shared_log_with_persistence(config.tracking_log_path());
    let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(config.store_path()));
    let reports = ReportGenerator::from_config(&config, store).with_log(log.clone());

    let format = if csv {
        ReportFormat::Csv
    } else {
        ReportFormat::Text
    };
    let message = reports.download(
        format,
        days.unwrap_or(config.report_window_days),
        limit.unwrap_or(config.report_max_records),
        Utc::now(),
    );
    println!("{message}");

    save_log(&log);
    Ok(())
}

fn cmd_classify(visit: &VisitArgs) -> anyhow::Result<()> {
    let context = classify(&visit.signals());
    println!(
        "{}",
        serde_json::to_string_pretty(&context).context("Could not encode context")?
    );
    Ok(())
}

fn cmd_whoami() -> anyhow::Result<()> {
    let config = load_config();
    let resolver = IdentityResolver::new(FileKeyStore::new(config.local_storage_path()));
    let client = resolver.client_id();
    println!("Client id: {client}");
    println!("Shown in reports as: client {}", client.redacted());
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = load_config();

    println!("Portfolio Insights Status");
    println!("=========================");
    println!();
    println!("Configuration:");
    println!("  Scoring: {:?}", config.scoring);
    println!("  Heartbeat interval: {}s", config.heartbeat_interval.as_secs());
    println!("  Report window: {} days", config.report_window_days);
    println!("  Report timezone: {}", config.timezone());
    println!(
        "  IP lookup: {}",
        if config.ip_lookup && cfg!(feature = "remote") {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!("  Store: {:?}", config.store_path());
    println!();

    if config.tracking_log_path().exists() {
        let log = create_shared_log_with_persistence(config.tracking_log_path());
        println!("Cumulative {}", log.summary());
    } else {
        println!("No previous tracking data found.");
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).context("Could not encode configuration")?
    );
    Ok(())
}

#[cfg(feature = "server")]
fn cmd_serve(port: u16) -> anyhow::Result<()> {
    use portfolio_insights::server::{run, ServerConfig};

    let config = load_config();
    config
        .ensure_directories()
        .context("Could not create data directories")?;

    let log = create_shared_log_with_persistence(config.tracking_log_path());
    let store: Arc<dyn DocumentStore> = Arc::new(JsonFileStore::new(config.store_path()));
    let reports = ReportGenerator::from_config(&config, store).with_log(log.clone());

    let runtime = tokio::runtime::Runtime::new().context("Could not start runtime")?;
    runtime.block_on(async {
        let (addr, shutdown_tx) = run(ServerConfig::from_config(&config, port), reports).await?;
        println!("Serving reports on http://{addr}/report");
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(());
        anyhow::Ok(())
    })?;

    save_log(&log);
    Ok(())
}

fn save_log(log: &SharedTrackingLog) {
    if let Err(e) = log.save() {
        eprintln!("Warning: Could not save tracking stats: {e}");
    }
}
