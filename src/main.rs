use analytics::{AlertLevel, AnalysisReport, AnalyticsEngine, Priority};
use anyhow::{Context, Result};
use api_client::{DatadisClient, MeteringSource, Session};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{load_config, Config, LoggingConfig};
use database::{connect, run_migrations, DbRepository, InMemoryStore, MeteringStore};
use ingest::{ReadingSyncOptions, SyncClientsResult, SyncJob, SyncReadingsResult};
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// The main entry point for the Meterwise application.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file, if any
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let config = load_config().context("Failed to load configuration")?;
    // Held for the whole run so buffered file logs are flushed on exit.
    let _log_guard = init_tracing(&config.logging)?;

    let store = open_store(cli.dry_run).await?;

    // Execute the appropriate command
    match cli.command {
        Commands::SyncClients => {
            let job = build_job(&config, store)?;
            let result = job.sync_clients().await?;
            print_clients_result(&result, cli.json)?;
        }
        Commands::SyncReadings(args) => {
            let job = build_job(&config, store)?;
            let options = ReadingSyncOptions {
                stale_days: args.stale_days.unwrap_or(config.sync.default_stale_days),
                deadline: args
                    .deadline_secs
                    .map(|secs| deadline_after(Utc::now(), secs))
                    .transpose()?,
            };
            let result = job.sync_readings(options).await?;
            print_readings_result(&result, cli.json)?;
        }
        Commands::Daily => {
            let job = build_job(&config, store)?;
            let clients = job.sync_clients().await?;
            print_clients_result(&clients, cli.json)?;

            let options = ReadingSyncOptions {
                stale_days: 1,
                deadline: None,
            };
            let readings = job.sync_readings(options).await?;
            print_readings_result(&readings, cli.json)?;
        }
        Commands::Analyze(args) => {
            handle_analyze(args, &config, store.as_ref(), cli.json).await?;
        }
        Commands::Clients(args) => {
            handle_clients(args, store.as_ref(), cli.json).await?;
        }
        Commands::Supplies(args) => {
            handle_supplies(args, store.as_ref(), cli.json).await?;
        }
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Keeps smart-meter consumption in sync with Datadis and profiles it.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use a throwaway in-memory store instead of PostgreSQL.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Print results as JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync client authorizations and their metering points.
    SyncClients,
    /// Fetch new readings for every stored metering point.
    SyncReadings(SyncReadingsArgs),
    /// The scheduled run: clients first, then readings older than a day.
    Daily,
    /// Print the consumption profile of one metering point.
    Analyze(AnalyzeArgs),
    /// List the stored clients, newest first.
    Clients(ClientsArgs),
    /// List the stored metering points.
    Supplies(SuppliesArgs),
}

#[derive(Parser)]
struct SyncReadingsArgs {
    /// Skip points synced less than this many days ago (0 refreshes everything).
    #[arg(long)]
    stale_days: Option<u32>,

    /// Stop starting new points after this many seconds.
    #[arg(long)]
    deadline_secs: Option<u64>,
}

#[derive(Parser)]
struct AnalyzeArgs {
    /// The metering point (CUPS) to analyze.
    #[arg(long)]
    cups: String,

    /// The first day to include (format: YYYY-MM-DD).
    #[arg(long)]
    from: NaiveDate,

    /// The last day to include (format: YYYY-MM-DD).
    #[arg(long)]
    to: NaiveDate,
}

#[derive(Parser)]
struct ClientsArgs {
    /// Only clients whose id or name contains this text.
    #[arg(long)]
    search: Option<String>,
}

#[derive(Parser)]
struct SuppliesArgs {
    /// Only points belonging to this client id.
    #[arg(long)]
    client: Option<String>,

    /// Only points whose CUPS or address contains this text.
    #[arg(long)]
    search: Option<String>,
}

// ==============================================================================
// Wiring
// ==============================================================================

fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "meterwise.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn open_store(dry_run: bool) -> Result<Arc<dyn MeteringStore>> {
    if dry_run {
        info!("dry run: using an in-memory store, nothing will be persisted");
        return Ok(Arc::new(InMemoryStore::new()));
    }

    let db_pool = connect().await.context("Failed to connect to the database")?;
    run_migrations(&db_pool)
        .await
        .context("Failed to run database migrations")?;
    Ok(Arc::new(DbRepository::new(db_pool)))
}

fn build_job(config: &Config, store: Arc<dyn MeteringStore>) -> Result<SyncJob> {
    // One session per run: the token is shared by every request of the job.
    let session = Arc::new(Session::new());
    let client = DatadisClient::new(&config.datadis, session)
        .context("Failed to build the Datadis client")?;
    let source: Arc<dyn MeteringSource> = Arc::new(client);

    let mut settings = config.sync.clone();
    settings.owner_client_id = Some(config.owner_client_id());

    Ok(SyncJob::new(source, store, settings))
}

fn deadline_after(now: DateTime<Utc>, secs: u64) -> Result<DateTime<Utc>> {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .and_then(|budget| now.checked_add_signed(budget))
        .with_context(|| format!("--deadline-secs {secs} is out of range"))
}

// ==============================================================================
// Listing Command Logic
// ==============================================================================

async fn handle_clients(args: ClientsArgs, store: &dyn MeteringStore, json: bool) -> Result<()> {
    let clients = store
        .list_authorizations(args.search.as_deref())
        .await
        .context("Failed to list clients")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&clients)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Client id", "Name", "Status", "Created"]);
    for client in &clients {
        table.add_row(vec![
            client.client_id.clone(),
            client.display_name.clone(),
            client.status.as_str().to_string(),
            client.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{table}");
    println!("{} client(s)", clients.len());
    Ok(())
}

async fn handle_supplies(args: SuppliesArgs, store: &dyn MeteringStore, json: bool) -> Result<()> {
    let points = store
        .search_metering_points(args.client.as_deref(), args.search.as_deref())
        .await
        .context("Failed to list metering points")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&points)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["CUPS", "Client", "Address", "Distributor", "Last sync"]);
    for point in &points {
        table.add_row(vec![
            point.id.clone(),
            point.client_id.clone(),
            point.address.clone().unwrap_or_default(),
            point.distributor_code.clone(),
            point
                .last_sync_at
                .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }
    println!("{table}");
    println!("{} metering point(s)", points.len());
    Ok(())
}

// ==============================================================================
// Analyze Command Logic
// ==============================================================================

async fn handle_analyze(
    args: AnalyzeArgs,
    config: &Config,
    store: &dyn MeteringStore,
    json: bool,
) -> Result<()> {
    anyhow::ensure!(args.from <= args.to, "--from must not be after --to");

    let readings = store
        .readings_for_point(&args.cups, args.from, args.to)
        .await
        .with_context(|| format!("Failed to load readings for {}", args.cups))?;
    info!(cups = %args.cups, readings = readings.len(), "analyzing consumption");

    let report = AnalyticsEngine::new(config.analysis.clone()).analyze(&readings);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Consumption profile for {} ({} to {})", args.cups, args.from, args.to);
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    let trend = report
        .monthly_trend_pct
        .map_or_else(|| "n/a".to_string(), |pct| format!("{pct:+.1} %"));

    let rows = [
        ("Total consumption", format!("{:.2} kWh", report.total_consumption)),
        ("Average per day", format!("{:.2} kWh", report.average_daily)),
        ("Average per reading", format!("{:.3} kWh", report.average_hourly)),
        ("Maximum reading", format!("{:.3} kWh", report.max_consumption)),
        ("Base load", format!("{:.3} kWh", report.base_load)),
        ("Active days", report.active_days.to_string()),
        ("Peak hour", format!("{:02}:00", report.peak_hour)),
        ("Peak hour average", format!("{:.3} kWh", report.peak_hour_average)),
        ("Load factor", format!("{:.3}", report.load_factor)),
        ("Night share", format!("{:.1} %", report.night_share)),
        ("Daytime share", format!("{:.1} %", report.daytime_share)),
        ("Evening share", format!("{:.1} %", report.evening_share)),
        ("Weekend share", format!("{:.1} %", report.weekend_share)),
        ("Monthly trend", trend),
        ("Anomalous days", report.anomalies_count.to_string()),
    ];
    for (metric, value) in rows {
        table.add_row(vec![metric.to_string(), value]);
    }
    println!("{table}");

    if !report.alerts.is_empty() {
        let mut alerts = Table::new();
        alerts.set_header(vec!["Level", "Alert", "Detail"]);
        for alert in &report.alerts {
            let level = match alert.level {
                AlertLevel::High => "high",
                AlertLevel::Medium => "medium",
                AlertLevel::Low => "low",
            };
            alerts.add_row(vec![level, alert.title.as_str(), alert.detail.as_str()]);
        }
        println!("{alerts}");
    }

    if !report.opportunities.is_empty() {
        let mut opportunities = Table::new();
        opportunities.set_header(vec!["Priority", "Opportunity", "Est. savings", "Detail"]);
        for opportunity in &report.opportunities {
            let priority = match opportunity.priority {
                Priority::High => "high",
                Priority::Medium => "medium",
                Priority::Low => "low",
            };
            opportunities.add_row(vec![
                priority.to_string(),
                opportunity.title.clone(),
                format!("{} %", opportunity.estimated_savings_pct),
                opportunity.detail.clone(),
            ]);
        }
        println!("{opportunities}");
    }

    println!("Recommendation: {}", report.recommendation);
}

// ==============================================================================
// Sync Result Rendering
// ==============================================================================

fn print_clients_result(result: &SyncClientsResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Clients found", "Clients upserted", "Supplies found", "Supplies upserted"]);
    table.add_row(vec![
        result.clients_found.to_string(),
        result.clients_upserted.to_string(),
        result.supplies_found.to_string(),
        result.supplies_upserted.to_string(),
    ]);
    println!("{table}");
    print_errors(&result.errors);
    Ok(())
}

fn print_readings_result(result: &SyncReadingsResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Supplies found", "Processed", "Skipped (fresh)", "Records written"]);
        table.add_row(vec![
            result.supplies_found.to_string(),
            result.supplies_processed.to_string(),
            result.supplies_skipped_fresh.to_string(),
            result.total_records_inserted.to_string(),
        ]);
        println!("{table}");
        print_errors(&result.errors);
    }

    if result.deadline_reached {
        eprintln!("Deadline reached before every metering point was synced; the rest will be picked up next run.");
    }
    if result.is_rate_limited() {
        eprintln!(
            "Datadis daily query quota exhausted for {} metering point(s). Retry tomorrow.",
            result.rate_limited_points
        );
    }
    Ok(())
}

fn print_errors(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    eprintln!("{} item(s) failed:", errors.len());
    for error in errors {
        eprintln!("  - {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn deadline_is_offset_from_now() {
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap();
        let deadline = deadline_after(now, 90).unwrap();
        assert_eq!(deadline, Utc.with_ymd_and_hms(2024, 6, 20, 12, 1, 30).unwrap());
    }

    #[test]
    fn oversized_deadline_is_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap();
        assert!(deadline_after(now, u64::MAX).is_err());
        assert!(deadline_after(now, i64::MAX as u64).is_err());
    }
}
