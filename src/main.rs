use analytics::{
    AgingGroupBy, AnalyticsError, CostFilter, Dimension, JobCostEngine, Scenario, bucketize,
    fade_drivers, forecast, rollup, runway, wip_schedule,
};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use configuration::{Config, LoggingSettings, OutputFormat, load_config};
use core_types::CostCategory;
use ingest::{LedgerSnapshot, load_snapshot};
use period_close::{AnomalyCheck, PeriodClose, PnlRollup, attach_notes, close_history};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod render;

/// The main entry point for the job-cost reporting CLI.
fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let _guard = init_tracing(&config.logging)?;
    tracing::debug!(?config, "Configuration loaded.");
    let format = cli.format.unwrap_or(config.output.format);

    let snapshot = load_snapshot(&cli.snapshot)
        .with_context(|| format!("Failed to read ledger snapshot {}", cli.snapshot.display()))?;

    match cli.command {
        Commands::Wip => handle_wip(&snapshot, format),
        Commands::Fade(args) => handle_fade(args, &snapshot, &config, format),
        Commands::Aging(args) => handle_aging(args, &snapshot, format),
        Commands::Rollup(args) => handle_rollup(args, &snapshot, format),
        Commands::Drivers(args) => handle_drivers(args, &snapshot, format),
        Commands::CashFlow(args) => handle_cash_flow(args, &snapshot, &config, format),
        Commands::CloseStatus => handle_close_status(&snapshot, &config, format),
        Commands::Pnl(args) => handle_pnl(args, &snapshot, format),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Job-cost analytics over an accounting ledger snapshot.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./jobcost.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format; overrides `output.format` from the configuration.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// JSON ledger snapshot exported from the accounting system.
    #[arg(long, global = true, default_value = "ledger.json")]
    snapshot: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work-in-progress schedule of the active projects.
    Wip,
    /// Profit fade dashboard, most severe first.
    Fade(FadeArgs),
    /// Receivables aging.
    Aging(AgingArgs),
    /// Cost totals along one dimension.
    Rollup(RollupArgs),
    /// Cost codes driving a project's fade, worst overrun first.
    Drivers(DriversArgs),
    /// Weekly cash forecast and runway.
    CashFlow(CashFlowArgs),
    /// Replays the close log and shows each period's checklist and history.
    CloseStatus,
    /// Profit and loss of one period.
    Pnl(PnlArgs),
}

#[derive(Parser)]
struct FadeArgs {
    /// Date stamped on snapshots derived for projects that have none (defaults to today).
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Parser)]
struct AgingArgs {
    /// Reference date for ages (format: YYYY-MM-DD).
    #[arg(long)]
    as_of: NaiveDate,

    /// Group rows by client or project.
    #[arg(long, default_value = "client")]
    by: AgingGroupBy,

    /// Also list each open invoice with its bucket and status on the as-of date.
    #[arg(long)]
    detail: bool,
}

#[derive(Parser)]
struct RollupArgs {
    /// project, vendor, cost-code, category or month.
    #[arg(long)]
    by: Dimension,
    #[arg(long)]
    project: Option<String>,
    #[arg(long)]
    category: Option<CostCategory>,
    #[arg(long)]
    vendor: Option<String>,
    #[arg(long)]
    cost_code: Option<String>,
    /// First posting date included.
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last posting date included.
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Case-insensitive text matched against description, vendor and cost code.
    #[arg(long)]
    search: Option<String>,
}

#[derive(Parser)]
struct DriversArgs {
    #[arg(long)]
    project: String,
}

#[derive(Parser)]
struct CashFlowArgs {
    /// expected, best or worst.
    #[arg(long, default_value = "expected")]
    scenario: Scenario,
}

#[derive(Parser)]
struct PnlArgs {
    /// Period id, `YYYY-MM`. Costs are those posted in that month.
    #[arg(long)]
    period: String,
}

// ==============================================================================
// Setup
// ==============================================================================

/// Installs the global subscriber. `RUST_LOG` wins over `logging.level`.
///
/// The returned guard flushes the log file and must live until `main` returns.
fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .context("Invalid logging.level")?;

    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "jobcost.log");
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
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

// ==============================================================================
// Command Handlers
// ==============================================================================

fn handle_wip(snapshot: &LedgerSnapshot, format: OutputFormat) -> Result<()> {
    let lines = wip_schedule(&snapshot.projects, &snapshot.billing);
    let totals = analytics::roll_up(&lines);
    let output = serde_json::json!({ "lines": lines, "totals": totals });
    render::emit(format, &output, || render::wip(&lines, &totals))
}

fn handle_fade(
    args: FadeArgs,
    snapshot: &LedgerSnapshot,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let engine = JobCostEngine::new(config.fade.clone());
    let evaluation = engine.evaluate_portfolio(
        &snapshot.projects,
        &snapshot.billing,
        &snapshot.margin_snapshots,
        as_of,
    );
    let rows = evaluation.fade_rows();
    tracing::info!(counts = ?evaluation.severity_counts(), "Fade dashboard built.");
    render::emit(format, &rows, || render::fade(&rows))
}

fn handle_aging(args: AgingArgs, snapshot: &LedgerSnapshot, format: OutputFormat) -> Result<()> {
    let report = bucketize(&snapshot.receivables, args.as_of);
    let rows = report.rollup(args.by);
    let total = report.total_row();
    let invoices = report.invoices();
    let output = serde_json::json!({
        "as_of": args.as_of,
        "rows": rows,
        "total": total,
        "invoices": invoices,
    });
    render::emit(format, &output, || {
        let mut tables = render::aging(&rows, &total);
        if args.detail {
            tables.extend(render::invoices(&invoices));
        }
        tables
    })
}

fn handle_rollup(args: RollupArgs, snapshot: &LedgerSnapshot, format: OutputFormat) -> Result<()> {
    let filter = CostFilter {
        project: args.project,
        category: args.category,
        vendor: args.vendor,
        cost_code: args.cost_code,
        from: args.from,
        to: args.to,
        search: args.search,
    };
    let rows = rollup(&snapshot.costs, &filter, args.by);
    let dimension = args.by.to_string();
    render::emit(format, &rows, || render::rollup(&dimension, &rows))
}

fn handle_drivers(
    args: DriversArgs,
    snapshot: &LedgerSnapshot,
    format: OutputFormat,
) -> Result<()> {
    if !snapshot.projects.iter().any(|p| p.id == args.project) {
        return Err(AnalyticsError::UnknownProject(args.project).into());
    }
    let rows = fade_drivers(&args.project, &snapshot.budgets, &snapshot.costs);
    render::emit(format, &rows, || render::drivers(&rows))
}

fn handle_cash_flow(
    args: CashFlowArgs,
    snapshot: &LedgerSnapshot,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let settings = &config.cash_flow;
    let weeks = forecast(
        &snapshot.cash_forecast,
        settings.starting_cash,
        args.scenario,
        settings.horizon_weeks,
    )?;
    let runway = runway(&weeks, settings.min_cash_threshold, settings.alarm_weeks);
    let output = serde_json::json!({
        "scenario": args.scenario,
        "weeks": weeks,
        "runway": runway,
    });
    render::emit(format, &output, || render::cash_flow(&weeks, &runway))
}

fn handle_close_status(
    snapshot: &LedgerSnapshot,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let mut period_ids: Vec<&str> = Vec::new();
    for event in &snapshot.close_log {
        if !period_ids.contains(&event.period_id.as_str()) {
            period_ids.push(&event.period_id);
        }
    }

    let mut periods: Vec<PeriodClose> = Vec::with_capacity(period_ids.len());
    let mut rejected = Vec::new();
    for id in period_ids {
        let replay = PeriodClose::replay(id, &config.close.steps, &snapshot.close_log)
            .context("No close steps configured")?;
        periods.push(replay.period);
        rejected.extend(replay.rejected);
    }

    let history = close_history(
        &snapshot.closed_periods,
        &periods,
        &snapshot.ledger,
        &snapshot.costs,
    );
    let history = AnomalyCheck::from(&config.close).annotate(&history);
    attach_notes(&mut periods, &history);

    let output = serde_json::json!({
        "periods": periods,
        "history": history,
        "rejected": rejected,
    });
    render::emit(format, &output, || {
        render::close_status(&periods, &history, &rejected)
    })
}

fn handle_pnl(args: PnlArgs, snapshot: &LedgerSnapshot, format: OutputFormat) -> Result<()> {
    let pnl = PnlRollup::for_period(&args.period, &snapshot.ledger, &snapshot.costs);
    render::emit(format, &pnl, || render::pnl(&pnl))
}
