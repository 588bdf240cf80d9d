//! CLI definition and dispatch.

use chrono::{Days, Months, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{parse_date, validate_backtest_config};
use crate::domain::dataset::{DroppedSymbol, Jump};
use crate::domain::error::BacktestError;
use crate::domain::metrics::PnlSummary;
use crate::domain::signal::{
    signal_by_name, DegenerateFit, MeanReversionSignal, Signal, SIGNAL_NAMES,
};
use crate::domain::universe::{default_universe, load_dataset, parse_symbols, LoadedUniverse};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_OPEN_SIGNAL: &str = "mean_reversion";
pub const DEFAULT_CLOSE_SIGNAL: &str = "close_daily_positions";
pub const DEFAULT_HISTORY_DAYS: i64 = 45;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PNL_PATH: &str = "pnl.csv";

#[derive(Parser, Debug)]
#[command(name = "dailybt", about = "Daily-bar equity backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// P&L output file, overrides [report] pnl_path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// CSV directory, overrides [data] directory
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Report the largest intraday log move in the configured data
    Jump {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// List the built-in signal names
    Signals,
    /// List symbols available in a CSV directory
    ListSymbols {
        #[arg(long)]
        data_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            data_dir,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, data_dir.as_deref())
            } else {
                run_backtest(&config, output.as_deref(), data_dir.as_deref())
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::Jump { config, data_dir } => run_jump(&config, data_dir.as_deref()),
        Command::Signals => run_signals(),
        Command::ListSymbols { data_dir } => run_list_symbols(&data_dir),
    }
}

fn fail(e: &BacktestError) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::from(e)
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, BacktestError> {
    let start_date = parse_date(config, "start_date")?;
    let end_date = parse_date(config, "end_date")?;

    let decimals = match config.get_string("backtest", "decimals") {
        Some(raw) => Some(raw.trim().parse::<u32>().map_err(|_| {
            BacktestError::config_invalid("backtest", "decimals", format!("not a valid count: {raw}"))
        })?),
        None => None,
    };

    Ok(BacktestConfig {
        start_date,
        end_date,
        spread: config.get_double("backtest", "spread", 0.0),
        decimals,
        strict: config.get_bool("backtest", "strict", false),
    })
}

pub fn build_mean_reversion(config: &dyn ConfigPort) -> Result<MeanReversionSignal, BacktestError> {
    let months = config.get_int("mean_reversion", "lookback_months", 1);
    let lookback_months = u32::try_from(months)
        .ok()
        .filter(|m| *m >= 1)
        .ok_or_else(|| {
            BacktestError::config_invalid("mean_reversion", "lookback_months", "must be at least 1")
        })?;

    let degenerate = match config
        .get_string("mean_reversion", "degenerate_fit")
        .map(|s| s.trim().to_lowercase())
        .as_deref()
    {
        None | Some("fail") => DegenerateFit::Fail,
        Some("neutral") => DegenerateFit::Neutral,
        Some(other) => {
            return Err(BacktestError::config_invalid(
                "mean_reversion",
                "degenerate_fit",
                format!("unknown policy '{other}'"),
            ));
        }
    };

    Ok(MeanReversionSignal::new(lookback_months, degenerate))
}

pub fn build_signal(
    config: &dyn ConfigPort,
    key: &str,
    default: &str,
) -> Result<Box<dyn Signal + Send + Sync>, BacktestError> {
    let name = config
        .get_string("backtest", key)
        .unwrap_or_else(|| default.to_string());
    if name.trim().eq_ignore_ascii_case("mean_reversion") {
        return Ok(Box::new(build_mean_reversion(config)?));
    }
    signal_by_name(&name).ok_or_else(|| {
        BacktestError::config_invalid("backtest", key, format!("unknown signal '{}'", name.trim()))
    })
}

pub fn resolve_symbols(config: &dyn ConfigPort) -> Result<Vec<String>, BacktestError> {
    match config.get_string("data", "symbols") {
        Some(list) => parse_symbols(&list)
            .map_err(|e| BacktestError::config_invalid("data", "symbols", e.to_string())),
        None => Ok(default_universe()),
    }
}

pub fn resolve_data_dir(data_dir_override: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    data_dir_override.map(Path::to_path_buf).unwrap_or_else(|| {
        PathBuf::from(
            config
                .get_string("data", "directory")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        )
    })
}

fn uses_mean_reversion(config: &dyn ConfigPort) -> bool {
    [("open_signal", DEFAULT_OPEN_SIGNAL), ("close_signal", DEFAULT_CLOSE_SIGNAL)]
        .iter()
        .any(|(key, default)| {
            config
                .get_string("backtest", key)
                .unwrap_or_else(|| default.to_string())
                .trim()
                .eq_ignore_ascii_case("mean_reversion")
        })
}

/// First calendar date fetched: `start_date` minus `[data] history_days`, or
/// the mean-reversion look-back start when that reaches further back.
pub fn fetch_start(config: &dyn ConfigPort, start_date: NaiveDate) -> Result<NaiveDate, BacktestError> {
    let days = config.get_int("data", "history_days", DEFAULT_HISTORY_DAYS);
    let from = u64::try_from(days)
        .ok()
        .and_then(|d| start_date.checked_sub_days(Days::new(d)))
        .ok_or_else(|| BacktestError::config_invalid("data", "history_days", "out of range"))?;

    if !uses_mean_reversion(config) {
        return Ok(from);
    }
    let months = build_mean_reversion(config)?.lookback_months;
    let lookback_start = start_date
        .checked_sub_months(Months::new(months))
        .ok_or_else(|| BacktestError::config_invalid("mean_reversion", "lookback_months", "out of range"))?;
    if lookback_start < from {
        tracing::debug!(%from, %lookback_start, "look-back reaches past history_days");
    }
    Ok(from.min(lookback_start))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub pnl: PathBuf,
    pub open_actions: Option<PathBuf>,
    pub close_actions: Option<PathBuf>,
    pub equity: Option<PathBuf>,
}

impl ReportPaths {
    pub fn from_config(config: &dyn ConfigPort, output_override: Option<&Path>) -> Self {
        let path = |key: &str| config.get_string("report", key).map(PathBuf::from);
        Self {
            pnl: output_override
                .map(Path::to_path_buf)
                .or_else(|| path("pnl_path"))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PNL_PATH)),
            open_actions: path("open_actions_path"),
            close_actions: path("close_actions_path"),
            equity: path("equity_path"),
        }
    }
}

pub struct BacktestOutcome {
    pub result: BacktestResult,
    pub summary: PnlSummary,
    pub skipped: Vec<DroppedSymbol>,
    pub removed_jump: Option<Jump>,
}

fn load_universe(
    data_port: &dyn DataPort,
    config: &dyn ConfigPort,
    bt_config: &BacktestConfig,
) -> Result<LoadedUniverse, BacktestError> {
    let symbols = resolve_symbols(config)?;
    let from = fetch_start(config, bt_config.start_date)?;
    load_dataset(data_port, &symbols, from, bt_config.end_date)
}

/// Validate, load, simulate, summarize and write reports.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    config: &dyn ConfigPort,
    output_override: Option<&Path>,
) -> Result<BacktestOutcome, BacktestError> {
    validate_backtest_config(config)?;
    let bt_config = build_backtest_config(config)?;
    let open_signal = build_signal(config, "open_signal", DEFAULT_OPEN_SIGNAL)?;
    let close_signal = build_signal(config, "close_signal", DEFAULT_CLOSE_SIGNAL)?;

    let LoadedUniverse {
        mut dataset,
        skipped,
    } = load_universe(data_port, config, &bt_config)?;

    let removed_jump = if config.get_bool("backtest", "remove_biggest_jump", false) {
        dataset.remove_biggest_jump()
    } else {
        None
    };

    let result = backtest_engine::run_backtest(&dataset, &*open_signal, &*close_signal, &bt_config)?;
    let summary = PnlSummary::compute(&result);

    let paths = ReportPaths::from_config(config, output_override);
    report_port.write_matrix(&result.pnl, &paths.pnl)?;
    if let Some(path) = &paths.open_actions {
        report_port.write_matrix(&result.open_actions, path)?;
    }
    if let Some(path) = &paths.close_actions {
        report_port.write_matrix(&result.close_actions, path)?;
    }
    if let Some(path) = &paths.equity {
        report_port.write_equity(&summary.equity_curve, path)?;
    }

    Ok(BacktestOutcome {
        result,
        summary,
        skipped,
        removed_jump,
    })
}

pub fn print_summary(outcome: &BacktestOutcome) {
    let s = &outcome.summary;

    if !outcome.skipped.is_empty() {
        eprintln!("\n=== Skipped Symbols ===");
        for d in &outcome.skipped {
            eprintln!("  {}: {:?}", d.symbol, d.reason);
        }
    }
    if let Some(jump) = &outcome.removed_jump {
        eprintln!(
            "\nRemoved jump: {} on {} (log move {:.4})",
            jump.symbol, jump.date, jump.log_jump
        );
    }

    eprintln!("\n=== P&L Summary ===");
    eprintln!("Total P&L:        {:.4}", s.total_pnl);
    eprintln!("Sessions:         {} ({} with trades)", s.sessions, s.active_sessions);
    eprintln!("Units Traded:     {:.0}", s.units_traded);
    eprintln!("Winning Days:     {}", s.winning_sessions);
    eprintln!("Losing Days:      {}", s.losing_sessions);
    eprintln!("Best Day:         {:.4}", s.best_session);
    eprintln!("Worst Day:        {:.4}", s.worst_session);
    eprintln!(
        "Max Drawdown:     {:.4} over {} sessions",
        s.max_drawdown, s.max_drawdown_duration
    );

    if !s.per_symbol.is_empty() {
        eprintln!("\n=== Per-Symbol Summary ===");
        for sym in &s.per_symbol {
            let sign = if sym.pnl >= 0.0 { "+" } else { "" };
            eprintln!(
                "  {:<6} {}{:.4}  ({:.0} units)",
                sym.symbol, sign, sym.pnl, sym.units_traded
            );
        }
    }
}

fn run_backtest(config_path: &Path, output: Option<&Path>, data_dir: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &config));
    match run_backtest_pipeline(&data_port, &CsvReportAdapter, &config, output) {
        Ok(outcome) => {
            print_summary(&outcome);
            let paths = ReportPaths::from_config(&config, output);
            eprintln!("\nP&L written to: {}", paths.pnl.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

pub fn run_dry_run(config_path: &Path, data_dir: Option<&Path>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&config) {
        return fail(&e);
    }
    eprintln!("Config validated successfully");

    let plan = (|| -> Result<_, BacktestError> {
        let bt_config = build_backtest_config(&config)?;
        let open = build_signal(&config, "open_signal", DEFAULT_OPEN_SIGNAL)?;
        let close = build_signal(&config, "close_signal", DEFAULT_CLOSE_SIGNAL)?;
        let symbols = resolve_symbols(&config)?;
        let from = fetch_start(&config, bt_config.start_date)?;
        Ok((bt_config, open.name().to_string(), close.name().to_string(), symbols, from))
    })();

    let (bt_config, open, close, symbols, from) = match plan {
        Ok(p) => p,
        Err(e) => return fail(&e),
    };
    let paths = ReportPaths::from_config(&config, None);

    eprintln!("\nHorizon:  {} to {}", bt_config.start_date, bt_config.end_date);
    eprintln!("Fetch:    from {}", from);
    eprintln!("Signals:  open={open} close={close}");
    eprintln!("Spread:   {}", bt_config.spread);
    eprintln!("Data dir: {}", resolve_data_dir(data_dir, &config).display());
    eprintln!("Symbols:  {}", symbols.join(", "));
    eprintln!("P&L file: {}", paths.pnl.display());

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&config) {
        return fail(&e);
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_jump(config_path: &Path, data_dir: Option<&Path>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let data_port = CsvAdapter::new(resolve_data_dir(data_dir, &config));
    let loaded = build_backtest_config(&config)
        .and_then(|bt_config| load_universe(&data_port, &config, &bt_config));
    let loaded = match loaded {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };

    match loaded.dataset.find_biggest_jump() {
        Some(jump) => {
            println!("{},{},{}", jump.date, jump.symbol, jump.log_jump);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("No finite intraday move found");
            ExitCode::SUCCESS
        }
    }
}

fn run_signals() -> ExitCode {
    for name in SIGNAL_NAMES {
        println!("{name}");
    }
    ExitCode::SUCCESS
}

fn run_list_symbols(data_dir: &Path) -> ExitCode {
    let symbols = match CsvAdapter::new(data_dir.to_path_buf()).list_symbols() {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    if symbols.is_empty() {
        eprintln!("No symbols found in {}", data_dir.display());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}
