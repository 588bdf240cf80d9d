//! CLI integration tests for the backtest command orchestration.
//!
//! Tests cover:
//! - Config parsing (build_backtest_config, build_signal, resolve_symbols)
//! - Report path resolution and the history look-back
//! - Full pipeline with MockDataPort and a recording report sink
//! - End-to-end with CSV files and INI files on disk
//! - Command dispatch exit codes

mod common;

use approx::assert_abs_diff_eq;
use clap::Parser;
use common::*;
use dailybt::adapters::csv_adapter::CsvAdapter;
use dailybt::adapters::csv_report_adapter::CsvReportAdapter;
use dailybt::adapters::file_config_adapter::FileConfigAdapter;
use dailybt::cli::{self, Cli, ReportPaths};
use dailybt::domain::backtest::{run_backtest, BacktestConfig};
use dailybt::domain::error::BacktestError;
use dailybt::domain::signal::{CloseDailyPositions, DegenerateFit, MeanReversionSignal};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn config(content: &str) -> FileConfigAdapter {
    FileConfigAdapter::from_string(content).unwrap()
}

fn same_code(a: ExitCode, b: ExitCode) -> bool {
    format!("{a:?}") == format!("{b:?}")
}

const VALID_INI: &str = r#"
[data]
directory = prices
symbols = aapl,msft
history_days = 10

[backtest]
start_date = 2016-01-11
end_date = 2016-01-15
open_signal = buy_at_start
close_signal = hold
spread = 0.02
decimals = 6

[report]
pnl_path = out/pnl.csv
open_actions_path = out/open.csv
equity_path = out/equity.csv
"#;

const LONG_LOOKBACK_INI: &str = r#"
[data]
symbols = aapl,msft,ibm,xom

[backtest]
start_date = 2016-06-01
end_date = 2016-06-10
open_signal = mean_reversion
close_signal = close_daily_positions

[mean_reversion]
lookback_months = 3
"#;

mod config_parsing {
    use super::*;

    #[test]
    fn build_backtest_config_reads_all_fields() {
        let bt = cli::build_backtest_config(&config(VALID_INI)).unwrap();
        assert_eq!(bt.start_date, date(2016, 1, 11));
        assert_eq!(bt.end_date, date(2016, 1, 15));
        assert_eq!(bt.spread, 0.02);
        assert_eq!(bt.decimals, Some(6));
        assert!(!bt.strict);
    }

    #[test]
    fn build_backtest_config_defaults() {
        let bt = cli::build_backtest_config(&config(
            "[backtest]\nstart_date = 2016-01-01\nend_date = 2016-06-30\n",
        ))
        .unwrap();
        assert_eq!(bt.spread, 0.0);
        assert_eq!(bt.decimals, None);
    }

    #[test]
    fn build_backtest_config_missing_end_date() {
        let err = cli::build_backtest_config(&config("[backtest]\nstart_date = 2016-01-01\n"))
            .unwrap_err();
        assert!(matches!(err, BacktestError::ConfigMissing { ref key, .. } if key == "end_date"));
    }

    #[test]
    fn signals_default_to_mean_reversion_and_daily_close() {
        let c = config("[backtest]\n");
        let open = cli::build_signal(&c, "open_signal", cli::DEFAULT_OPEN_SIGNAL).unwrap();
        let close = cli::build_signal(&c, "close_signal", cli::DEFAULT_CLOSE_SIGNAL).unwrap();
        assert_eq!(open.name(), "mean_reversion");
        assert_eq!(close.name(), "close_daily_positions");
    }

    #[test]
    fn mean_reversion_parameters() {
        let mr = cli::build_mean_reversion(&config(
            "[mean_reversion]\nlookback_months = 3\ndegenerate_fit = Neutral\n",
        ))
        .unwrap();
        assert_eq!(mr.lookback_months, 3);
        assert_eq!(mr.degenerate, dailybt::domain::signal::DegenerateFit::Neutral);

        let err = cli::build_mean_reversion(&config("[mean_reversion]\nlookback_months = 0\n"));
        assert!(err.is_err());
    }

    #[test]
    fn unknown_signal_is_config_invalid() {
        let err = cli::build_signal(
            &config("[backtest]\nopen_signal = momentum\n"),
            "open_signal",
            cli::DEFAULT_OPEN_SIGNAL,
        )
        .err()
        .unwrap();
        assert!(matches!(err, BacktestError::ConfigInvalid { ref key, .. } if key == "open_signal"));
    }

    #[test]
    fn symbols_from_config_or_default_universe() {
        assert_eq!(cli::resolve_symbols(&config(VALID_INI)).unwrap(), vec!["AAPL", "MSFT"]);
        assert_eq!(cli::resolve_symbols(&config("[data]\n")).unwrap().len(), 30);
    }

    #[test]
    fn fetch_start_subtracts_history_days() {
        let c = config(VALID_INI);
        assert_eq!(cli::fetch_start(&c, date(2016, 1, 11)).unwrap(), date(2016, 1, 1));
        let default = config("[data]\n");
        assert_eq!(cli::fetch_start(&default, date(2016, 3, 1)).unwrap(), date(2016, 1, 16));
    }

    #[test]
    fn fetch_start_covers_mean_reversion_lookback() {
        let c = config(LONG_LOOKBACK_INI);
        assert_eq!(cli::fetch_start(&c, date(2016, 6, 1)).unwrap(), date(2016, 3, 1));

        let short = LONG_LOOKBACK_INI.replace("lookback_months = 3", "lookback_months = 1");
        assert_eq!(cli::fetch_start(&config(&short), date(2016, 6, 1)).unwrap(), date(2016, 4, 17));
    }

    #[test]
    fn report_paths_prefer_cli_override() {
        let c = config(VALID_INI);
        let paths = ReportPaths::from_config(&c, None);
        assert_eq!(paths.pnl, PathBuf::from("out/pnl.csv"));
        assert_eq!(paths.open_actions, Some(PathBuf::from("out/open.csv")));
        assert_eq!(paths.close_actions, None);

        let overridden = ReportPaths::from_config(&c, Some(Path::new("mine.csv")));
        assert_eq!(overridden.pnl, PathBuf::from("mine.csv"));

        assert_eq!(ReportPaths::from_config(&config("[report]\n"), None).pnl, PathBuf::from("pnl.csv"));
    }

    #[test]
    fn data_dir_override() {
        let c = config(VALID_INI);
        assert_eq!(cli::resolve_data_dir(None, &c), PathBuf::from("prices"));
        assert_eq!(cli::resolve_data_dir(Some(Path::new("/tmp/x")), &c), PathBuf::from("/tmp/x"));
        assert_eq!(cli::resolve_data_dir(None, &config("[data]\n")), PathBuf::from("data"));
    }
}

mod pipeline {
    use super::*;

    fn port() -> MockDataPort {
        let dates = weekdays(date(2016, 1, 4), 10);
        MockDataPort::new()
            .with_bars("AAPL", random_walk("AAPL", &dates, 100.0, 1))
            .with_bars("MSFT", random_walk("MSFT", &dates, 55.0, 2))
    }

    #[test]
    fn writes_configured_reports() {
        let reports = RecordingReportPort::default();
        let outcome =
            cli::run_backtest_pipeline(&port(), &reports, &config(VALID_INI), None).unwrap();

        assert_eq!(outcome.result.dates().len(), 5);
        assert_eq!(outcome.result.final_positions(), vec![0.0, 0.0]);
        assert_abs_diff_eq!(outcome.summary.total_pnl, outcome.result.total_pnl(), epsilon = 1e-9);
        assert!(outcome.skipped.is_empty());
        assert!(outcome.removed_jump.is_none());

        let matrices = reports.matrices.borrow();
        assert_eq!(matrices.len(), 2);
        assert_eq!(matrices[0].0, PathBuf::from("out/pnl.csv"));
        assert_eq!(matrices[0].1, outcome.result.pnl);
        assert_eq!(matrices[1].0, PathBuf::from("out/open.csv"));
        assert_eq!(matrices[1].1, outcome.result.open_actions);

        let equity = reports.equity.borrow();
        assert_eq!(equity.len(), 1);
        assert_eq!(equity[0].1.len(), 5);
    }

    #[test]
    fn buy_and_hold_pnl_is_price_change_minus_spread() {
        let dates = weekdays(date(2016, 1, 4), 10);
        let bars = random_walk("AAPL", &dates, 100.0, 1);
        let entry = bars[5].open;
        let exit = bars[9].close;

        let ini = VALID_INI.replace("symbols = aapl,msft", "symbols = aapl");
        let outcome =
            cli::run_backtest_pipeline(&port(), &RecordingReportPort::default(), &config(&ini), None)
                .unwrap();

        assert_abs_diff_eq!(outcome.summary.total_pnl, exit - entry - 2.0 * 0.02, epsilon = 1e-5);
    }

    #[test]
    fn mean_reversion_fits_on_full_lookback() {
        let dates = weekdays(date(2016, 1, 4), 130);
        let series: Vec<(&str, Vec<OhlcvBar>)> = ["AAPL", "MSFT", "IBM", "XOM"]
            .iter()
            .zip([100.0, 55.0, 130.0, 80.0])
            .enumerate()
            .map(|(i, (s, start))| (*s, random_walk(s, &dates, start, i as u64 + 1)))
            .collect();
        let port = series
            .iter()
            .fold(MockDataPort::new(), |p, (s, bars)| p.with_bars(s, bars.clone()));

        let outcome = cli::run_backtest_pipeline(
            &port,
            &RecordingReportPort::default(),
            &config(LONG_LOOKBACK_INI),
            None,
        )
        .unwrap();

        let full = dataset_from(series);
        let expected = run_backtest(
            &full,
            &MeanReversionSignal::new(3, DegenerateFit::Fail),
            &CloseDailyPositions,
            &BacktestConfig::new(date(2016, 6, 1), date(2016, 6, 10)),
        )
        .unwrap();
        assert_eq!(outcome.result.open_actions, expected.open_actions);
        assert_eq!(outcome.result.close_actions, expected.close_actions);
    }

    #[test]
    fn skipped_symbols_are_reported() {
        let ini = VALID_INI.replace("symbols = aapl,msft", "symbols = aapl,msft,ibm");
        let outcome =
            cli::run_backtest_pipeline(&port(), &RecordingReportPort::default(), &config(&ini), None)
                .unwrap();
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].symbol, "IBM");
        assert_eq!(outcome.result.pnl.width(), 2);
    }

    #[test]
    fn remove_biggest_jump_is_applied() {
        let ini = VALID_INI.replace("decimals = 6", "remove_biggest_jump = true");
        let outcome =
            cli::run_backtest_pipeline(&port(), &RecordingReportPort::default(), &config(&ini), None)
                .unwrap();
        assert!(outcome.removed_jump.is_some());
    }

    #[test]
    fn invalid_config_stops_before_loading() {
        let ini = VALID_INI.replace("spread = 0.02", "spread = -1");
        let reports = RecordingReportPort::default();
        let err = cli::run_backtest_pipeline(&port(), &reports, &config(&ini), None)
            .err()
            .unwrap();
        assert!(matches!(err, BacktestError::ConfigInvalid { ref key, .. } if key == "spread"));
        assert!(reports.matrices.borrow().is_empty());
    }

    #[test]
    fn no_symbol_with_data() {
        let ini = VALID_INI.replace("symbols = aapl,msft", "symbols = ibm");
        let err = cli::run_backtest_pipeline(&port(), &RecordingReportPort::default(), &config(&ini), None)
            .err()
            .unwrap();
        assert!(matches!(err, BacktestError::NoData { .. }));
    }
}

mod on_disk {
    use super::*;

    fn write_symbol(dir: &Path, symbol: &str, seed: u64) {
        let dates = weekdays(date(2016, 1, 4), 10);
        let mut content = String::from("date,open,high,low,close,volume\n");
        for b in random_walk(symbol, &dates, 50.0, seed) {
            content.push_str(&format!(
                "{},{},{},{},{},{}\n",
                b.date, b.open, b.high, b.low, b.close, b.volume
            ));
        }
        fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
    }

    fn ini_for(dir: &Path) -> String {
        format!(
            "[data]\ndirectory = {data}\nsymbols = AAPL,MSFT\n\n\
             [backtest]\nstart_date = 2016-01-05\nend_date = 2016-01-15\n\
             open_signal = mimic_open\nclose_signal = close_daily_positions\n\n\
             [report]\npnl_path = {out}\nclose_actions_path = {close}\n",
            data = dir.display(),
            out = dir.join("pnl.csv").display(),
            close = dir.join("close.csv").display(),
        )
    }

    #[test]
    fn csv_in_csv_out() {
        let dir = tempfile::TempDir::new().unwrap();
        write_symbol(dir.path(), "AAPL", 1);
        write_symbol(dir.path(), "MSFT", 2);
        let ini = write_temp_ini(&ini_for(dir.path()));

        let config = FileConfigAdapter::from_file(ini.path()).unwrap();
        let data_port = CsvAdapter::new(dir.path().to_path_buf());
        let outcome = cli::run_backtest_pipeline(&data_port, &CsvReportAdapter, &config, None).unwrap();

        let pnl = fs::read_to_string(dir.path().join("pnl.csv")).unwrap();
        let lines: Vec<&str> = pnl.lines().collect();
        assert_eq!(lines[0], "date,AAPL,MSFT");
        assert_eq!(lines.len(), outcome.result.dates().len() + 1);
        assert!(lines[1].starts_with("2016-01-05,"));
        assert!(dir.path().join("close.csv").exists());
    }

    #[test]
    fn dry_run_succeeds_on_valid_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let ini = write_temp_ini(&ini_for(dir.path()));
        let cli = Cli::try_parse_from([
            "dailybt",
            "backtest",
            "-c",
            ini.path().to_str().unwrap(),
            "--dry-run",
        ])
        .unwrap();
        assert!(same_code(cli::run(cli), ExitCode::SUCCESS));
    }

    #[test]
    fn validate_reports_configuration_exit_code() {
        let ini = write_temp_ini("[backtest]\nstart_date = 2016-02-01\nend_date = 2016-01-01\n");
        let cli = Cli::try_parse_from(["dailybt", "validate", "-c", ini.path().to_str().unwrap()])
            .unwrap();
        assert!(same_code(cli::run(cli), ExitCode::from(2)));
    }

    #[test]
    fn backtest_command_end_to_end() {
        let dir = tempfile::TempDir::new().unwrap();
        write_symbol(dir.path(), "AAPL", 3);
        write_symbol(dir.path(), "MSFT", 4);
        let ini = write_temp_ini(&ini_for(dir.path()));
        let cli = Cli::try_parse_from(["dailybt", "backtest", "-c", ini.path().to_str().unwrap()])
            .unwrap();

        assert!(same_code(cli::run(cli), ExitCode::SUCCESS));
        assert!(dir.path().join("pnl.csv").exists());
    }

    #[test]
    fn missing_config_file_is_exit_code_two() {
        let cli = Cli::try_parse_from(["dailybt", "validate", "-c", "/nonexistent/dailybt.ini"])
            .unwrap();
        assert!(same_code(cli::run(cli), ExitCode::from(2)));
    }
}
