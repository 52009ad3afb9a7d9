mod app;
mod config;
mod engine;
mod input;
mod logging;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use app::App;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use wattop_sources::{PowerSource, RaplPower, SysinfoUtilization, UtilizationSource};

use config::{config_path, LogLevel, UserConfig};
use engine::{
    shared, AccumulatedStateStore, AttributionEngine, EngineCommand, StoreReader,
};
use logging::LogMode;

/// How long to wait for the key event poll between redraws.
const REDRAW_POLL: Duration = Duration::from_millis(250);

/// Grace period for the engine to flush and exit after Shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Subcommand)]
enum Commands {
    /// Launch the TUI interface (default)
    #[command(alias = "tui")]
    Ui {
        /// Sampling interval in seconds (1-60)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Append per-tick samples to a CSV file
        #[arg(long)]
        csv_log: Option<PathBuf>,
    },

    /// Output ranked snapshots in JSON format (suitable for piping)
    #[command(alias = "raw")]
    Pipe {
        /// Number of snapshots to output (0 = infinite)
        #[arg(short, long, default_value_t = 0)]
        samples: u32,

        /// Sampling interval in seconds (1-60)
        #[arg(short, long)]
        interval: Option<u64>,

        /// Compact JSON output (one line per snapshot)
        #[arg(short, long)]
        compact: bool,
    },

    /// Print debug information about power sources and sensors
    Debug,

    /// Show or edit configuration
    Config {
        /// Print config file path
        #[arg(long)]
        path: bool,

        /// Reset config to defaults
        #[arg(long)]
        reset: bool,

        /// Open config file in $EDITOR
        #[arg(short, long)]
        edit: bool,
    },
}

/// Per-process power attribution monitor for Linux
#[derive(Debug, Parser)]
#[command(name = "wattop", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Sampling interval in seconds (for default TUI mode)
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    /// Append per-tick samples to a CSV file (for default TUI mode)
    #[arg(long, global = true)]
    csv_log: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = UserConfig::load();
    let log_level_override = cli.log_level.as_deref().map(LogLevel::from_str);

    match cli.command {
        Some(Commands::Pipe {
            samples,
            interval,
            compact,
        }) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            let mut config = config;
            config.merge_with_args(interval, None);
            run_pipe(config, samples, compact)
        }
        Some(Commands::Debug) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            run_debug()
        }
        Some(Commands::Config { path, reset, edit }) => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            run_config(path, reset, edit)
        }
        Some(Commands::Ui { interval, csv_log }) => {
            let _guard = logging::init(config.log_level, LogMode::File, log_level_override);
            let mut config = config;
            config.merge_with_args(interval, csv_log);
            run_tui(config)
        }
        None => {
            let _guard = logging::init(config.log_level, LogMode::File, log_level_override);
            let mut config = config;
            config.merge_with_args(cli.interval, cli.csv_log);
            run_tui(config)
        }
    }
}

/// Probe both backends up front so a missing sensor fails the launch with a
/// readable message instead of an empty screen.
fn build_sources() -> Result<(Box<dyn PowerSource>, Box<dyn UtilizationSource>)> {
    let power = RaplPower::new().map_err(|e| {
        let hint = if RaplPower::is_supported() {
            "energy_uj counters are usually root-readable only; try sudo"
        } else {
            "is the intel_rapl (or intel_rapl_common) kernel module loaded?"
        };
        eyre!("power source unavailable ({hint}): {e}")
    })?;

    let utilization =
        SysinfoUtilization::new().map_err(|e| eyre!("utilization source unavailable: {e}"))?;

    Ok((Box::new(power), Box::new(utilization)))
}

struct EngineRuntime {
    runtime: tokio::runtime::Runtime,
    engine_task: tokio::task::JoinHandle<()>,
    commands: mpsc::Sender<EngineCommand>,
    reader: StoreReader,
}

/// Stand the store and engine up on a fresh runtime. The engine runs on the
/// runtime's workers; the caller's thread stays free for the terminal.
fn start_engine(config: &UserConfig) -> Result<EngineRuntime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .wrap_err("failed to start async runtime")?;

    let (power, utilization) = build_sources()?;
    let settings = config.engine_settings();

    let store = shared(AccumulatedStateStore::new(
        settings.interval_secs,
        config.history_capacity,
    ));
    let reader = StoreReader::new(store.clone());

    let (commands, command_rx) = mpsc::channel(16);

    let engine = AttributionEngine::new(power, utilization, store, settings);
    let engine_task = runtime.spawn(engine.run(command_rx));

    Ok(EngineRuntime {
        runtime,
        engine_task,
        commands,
        reader,
    })
}

impl EngineRuntime {
    /// Ask the engine to stop and wait for it to flush.
    fn shutdown(self) -> Result<()> {
        let _ = self.commands.blocking_send(EngineCommand::Shutdown);
        self.runtime
            .block_on(async {
                tokio::time::timeout(SHUTDOWN_GRACE, self.engine_task).await
            })
            .wrap_err("engine did not stop within the shutdown grace period")?
            .wrap_err("engine task panicked")?;
        Ok(())
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_tui(config: UserConfig) -> Result<()> {
    let engine = start_engine(&config)?;

    let mut terminal = setup_terminal()?;
    let result = run_tui_loop(&mut terminal, &engine, &config);
    restore_terminal(&mut terminal)?;

    engine.shutdown()?;
    result
}

fn run_tui_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    engine: &EngineRuntime,
    config: &UserConfig,
) -> Result<()> {
    let mut app = App::new(engine.reader.clone(), engine.commands.clone(), config);

    loop {
        app.refresh();
        terminal.draw(|frame| ui::render(frame, &mut app))?;

        if event::poll(REDRAW_POLL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let action = input::handle_key(&app, key);
                    if !app.handle_action(action) {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn run_pipe(config: UserConfig, samples: u32, compact: bool) -> Result<()> {
    use serde_json::json;

    let engine = start_engine(&config)?;
    let interval = Duration::from_secs(config.engine_settings().interval_secs);
    let mut counter = 0u32;

    loop {
        std::thread::sleep(interval);

        let session = engine.reader.session();
        let summary = session.last_summary;

        let top_processes: Vec<_> = engine
            .reader
            .snapshot()
            .into_iter()
            .take(config.process_count)
            .map(|r| {
                json!({
                    "name": r.name,
                    "cpu_percent": r.last_cpu_percent,
                    "power_w": r.last_power_mw / 1000.0,
                    "cpu_energy_mj": r.cpu_energy_mj,
                    "system_energy_mj": r.system_energy_mj,
                })
            })
            .collect();

        let doc = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "power": {
                "package_w": summary.and_then(|s| s.package_power_mw).map(|mw| mw / 1000.0),
                "system_w": summary.and_then(|s| s.system_power_mw).map(|mw| mw / 1000.0),
            },
            "total_cpu_percent": summary.map(|s| s.total_cpu_percent),
            "degraded": summary.map(|s| s.degraded),
            "ticks": session.tick_count,
            "top_processes": top_processes,
        });

        if compact {
            println!("{}", serde_json::to_string(&doc)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }

        counter += 1;
        if samples > 0 && counter >= samples {
            break;
        }
    }

    engine.shutdown()
}

fn run_debug() -> Result<()> {
    println!("wattop debug information");
    println!("{}", "=".repeat(60));

    println!("\n--- Power Source (RAPL) ---");
    println!("powercap tree present: {}", RaplPower::is_supported());
    match RaplPower::new() {
        Ok(mut rapl) => {
            println!("Domains: {}", rapl.domain_names().join(", "));

            // Two reads a moment apart, since power is a counter delta.
            let _ = rapl.read();
            std::thread::sleep(Duration::from_millis(500));
            match rapl.read() {
                Ok(sample) => {
                    println!("Package: {}", ui::format_power_mw(sample.package_mw));
                    println!("System:  {}", ui::format_power_mw(sample.system_mw));
                }
                Err(e) => println!("Read failed: {e}"),
            }
        }
        Err(e) => println!("Unavailable: {e}"),
    }

    println!("\n--- Utilization Source (sysinfo) ---");
    match SysinfoUtilization::new() {
        Ok(mut source) => {
            std::thread::sleep(Duration::from_millis(500));
            match source.read() {
                Ok(sample) => {
                    println!("Total CPU: {:.1}%", sample.total_percent);
                    println!("Processes with CPU time: {}", sample.per_process.len());
                }
                Err(e) => println!("Read failed: {e}"),
            }
        }
        Err(e) => println!("Unavailable: {e}"),
    }

    println!("\n--- Config Paths ---");
    println!("Config: {}", config_path().display());
    println!("Logs:   {}", config::runtime_dir().display());

    println!("\n--- Current Config ---");
    let config = UserConfig::load();
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}

fn run_config(path: bool, reset: bool, edit: bool) -> Result<()> {
    let config_file = config_path();

    if path {
        println!("{}", config_file.display());
        return Ok(());
    }

    if reset {
        let config = UserConfig::default();
        config.save()?;
        println!("Config reset to defaults at: {}", config_file.display());
        return Ok(());
    }

    if edit {
        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "nano".to_string());

        if !config_file.exists() {
            let config = UserConfig::default();
            config.save()?;
        }

        std::process::Command::new(editor)
            .arg(&config_file)
            .status()?;

        return Ok(());
    }

    let config = UserConfig::load();
    println!("Config file: {}", config_file.display());
    println!();
    println!("{}", toml::to_string_pretty(&config)?);

    Ok(())
}
