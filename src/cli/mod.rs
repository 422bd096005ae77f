use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::directory::CimDirectory;
use crate::engine::{Engine, EngineOptions};
use crate::health::HealthPolicy;
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "audiodiag",
    version,
    about = "Checks audio devices and their drivers, and reports problems and outdated drivers"
)]
pub struct Cli {
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Seconds to wait for each device or driver query
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
    #[arg(long = "no-color")]
    pub no_color: bool,
    /// Exit without waiting for a keypress
    #[arg(long = "no-pause")]
    pub no_pause: bool,
    #[arg(long)]
    pub verbose: bool,
}

/// Runs the diagnosis. Errors are printed, never turned into a failing exit status.
pub fn run() {
    let interactive = io::stdin().is_terminal() && io::stdout().is_terminal();

    // Usage errors, --help and --version print and still leave through the exit prompt.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            if interactive {
                crate::ui::wait_for_keypress();
            }
            return;
        }
    };
    init_tracing(cli.verbose);

    let mut pause_on_exit = true;

    if let Err(err) = execute(&cli, &mut pause_on_exit) {
        crate::ui::eprintln_error(&err);
    }

    if interactive && pause_on_exit && !cli.no_pause {
        crate::ui::wait_for_keypress();
    }
}

fn execute(cli: &Cli, pause_on_exit: &mut bool) -> Result<()> {
    let home_dir = crate::platform::effective_home_dir().ok();
    let env_config_path = std::env::var_os("AUDIODIAG_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        home_dir.as_deref(),
    )?;
    *pause_on_exit = cfg.ui.pause_on_exit;
    if let Some(path) = &cfg.config_path {
        debug!(path = %path, "loaded config");
    }

    let timeout = Duration::from_secs(cli.timeout);
    let ui_cfg = UiConfig {
        color: io::stdout().is_terminal() && cfg.ui.color && !cli.no_color,
        verbose: cli.verbose,
    };

    let directory = CimDirectory::new(cfg.source.powershell.clone(), timeout);
    let engine = Engine::new(
        EngineOptions {
            timeout,
            show_progress: !cli.verbose,
            device_classes: cfg.scan.device_classes.clone(),
            name_keywords: cfg.scan.name_keywords.clone(),
            policy: HealthPolicy {
                stale_after_days: cfg.drivers.stale_after_days,
            },
        },
        Box::new(directory),
    );

    let report = engine.diagnose()?;
    crate::ui::print_report(&report, &ui_cfg);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "audiodiag=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("AUDIODIAG_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .try_init();
}
