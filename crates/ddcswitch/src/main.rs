//! DdcSwitch: entry point.
//!
//! Switches the active input of a monitor by sending a DDC/CI frame through
//! the AMD Display Library.  See [`ddcswitch::cli`] for the command surface.
//!
//! # What happens at startup
//!
//! 1. CLI arguments are parsed with `clap`.
//! 2. The config file (`--config`, `DDCSWITCH_CONFIG`, or the platform
//!    default) is loaded; a missing file means defaults.
//! 3. `tracing_subscriber` is initialised.  `-v` forces debug logging,
//!    otherwise `RUST_LOG` wins over the configured `log_level`.  Logs go to
//!    stderr so `detect --json` output stays machine-readable.
//! 4. The display backend is opened: ADL, or the frame recorder with
//!    `--dry-run`.
//! 5. The subcommand runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use ddcswitch::application::switch_input::{SwitchInputUseCase, SwitchRequest};
use ddcswitch::application::worker::SwitchWorker;
use ddcswitch::cli::{
    describe_outcome, dry_run_displays, log_filter, parse_run_line, render_displays,
    render_frames, Cli, Command, RunLine,
};
use ddcswitch::infrastructure::adl::{open_dry_run, open_native, DisplayBackend};
use ddcswitch::infrastructure::storage::config::{
    config_file_path, load_config_from, save_config_to, AppConfig,
};
use ddcswitch_core::transport::mock::RecordingBlockWrite;
use ddcswitch_core::{DdcTransport, InputCode, Target};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Configuration ─────────────────────────────────────────────────────────
    let config_path = resolve_config_path(cli.config.clone());
    let loaded = match &config_path {
        Some(path) => load_config_from(path),
        None => Ok(AppConfig::default()),
    };

    // ── Logging setup ─────────────────────────────────────────────────────────
    let configured_level = loaded
        .as_ref()
        .map(|cfg| cfg.general.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose, &configured_level))
        .with_writer(std::io::stderr)
        .init();

    if config_path.is_none() {
        warn!("could not determine the platform config directory; using defaults");
    }

    // `config --init` must work even when the existing file is broken.
    if let Command::Config { init: true, force } = cli.command {
        let path = config_path.context("no config path; pass --config <PATH>")?;
        return init_config(&path, force);
    }

    let mut config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            let shown = config_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(e).with_context(|| format!("failed to load config {shown}"));
        }
    };

    if let Command::Config { .. } = cli.command {
        config.validate()?;
        if let Some(path) = &config_path {
            println!("# {}", path.display());
        }
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    apply_settle_override(&mut config, cli.settle_ms);
    let settle = config.settle_policy();

    let (backend, recorder) = open_backend(cli.dry_run, &config)?;

    match cli.command {
        Command::Detect { json } => {
            let displays = backend.enumerator.enumerate()?;
            print!("{}", render_displays(&displays, json)?);
        }
        Command::Setvcp {
            adapter,
            display,
            input,
            i2c_source_addr,
        } => {
            let transport = DdcTransport::new(backend.block_write, settle);
            let target = Target::new(adapter, display);
            info!("setvcp {target}: input 0x{input:02X}, sub-address 0x{i2c_source_addr:02X}");
            tokio::task::spawn_blocking(move || {
                transport.switch_input(target, i2c_source_addr, InputCode(input))
            })
            .await
            .context("switch task panicked")?
            .with_context(|| format!("failed to switch {target} to 0x{input:02X}"))?;
            println!("switched {target} to 0x{input:02X}");
        }
        Command::Switch { label } => {
            config.validate()?;
            let transport = Arc::new(DdcTransport::new(backend.block_write, settle));
            let mut use_case = SwitchInputUseCase::new(transport, config.switch_settings()?);
            let outcome = tokio::task::spawn_blocking(move || {
                use_case.handle(SwitchRequest::direct(label))
            })
            .await
            .context("switch task panicked")?
            .context("request was debounced")?;
            println!("{}", describe_outcome(&outcome));
            outcome.result?;
        }
        Command::Run => {
            config.validate()?;
            let transport = Arc::new(DdcTransport::new(backend.block_write, settle));
            let use_case = SwitchInputUseCase::new(transport, config.switch_settings()?);
            run_requests(use_case, config_path.as_deref(), cli.settle_ms).await?;
        }
        // Handled before the backend is opened.
        Command::Config { .. } => {}
    }

    if let Some(recorder) = recorder {
        print!("{}", render_frames(&recorder.writes()));
    }
    Ok(())
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Option<PathBuf> {
    explicit.or_else(|| config_file_path().ok())
}

fn open_backend(
    dry_run: bool,
    config: &AppConfig,
) -> anyhow::Result<(DisplayBackend, Option<Arc<RecordingBlockWrite>>)> {
    if dry_run {
        info!("dry run: frames are recorded, not sent");
        let (backend, recorder) = open_dry_run(dry_run_displays(config));
        return Ok((backend, Some(recorder)));
    }
    let backend = open_native().context("cannot open the display driver (try --dry-run)")?;
    Ok((backend, None))
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    save_config_to(path, &AppConfig::default())?;
    println!("wrote default config to {}", path.display());
    Ok(())
}

/// Feeds stdin requests to a [`SwitchWorker`] and prints each outcome.
async fn run_requests(
    use_case: SwitchInputUseCase,
    config_path: Option<&Path>,
    settle_ms: Option<u64>,
) -> anyhow::Result<()> {
    let (mut handle, task) = SwitchWorker::spawn(use_case);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("reading requests from stdin (cycle, <label>, cancel, reload, quit)");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    debug!("stdin closed");
                    break;
                };
                match parse_run_line(&line) {
                    None => {}
                    Some(RunLine::Quit) => break,
                    Some(RunLine::Cycle) => handle.submit(SwitchRequest::cycle_next()).await?,
                    Some(RunLine::Select(label)) => handle.submit(SwitchRequest::direct(label)).await?,
                    Some(RunLine::Cancel) => handle.cancel_settle(),
                    Some(RunLine::Reload) => match reload_settings(config_path, settle_ms) {
                        Ok(settings) => handle.reconfigure(settings).await?,
                        Err(e) => warn!("reload failed, keeping current settings: {e:#}"),
                    },
                }
            }
            Some(outcome) = handle.recv_outcome() => {
                println!("{}", describe_outcome(&outcome));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C; finishing pending switches");
                break;
            }
        }
    }

    let mut remaining = handle.shutdown();
    while let Some(outcome) = remaining.recv().await {
        println!("{}", describe_outcome(&outcome));
    }
    task.await.context("switch worker panicked")?;
    Ok(())
}

/// `--settle-ms` wins over `ddc.settle_ms`, at startup and on every reload.
fn apply_settle_override(config: &mut AppConfig, settle_ms: Option<u64>) {
    if let Some(ms) = settle_ms {
        config.ddc.settle_ms = ms;
    }
}

fn reload_settings(
    config_path: Option<&Path>,
    settle_ms: Option<u64>,
) -> anyhow::Result<ddcswitch::application::switch_input::SwitchSettings> {
    let path = config_path.context("no config path to reload from")?;
    let mut config = load_config_from(path)?;
    config.validate()?;
    apply_settle_override(&mut config, settle_ms);
    Ok(config.switch_settings()?)
}
