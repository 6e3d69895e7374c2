//! Command-line surface: argument definitions and output formatting.
//!
//! `main.rs` owns the runtime and dispatch; everything here is plain data and
//! string building so it can be tested without touching a monitor.
//!
//! # Usage
//!
//! ```text
//! ddcswitch [--config <PATH>] [--settle-ms <MS>] [--dry-run] [-v] <COMMAND>
//!
//! Commands:
//!   detect   [--json]                         List connected AMD displays
//!   setvcp   <ADAPTER> <DISPLAY> <INPUT>      Send one input-switch frame
//!            [--i2c-source-addr <HEX>]        (INPUT and address in hex)
//!   switch   <LABEL>                          Switch the configured monitor
//!   run                                       Read requests from stdin
//!   config   [--init [--force]]               Show or create the config file
//! ```
//!
//! # `run` requests
//!
//! One request per line on stdin:
//!
//! | Line        | Effect                                              |
//! |-------------|-----------------------------------------------------|
//! | `cycle`     | Switch to the next input in cycle order             |
//! | `<label>`   | Switch directly to the input with that label        |
//! | `cancel`    | Cut short the settle wait in progress               |
//! | `reload`    | Re-read the config file and apply it                |
//! | `quit`      | Finish pending switches and exit                    |

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ddcswitch_core::{CommandFrame, Target};
use tracing_subscriber::EnvFilter;

use crate::application::switch_input::{SwitchKind, SwitchOutcome};
use crate::infrastructure::adl::DisplayTarget;
use crate::infrastructure::storage::config::AppConfig;

/// Sub-address used by `setvcp` when `--i2c-source-addr` is not given.
pub const SETVCP_DEFAULT_SUBADDRESS: u8 = 0x51;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Switch monitor inputs over DDC/CI.
#[derive(Debug, Parser)]
#[command(
    name = "ddcswitch",
    about = "Switch monitor inputs over DDC/CI through the AMD Display Library",
    version
)]
pub struct Cli {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true, env = "DDCSWITCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the settle interval after each switch, in milliseconds.
    #[arg(long, global = true)]
    pub settle_ms: Option<u64>,

    /// Record frames and print them instead of calling the display driver.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Log at debug level.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List connected and mapped displays with their adapter indices.
    Detect {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Send one input-switch frame to an explicit adapter and display.
    Setvcp {
        adapter: i32,
        display: i32,
        /// Input code in hex, e.g. `D1` or `0xD1`.
        #[arg(value_parser = parse_hex_u16)]
        input: u16,
        /// DDC/CI sub-address in hex (`51` standard, `50` for LG).
        #[arg(long, value_parser = parse_hex_u8, default_value = "0x51")]
        i2c_source_addr: u8,
    },

    /// Switch the configured monitor to the input with this label.
    Switch { label: String },

    /// Process `cycle` / `<label>` / `cancel` / `reload` / `quit` lines from stdin.
    Run,

    /// Print the active configuration, or write a default one.
    Config {
        /// Write the default configuration to the config path.
        #[arg(long)]
        init: bool,
        /// With `--init`, overwrite an existing file.
        #[arg(long, requires = "init")]
        force: bool,
    },
}

// ── Argument parsers ──────────────────────────────────────────────────────────

fn parse_hex(text: &str) -> Result<u64, String> {
    let digits = text
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X");
    if digits.is_empty() {
        return Err(format!("{text:?} is not a hex number"));
    }
    u64::from_str_radix(digits, 16).map_err(|_| format!("{text:?} is not a hex number"))
}

/// Parses a hex byte with or without a `0x` prefix.
pub fn parse_hex_u8(text: &str) -> Result<u8, String> {
    let value = parse_hex(text)?;
    u8::try_from(value).map_err(|_| format!("{text:?} does not fit in one byte"))
}

/// Parses a hex 16-bit value with or without a `0x` prefix.
pub fn parse_hex_u16(text: &str) -> Result<u16, String> {
    let value = parse_hex(text)?;
    u16::try_from(value).map_err(|_| format!("{text:?} does not fit in 16 bits"))
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Chooses the log filter: `-v` forces `debug`, otherwise `RUST_LOG` wins over
/// the configured level.  An unparsable level falls back to `info`.
pub fn log_filter(verbose: bool, configured: &str) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

// ── `run` request lines ───────────────────────────────────────────────────────

/// One parsed line of `run` input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunLine {
    Cycle,
    Select(String),
    Cancel,
    Reload,
    Quit,
}

/// Parses a `run` line.  Blank lines and `#` comments yield `None`.
///
/// Keywords are case-insensitive; anything else is taken as an input label
/// verbatim (after trimming).
pub fn parse_run_line(line: &str) -> Option<RunLine> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let parsed = match line.to_ascii_lowercase().as_str() {
        "cycle" | "next" => RunLine::Cycle,
        "cancel" => RunLine::Cancel,
        "reload" => RunLine::Reload,
        "quit" | "exit" => RunLine::Quit,
        _ => RunLine::Select(line.to_owned()),
    };
    Some(parsed)
}

// ── Output formatting ─────────────────────────────────────────────────────────

/// Renders `detect` output.
///
/// # Errors
///
/// Returns the `serde_json` error if JSON encoding fails.
pub fn render_displays(displays: &[DisplayTarget], json: bool) -> Result<String, serde_json::Error> {
    if json {
        let mut out = serde_json::to_string_pretty(displays)?;
        out.push('\n');
        return Ok(out);
    }

    if displays.is_empty() {
        return Ok("no connected displays found\n".to_string());
    }

    let mut out = String::new();
    for d in displays {
        let _ = writeln!(
            out,
            "adapter {} ({}): display {} {} [{}]",
            d.adapter_index, d.adapter_name, d.display_index, d.display_name, d.manufacturer
        );
    }
    Ok(out)
}

/// Renders recorded frames as `target: 6E 50 ...` lines.
pub fn render_frames(writes: &[(Target, Vec<u8>)]) -> String {
    let mut out = String::new();
    for (target, bytes) in writes {
        let _ = match CommandFrame::parse(bytes) {
            Ok(frame) => writeln!(out, "{target}: {frame}"),
            Err(e) => writeln!(out, "{target}: {bytes:02X?} ({e})"),
        };
    }
    out
}

/// One-line summary of a switch outcome.
pub fn describe_outcome(outcome: &SwitchOutcome) -> String {
    let requested = match &outcome.kind {
        SwitchKind::Direct(label) => label.clone(),
        SwitchKind::CycleNext => "next input".to_string(),
    };
    match (&outcome.input, &outcome.result) {
        (Some(input), Ok(())) => format!("switched to {} ({})", input.label, input.code),
        (Some(input), Err(e)) => format!("switch to {} ({}) failed: {e}", input.label, input.code),
        (None, Err(e)) => format!("cannot switch to {requested}: {e}"),
        (None, Ok(())) => format!("switched to {requested}"),
    }
}

/// Displays reported by `detect --dry-run`: one entry per configured target.
pub fn dry_run_displays(config: &AppConfig) -> Vec<DisplayTarget> {
    config
        .targets
        .iter()
        .map(|t| DisplayTarget {
            adapter_index: t.adapter,
            adapter_name: "dry run".to_string(),
            display_index: t.display,
            display_name: "configured target".to_string(),
            manufacturer: String::new(),
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::switch_input::SelectionError;
    use ddcswitch_core::InputDefinition;

    #[test]
    fn test_setvcp_parses_hex_input_and_default_subaddress() {
        // Arrange / Act
        let cli = Cli::parse_from(["ddcswitch", "setvcp", "5", "0", "d1"]);

        // Assert
        match cli.command {
            Command::Setvcp {
                adapter,
                display,
                input,
                i2c_source_addr,
            } => {
                assert_eq!((adapter, display), (5, 0));
                assert_eq!(input, 0xD1);
                assert_eq!(i2c_source_addr, SETVCP_DEFAULT_SUBADDRESS);
            }
            other => panic!("expected setvcp, got {other:?}"),
        }
    }

    #[test]
    fn test_setvcp_accepts_prefixed_subaddress() {
        let cli = Cli::parse_from([
            "ddcswitch",
            "setvcp",
            "1",
            "2",
            "0x90",
            "--i2c-source-addr",
            "0x50",
        ]);
        assert!(matches!(
            cli.command,
            Command::Setvcp { input: 0x90, i2c_source_addr: 0x50, .. }
        ));
    }

    #[test]
    fn test_setvcp_rejects_non_hex_input() {
        let result = Cli::try_parse_from(["ddcswitch", "setvcp", "1", "0", "HDMI"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["ddcswitch", "switch", "HDMI1", "--dry-run", "--settle-ms", "0"]);

        assert!(cli.dry_run);
        assert_eq!(cli.settle_ms, Some(0));
        assert!(matches!(cli.command, Command::Switch { label } if label == "HDMI1"));
    }

    #[test]
    fn test_config_force_requires_init() {
        assert!(Cli::try_parse_from(["ddcswitch", "config", "--force"]).is_err());
        assert!(Cli::try_parse_from(["ddcswitch", "config", "--init", "--force"]).is_ok());
    }

    #[test]
    fn test_parse_hex_bounds() {
        assert_eq!(parse_hex_u8("ff"), Ok(0xFF));
        assert!(parse_hex_u8("100").is_err());
        assert_eq!(parse_hex_u16("0XFFFF"), Ok(0xFFFF));
        assert!(parse_hex_u16("0x").is_err());
    }

    #[test]
    fn test_parse_run_line_keywords_and_labels() {
        assert_eq!(parse_run_line("  CYCLE "), Some(RunLine::Cycle));
        assert_eq!(parse_run_line("quit"), Some(RunLine::Quit));
        assert_eq!(parse_run_line("reload"), Some(RunLine::Reload));
        assert_eq!(parse_run_line("cancel"), Some(RunLine::Cancel));
        assert_eq!(parse_run_line("USB-C"), Some(RunLine::Select("USB-C".into())));
        assert_eq!(parse_run_line(""), None);
        assert_eq!(parse_run_line("# comment"), None);
    }

    #[test]
    fn test_render_frames_shows_target_and_bytes() {
        let frame = CommandFrame::switch_input(0x50, 0xD1);
        let writes = vec![(Target::new(5, 0), frame.as_bytes().to_vec())];

        assert_eq!(render_frames(&writes), "5:0: 6E 50 84 03 F4 D1 00 9C\n");
    }

    #[test]
    fn test_render_displays_text_and_json() {
        // Arrange
        let displays = vec![DisplayTarget {
            adapter_index: 5,
            adapter_name: "AMD Radeon".into(),
            display_index: 0,
            display_name: "LG ULTRAGEAR".into(),
            manufacturer: "GSM".into(),
        }];

        // Act
        let text = render_displays(&displays, false).unwrap();
        let json = render_displays(&displays, true).unwrap();

        // Assert
        assert_eq!(text, "adapter 5 (AMD Radeon): display 0 LG ULTRAGEAR [GSM]\n");
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed[0]["adapter_index"], 5);
        assert_eq!(parsed[0]["display_name"], "LG ULTRAGEAR");
    }

    #[test]
    fn test_render_displays_empty_list() {
        assert_eq!(render_displays(&[], false).unwrap(), "no connected displays found\n");
        assert_eq!(render_displays(&[], true).unwrap(), "[]\n");
    }

    #[test]
    fn test_describe_outcome_variants() {
        let ok = SwitchOutcome {
            kind: SwitchKind::CycleNext,
            index: Some(2),
            input: Some(InputDefinition::new("HDMI1", 0x90)),
            result: Ok(()),
        };
        let unknown = SwitchOutcome {
            kind: SwitchKind::Direct("VGA".into()),
            index: None,
            input: None,
            result: Err(SelectionError::UnknownInput("VGA".into())),
        };

        assert_eq!(describe_outcome(&ok), "switched to HDMI1 (0x90)");
        assert_eq!(
            describe_outcome(&unknown),
            "cannot switch to VGA: unknown input label: VGA"
        );
    }

    #[test]
    fn test_dry_run_displays_follow_config_targets() {
        let displays = dry_run_displays(&AppConfig::default());

        assert_eq!(displays.len(), 1);
        assert_eq!(displays[0].target(), Target::new(5, 0));
    }
}
