//! mira CLI: command-line control for Boox Mira e-ink monitors.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use mira_core::codec::{AutoDitherProfile, RefreshMode};
use mira_core::session::Session;
use mira_core::settings::{load_settings, Settings};
use mira_core::{discovery, MIRA_PID, MIRA_VID};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "mira",
    version,
    about = "Control Boox Mira e-ink monitors"
)]
struct Cli {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    /// USB vendor ID of the device to open (hex with 0x prefix, or decimal).
    #[arg(long, global = true, value_parser = parse_id, default_value = "0x0416")]
    vid: u16,

    /// USB product ID of the device to open (hex with 0x prefix, or decimal).
    #[arg(long, global = true, value_parser = parse_id, default_value = "0x5020")]
    pid: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh the screen.
    Refresh,
    /// Anti-shake automatically (auto-dither high).
    Antishake,
    /// Set the auto-dither profile (disable, low, middle, high).
    AutoDither {
        /// Profile name.
        profile: AutoDitherProfile,
    },
    /// Apply settings.
    Settings(SettingsArgs),
    /// List connected HID devices.
    List {
        /// List every HID device, not only those matching --vid/--pid.
        #[arg(long)]
        all: bool,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SettingsArgs {
    /// The refresh mode (a2, direct, gray).
    #[arg(long)]
    refresh_mode: Option<RefreshMode>,
    /// The refresh speed (1-7).
    #[arg(long, allow_negative_numbers = true)]
    speed: Option<i32>,
    /// The contrast (0-15).
    #[arg(long, allow_negative_numbers = true)]
    contrast: Option<i32>,
    /// The dither mode (0-3).
    #[arg(long, allow_negative_numbers = true)]
    dither_mode: Option<i32>,
    /// The white filter level (0-254).
    #[arg(long, allow_negative_numbers = true)]
    white_filter: Option<i32>,
    /// The black filter level (0-254).
    #[arg(long, allow_negative_numbers = true)]
    black_filter: Option<i32>,
    /// The cold backlight level (0-254).
    #[arg(long, allow_negative_numbers = true)]
    cold_light: Option<i32>,
    /// The warm backlight level (0-254).
    #[arg(long, allow_negative_numbers = true)]
    warm_light: Option<i32>,
    /// JSON settings file; flags given on the command line override it.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl SettingsArgs {
    fn resolve(self) -> Result<Settings> {
        let flags = Settings {
            refresh_mode: self.refresh_mode,
            speed: self.speed,
            contrast: self.contrast,
            dither_mode: self.dither_mode,
            white_filter: self.white_filter,
            black_filter: self.black_filter,
            cold_light: self.cold_light,
            warm_light: self.warm_light,
        };
        let settings = match self.config {
            Some(path) => load_settings(&path)?.merge(flags),
            None => flags,
        };
        settings.validate()?;
        Ok(settings)
    }
}

fn parse_id(s: &str) -> std::result::Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid USB ID '{s}': {e}"))
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Open the device, run `op`, and always close the session afterwards.
fn with_session(vid: u16, pid: u16, op: impl FnOnce(&mut Session) -> Result<()>) -> Result<()> {
    let mut session = discovery::open_first_matching(vid, pid)
        .with_context(|| format!("open Mira device (VID=0x{vid:04X} PID=0x{pid:04X})"))?;
    let result = op(&mut session);
    let closed = session.close().context("close device");
    result.and(closed)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    debug!("Debug mode enabled");

    match cli.command {
        Commands::Refresh => with_session(cli.vid, cli.pid, |s| Ok(s.refresh()?))?,
        Commands::Antishake => with_session(cli.vid, cli.pid, |s| {
            Ok(s.set_auto_dither_profile(AutoDitherProfile::HIGH)?)
        })?,
        Commands::AutoDither { profile } => {
            with_session(cli.vid, cli.pid, |s| Ok(s.set_auto_dither_profile(profile)?))?;
            println!("Auto-dither set to {profile}");
        }
        Commands::Settings(args) => {
            // Validate before touching the device.
            let settings = args.resolve()?;
            if settings.is_empty() {
                println!("No settings given; nothing to apply.");
                return Ok(());
            }
            with_session(cli.vid, cli.pid, |s| {
                let sent = s.apply(&settings)?;
                debug!(sent, "Settings applied");
                Ok(())
            })?;
        }
        Commands::List { all, json } => {
            let devices = if all {
                discovery::list_devices()?
            } else {
                discovery::list_matching(cli.vid, cli.pid)?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                if cli.vid == MIRA_VID && cli.pid == MIRA_PID && !all {
                    println!("No Mira monitors found.");
                    println!("Ensure the monitor is connected and you have access to its hidraw node.");
                } else {
                    println!("No matching HID devices found.");
                }
            } else {
                for dev in &devices {
                    println!("{dev}");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_hex_and_decimal() {
        assert_eq!(parse_id("0x0416").unwrap(), 0x0416);
        assert_eq!(parse_id("0X5020").unwrap(), 0x5020);
        assert_eq!(parse_id("1046").unwrap(), 0x0416);
        assert!(parse_id("0xZZ").is_err());
        assert!(parse_id("70000").is_err());
    }

    #[test]
    fn cli_defaults_to_mira_ids() {
        let cli = Cli::try_parse_from(["mira", "refresh"]).unwrap();
        assert_eq!(cli.vid, MIRA_VID);
        assert_eq!(cli.pid, MIRA_PID);
        assert!(!cli.debug);
    }

    #[test]
    fn settings_flags_resolve() {
        let cli = Cli::try_parse_from([
            "mira",
            "settings",
            "--refresh-mode",
            "gray",
            "--speed",
            "5",
            "--black-filter",
            "12",
        ])
        .unwrap();
        let Commands::Settings(args) = cli.command else {
            panic!("expected settings command");
        };
        let settings = args.resolve().unwrap();
        assert_eq!(settings.refresh_mode, Some(RefreshMode::GrayUpdate));
        assert_eq!(settings.speed, Some(5));
        assert_eq!(settings.black_filter, Some(12));
        assert_eq!(settings.white_filter, None);
    }

    #[test]
    fn settings_out_of_range_fails_before_open() {
        let cli = Cli::try_parse_from(["mira", "settings", "--contrast", "-1"]).unwrap();
        let Commands::Settings(args) = cli.command else {
            panic!("expected settings command");
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn unknown_refresh_mode_is_rejected_by_parser() {
        assert!(Cli::try_parse_from(["mira", "settings", "--refresh-mode", "fast"]).is_err());
    }

    #[test]
    fn auto_dither_parses_preset() {
        let cli = Cli::try_parse_from(["mira", "auto-dither", "middle"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::AutoDither { profile } if profile == AutoDitherProfile::MIDDLE
        ));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["mira", "list", "--all", "--json", "--vid", "0x046d"]).unwrap();
        assert_eq!(cli.vid, 0x046D);
        assert!(matches!(cli.command, Commands::List { all: true, json: true }));
    }
}
