//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "envsensor")]
#[command(
    author,
    version,
    about = "Extract logged data from EnvSensor BLE sensors",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (default: <config dir>/envsensor/config.toml)
    #[arg(short, long, global = true, env = "ENVSENSOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Read new log pages from the configured devices into the database
    Sync(SyncArgs),

    /// Push stored rows that have not been forwarded yet to InfluxDB
    Forward(ForwardArgs),

    /// Change a device's measurement interval
    ///
    /// The device restarts recording at page 0 and overwrites its stored
    /// log. Sync the device first.
    SetInterval(SetIntervalArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Sync only this device (MAC address or peripheral UUID)
    #[arg(long, env = "ENVSENSOR_DEVICE")]
    pub addr: Option<String>,

    /// Read this inclusive page range instead of the planned one
    #[arg(
        long,
        num_args = 2,
        value_names = ["START", "END"],
        value_parser = clap::value_parser!(u16).range(0..=2047),
        requires = "addr"
    )]
    pub page_range: Option<Vec<u16>>,

    /// Read only: no device writes and no database writes
    #[arg(long)]
    pub dry_run: bool,

    /// Stop after the identity and clock checks
    #[arg(long)]
    pub no_scan: bool,
}

impl SyncArgs {
    pub fn page_range(&self) -> Option<(u16, u16)> {
        match self.page_range.as_deref() {
            Some([start, end]) => Some((*start, *end)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ForwardArgs {
    /// Rows per InfluxDB write (overrides config)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Skip the CREATE DATABASE request
    #[arg(long)]
    pub no_create: bool,
}

#[derive(Debug, Clone, Args)]
pub struct SetIntervalArgs {
    /// Device address (MAC address or peripheral UUID)
    #[arg(long, env = "ENVSENSOR_DEVICE")]
    pub addr: String,

    /// New measurement interval in seconds
    #[arg(value_parser = clap::value_parser!(u16).range(1..=3600))]
    pub seconds: u16,

    /// Log what would change without writing to the device
    #[arg(long)]
    pub dry_run: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_page_range_requires_addr() {
        let err = Cli::try_parse_from(["envsensor", "sync", "--page-range", "1", "5"]);
        assert!(err.is_err());

        let cli = Cli::try_parse_from([
            "envsensor",
            "sync",
            "--addr",
            "C1:2A:3B:4C:5D:6E",
            "--page-range",
            "2046",
            "1",
        ])
        .unwrap();
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.page_range(), Some((2046, 1)));
    }

    #[test]
    fn test_page_range_bounds() {
        let err = Cli::try_parse_from([
            "envsensor",
            "sync",
            "--addr",
            "C1:2A:3B:4C:5D:6E",
            "--page-range",
            "0",
            "2048",
        ]);
        assert!(err.is_err());
    }

    #[test]
    fn test_set_interval_bounds() {
        for bad in ["0", "3601"] {
            let parsed = Cli::try_parse_from([
                "envsensor",
                "set-interval",
                "--addr",
                "C1:2A:3B:4C:5D:6E",
                bad,
            ]);
            assert!(parsed.is_err(), "{bad} accepted");
        }
        let cli = Cli::try_parse_from([
            "envsensor",
            "set-interval",
            "--addr",
            "C1:2A:3B:4C:5D:6E",
            "600",
            "--dry-run",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::SetInterval(SetIntervalArgs { seconds: 600, dry_run: true, .. })
        ));
    }

    #[test]
    fn test_global_flags() {
        let cli =
            Cli::try_parse_from(["envsensor", "forward", "-v", "--config", "x.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(Cli::try_parse_from(["envsensor", "-v", "-q", "forward"]).is_err());
    }
}
