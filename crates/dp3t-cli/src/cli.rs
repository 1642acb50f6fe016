use clap::{Parser, Subcommand};

/// Inspect and erase the secure records of a local DP3T installation.
#[derive(Parser, Debug)]
#[command(
    name = "dp3t-store",
    about = "Inspect and erase DP3T secure records",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Optional subcommand; defaults to `status` when absent.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Report which records are present, absent, locked or corrupt.
    Status,
    /// Erase every record (stop tracing / opt-out).
    Clear {
        /// Confirm the erasure.
        #[arg(long)]
        yes: bool,
    },
    /// Round-trip a probe value through the configured backend.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version and exit.
    Version,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_status_when_missing_subcommand() {
        let cli = Cli::try_parse_from(["dp3t-store"]).expect("parse should succeed");
        assert_eq!(cli.command, None);
    }

    #[test]
    fn clear_requires_explicit_flag_to_confirm() {
        let cli = Cli::try_parse_from(["dp3t-store", "clear"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Clear { yes: false }));

        let cli =
            Cli::try_parse_from(["dp3t-store", "clear", "--yes"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Clear { yes: true }));
    }

    #[test]
    fn parses_health_subcommand() {
        let cli = Cli::try_parse_from(["dp3t-store", "health"]).expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Health));
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli = Cli::try_parse_from(["dp3t-store", "config", "init"])
            .expect("parse should succeed");
        assert_eq!(cli.command, Some(Command::Config(ConfigCommand::Init)));
    }
}
