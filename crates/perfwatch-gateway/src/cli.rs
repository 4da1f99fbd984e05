//! Command line interface.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "perfwatch-gateway")]
#[command(about = "HTTP gateway with access logging and on-demand request profiling")]
#[command(version)]
pub struct Cli {
    /// Path to the YAML config
    #[arg(short, long, default_value = "perfwatch.yaml", env = "PERFWATCH_CONFIG", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Hold the profiling lock token so running servers record request metrics
    Profile {
        /// How long to keep profiling
        #[arg(long, default_value = "60")]
        seconds: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_no_subcommand() {
        let cli = Cli::try_parse_from(["perfwatch-gateway"]).unwrap();
        assert_eq!(cli.config, "perfwatch.yaml");
        assert!(cli.command.is_none());
    }

    #[test]
    fn profile_takes_seconds() {
        let cli = Cli::try_parse_from(["perfwatch-gateway", "profile", "--seconds", "5", "-c", "x.yaml"])
            .unwrap();
        assert_eq!(cli.config, "x.yaml");
        assert!(matches!(cli.command, Some(Command::Profile { seconds: 5 })));
    }
}
