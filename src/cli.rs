//! Command-line arguments for materials-budget

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Construction materials budget: pick materials, set quantities, watch the total
#[derive(Parser, Debug)]
#[command(name = "materials-budget", version, about, long_about = None)]
pub struct Args {
    /// SQLite database holding the budget
    #[arg(long, env = "MATERIALS_BUDGET_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Keep the budget in memory only (nothing survives the process)
    #[arg(long, global = true, conflicts_with = "db")]
    pub ephemeral: bool,

    /// Log file used while the terminal UI is running
    #[arg(long, env = "MATERIALS_BUDGET_LOG", global = true)]
    pub log_file: Option<PathBuf>,

    /// Seconds between refreshes of the "last saved" display
    #[arg(long, default_value_t = 60, global = true)]
    pub refresh_secs: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Interactive terminal UI (default)
    Ui,

    /// Print the materials, the selected count and the total
    Summary,

    /// Write presupuesto_<date>.json with the full budget
    Export {
        /// Directory for the export file
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Remove every material and erase the saved budget
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["materials-budget"]).unwrap();

        assert!(args.command.is_none());
        assert!(!args.ephemeral);
        assert_eq!(args.refresh_secs, 60);
    }

    #[test]
    fn test_export_with_out_dir() {
        let args =
            Args::try_parse_from(["materials-budget", "export", "--out", "/tmp/budgets"]).unwrap();

        assert_eq!(
            args.command,
            Some(Command::Export {
                out: PathBuf::from("/tmp/budgets")
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from(["materials-budget", "clear", "--yes", "--ephemeral"]).unwrap();

        assert!(args.ephemeral);
        assert_eq!(args.command, Some(Command::Clear { yes: true }));
    }

    #[test]
    fn test_db_and_ephemeral_conflict() {
        let result =
            Args::try_parse_from(["materials-budget", "--db", "x.db", "--ephemeral"]);
        assert!(result.is_err());
    }
}
