pub mod import;
pub mod init;
pub mod parse;
pub mod report;
pub mod status;
pub mod validate;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::error::{BillError, Result};
use crate::models::parse_period;
use crate::settings::{check_settings, load_settings, Settings};

#[derive(Parser)]
#[command(name = "billkeep", version, about = "Validate, parse and report on plain-text monthly bill files.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write default settings and create the bill database.
    Init {
        /// Path for billkeep data (default: ~/Documents/billkeep)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Check bill files against the bill grammar.
    Validate {
        /// Bill files to check
        #[arg(required = true)]
        files: Vec<String>,
        /// Fail when any file has errors
        #[arg(long)]
        strict: bool,
    },
    /// Parse one bill file and print it as JSON.
    Parse {
        /// Bill file to parse
        file: String,
        /// Write the JSON document here instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
    /// Validate, parse and store bill files in the database.
    Import {
        /// Bill files to import
        #[arg(required = true)]
        files: Vec<String>,
        /// Store the valid files even if others fail
        #[arg(long = "keep-going")]
        keep_going: bool,
    },
    /// Generate reports from stored bills.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
    /// Show settings and stored bills.
    Status,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Report for one month.
    Month {
        /// Month: YYYY-MM
        month: String,
        #[command(flatten)]
        output: ReportOutputArgs,
    },
    /// Month-by-month summary for one year.
    Year {
        /// Year: YYYY
        year: i32,
        #[command(flatten)]
        output: ReportOutputArgs,
    },
    /// Write reports for stored periods to files.
    Export {
        /// YYYY for every month of a year, YYYYMM for one month, or two
        /// YYYYMM values for an inclusive range (default: every stored period)
        #[arg(num_args = 0..=2)]
        dates: Vec<String>,
        /// Only month or only year reports when no dates are given
        #[arg(long = "type", value_parser = ["month", "year"], conflicts_with = "dates")]
        kind: Option<String>,
        /// Output format: md, rst, typ, tex, text or all
        #[arg(long, default_value = "md")]
        format: String,
        /// Directory for the report files (default: <data_dir>/exports)
        #[arg(long = "output-dir")]
        output_dir: Option<String>,
    },
}

#[derive(Args, Clone)]
pub struct ReportOutputArgs {
    /// Output format: md, rst, typ, tex or text
    #[arg(long, default_value = "text")]
    pub format: String,
    /// Write the report to this file instead of stdout
    #[arg(long)]
    pub output: Option<String>,
}

/// Accept `YYYY-MM` or `YYYYMM`.
pub(crate) fn parse_month(value: &str) -> Result<(i32, u32)> {
    let digits: String = value.trim().chars().filter(|c| *c != '-').collect();
    parse_period(&digits).ok_or_else(|| BillError::InvalidPeriod(format!("'{value}' (expected YYYY-MM)")))
}

/// Settings for commands that run the bill pipeline.
pub(crate) fn settings() -> Result<Settings> {
    let settings = load_settings();
    check_settings(&settings)?;
    Ok(settings)
}

pub(crate) fn paths(files: &[String]) -> Vec<PathBuf> {
    files.iter().map(PathBuf::from).collect()
}

/// Write `content` to `path`, creating parent directories.
pub(crate) fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, content)?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_month() {
        assert_eq!(parse_month("2024-01").unwrap(), (2024, 1));
        assert_eq!(parse_month("202412").unwrap(), (2024, 12));
        assert!(matches!(parse_month("2024-13"), Err(BillError::InvalidPeriod(_))));
        assert!(parse_month("24-1").is_err());
        assert!(parse_month("").is_err());
    }

    #[test]
    fn test_export_type_conflicts_with_dates() {
        let parsed = Cli::try_parse_from(["billkeep", "report", "export", "--type", "year"]).unwrap();
        let Commands::Report { command: ReportCommands::Export { dates, kind, format, .. } } = parsed.command else {
            panic!("expected report export");
        };
        assert!(dates.is_empty());
        assert_eq!(kind.as_deref(), Some("year"));
        assert_eq!(format, "md");

        assert!(Cli::try_parse_from(["billkeep", "report", "export", "202401", "--type", "month"]).is_err());
        assert!(Cli::try_parse_from(["billkeep", "report", "export", "--type", "week"]).is_err());
        assert!(Cli::try_parse_from(["billkeep", "report", "export", "202401", "202402", "202403"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
