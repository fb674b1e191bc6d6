mod classifier;
mod cli;
mod db;
mod error;
mod fmt;
mod formatters;
mod importer;
mod models;
mod parser;
mod renewal;
mod reports;
mod settings;
mod validator;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ReportCommands};

fn main() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Validate { files, strict } => cli::validate::run(&files, strict),
        Commands::Parse { file, output } => cli::parse::run(&file, output.as_deref()),
        Commands::Import { files, keep_going } => cli::import::run(&files, keep_going),
        Commands::Report { command } => match command {
            ReportCommands::Month { month, output } => cli::report::month(&month, &output),
            ReportCommands::Year { year, output } => cli::report::year(year, &output),
            ReportCommands::Export { dates, kind, format, output_dir } => {
                cli::report::export(&dates, kind.as_deref(), &format, output_dir.as_deref())
            }
        },
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
