use std::path::Path;

use crate::error::Result;
use crate::importer::ingest_file;

pub fn run(file: &str, output: Option<&str>) -> Result<()> {
    let settings = super::settings()?;
    let ingested = ingest_file(Path::new(file), &settings)?;

    if ingested.validation.has_errors() {
        eprintln!(
            "{file} has {} validation error(s); output is best effort. Run `billkeep validate {file}` for details.",
            ingested.validation.errors.len()
        );
    }
    for location in &ingested.renewal.missing_location {
        eprintln!("Auto-renewal target '{location}' not found in {file}");
    }

    let json = serde_json::to_string_pretty(&ingested.bill)?;
    match output {
        Some(path) => super::write_output(Path::new(path), &format!("{json}\n")),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}
