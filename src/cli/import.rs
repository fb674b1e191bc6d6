use colored::Colorize;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::importer::import_files;

pub fn run(files: &[String], keep_going: bool) -> Result<()> {
    let settings = super::settings()?;
    std::fs::create_dir_all(&settings.data_dir)?;
    let mut conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    let summary = import_files(&mut conn, &super::paths(files), &settings, keep_going)?;

    println!(
        "{} stored ({} new, {} replaced), {} unchanged",
        summary.stored(),
        summary.inserted,
        summary.replaced,
        summary.unchanged
    );
    if summary.warnings > 0 {
        let line = format!("{} validation warning(s)", summary.warnings);
        println!("{}", line.yellow());
    }
    for (path, reason) in &summary.rejected {
        let label = format!("Skipped {path}:");
        println!("{} {reason}", label.red());
    }

    Ok(())
}
