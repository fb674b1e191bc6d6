use comfy_table::{Cell, CellAlignment, Table};

use crate::db::{get_connection, list_bills};
use crate::error::Result;
use crate::fmt::money;
use crate::settings::{load_settings, settings_file_exists};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!(
        "Settings:   {}",
        if settings_file_exists() { "found" } else { "(defaults, run `billkeep init`)" }
    );
    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Empty parent policy: {:?}", settings.empty_parent_policy);
    println!(
        "Auto-renewal: {} ({} rule(s))",
        if settings.auto_renewal.enabled { "on" } else { "off" },
        settings.auto_renewal.rules.len()
    );

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `billkeep init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let bills = list_bills(&conn)?;
    println!();
    println!("Bills:      {}", bills.len());
    if bills.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Month", "Remark", "Transactions", "Balance", "Source"]);
    for bill in &bills {
        table.add_row(vec![
            Cell::new(format!("{:04}-{:02}", bill.year, bill.month)),
            Cell::new(&bill.remark),
            Cell::new(bill.transactions).set_alignment(CellAlignment::Right),
            Cell::new(money(bill.balance, &settings.formatter.currency_symbol))
                .set_alignment(CellAlignment::Right),
            Cell::new(bill.source_file.as_deref().unwrap_or("")),
        ]);
    }
    println!("{table}");
    Ok(())
}
