use std::path::{Path, PathBuf};

use rusqlite::Connection;

use super::{parse_month, ReportOutputArgs};
use crate::db::{get_connection, list_bills, load_bills, StoredBill};
use crate::error::{BillError, Result};
use crate::formatters::{formatter_for, formatters_for, ReportData, ReportFormatter};
use crate::reports::{
    aggregate_month, aggregate_year, sort_for_presentation, MonthlyReportData, YearlyReportData,
};
use crate::settings::Settings;

fn open_db(settings: &Settings) -> Result<Connection> {
    let db_path = settings.db_path();
    if !db_path.exists() {
        return Err(BillError::Other(format!(
            "no database at {}; run `billkeep init` and `billkeep import` first",
            db_path.display()
        )));
    }
    get_connection(&db_path)
}

fn load_month(conn: &Connection, settings: &Settings, year: i32, month: u32) -> Result<MonthlyReportData> {
    let bills = load_bills(conn, year, Some(month))?;
    let mut data = aggregate_month(&bills, year, month);
    data.apply_display_names(&settings.parent_item_display_names);
    Ok(sort_for_presentation(&data))
}

fn load_year(conn: &Connection, year: i32) -> Result<YearlyReportData> {
    let bills = load_bills(conn, year, None)?;
    Ok(aggregate_year(&bills, year))
}

fn emit(formatter: &dyn ReportFormatter, data: ReportData<'_>, output: Option<&str>) -> Result<()> {
    let body = formatter.produce(data);
    match output {
        Some(path) => {
            let mut path = PathBuf::from(path);
            if path.extension().is_none() {
                path.set_extension(formatter.extension());
            }
            super::write_output(&path, &body)
        }
        None => {
            println!("{body}");
            Ok(())
        }
    }
}

pub fn month(month: &str, args: &ReportOutputArgs) -> Result<()> {
    let (year, month) = parse_month(month)?;
    let settings = super::settings()?;
    let formatter = formatter_for(&args.format, &settings.formatter)?;
    let conn = open_db(&settings)?;

    let data = load_month(&conn, &settings, year, month)?;
    emit(formatter.as_ref(), ReportData::Month(&data), args.output.as_deref())
}

pub fn year(year: i32, args: &ReportOutputArgs) -> Result<()> {
    let settings = super::settings()?;
    let formatter = formatter_for(&args.format, &settings.formatter)?;
    let conn = open_db(&settings)?;

    let data = load_year(&conn, year)?;
    emit(formatter.as_ref(), ReportData::Year(&data), args.output.as_deref())
}

// ---------------------------------------------------------------------------
// Batch export
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Period {
    Month(i32, u32),
    Year(i32),
}

impl Period {
    fn file_stem(&self) -> String {
        match self {
            Self::Month(year, month) => format!("{year:04}-{month:02}"),
            Self::Year(year) => format!("{year:04}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeriodKind {
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    /// Every stored period, or only one kind of report.
    All(Option<PeriodKind>),
    /// Every stored month of one year.
    Year(i32),
    /// Stored months from `from` to `to`, inclusive.
    Months { from: (i32, u32), to: (i32, u32) },
}

fn selection(dates: &[String], kind: Option<&str>) -> Result<Selection> {
    match dates {
        [] => Ok(Selection::All(kind.map(|k| match k {
            "year" => PeriodKind::Year,
            _ => PeriodKind::Month,
        }))),
        [one] if one.trim().len() == 4 && one.trim().bytes().all(|b| b.is_ascii_digit()) => {
            one.trim()
                .parse()
                .map(Selection::Year)
                .map_err(|_| BillError::InvalidPeriod(format!("'{one}' (expected YYYY or YYYYMM)")))
        }
        [one] => {
            let month = parse_month(one)?;
            Ok(Selection::Months { from: month, to: month })
        }
        [from, to] => {
            let (start, end) = (parse_month(from)?, parse_month(to)?);
            if start > end {
                return Err(BillError::InvalidPeriod(format!("range {from}..{to} runs backwards")));
            }
            Ok(Selection::Months { from: start, to: end })
        }
        _ => Err(BillError::Other("export takes at most two dates".to_string())),
    }
}

/// Periods to export, months first, each in calendar order.
fn plan(stored: &[StoredBill], selection: Selection) -> Vec<Period> {
    let months = stored.iter().map(|b| (b.year, b.month));
    let mut periods: Vec<Period> = match selection {
        Selection::All(kind) => {
            let mut out = Vec::new();
            if kind != Some(PeriodKind::Year) {
                out.extend(months.clone().map(|(y, m)| Period::Month(y, m)));
            }
            if kind != Some(PeriodKind::Month) {
                out.extend(months.map(|(y, _)| Period::Year(y)));
            }
            out
        }
        Selection::Year(year) => months
            .filter(|(y, _)| *y == year)
            .map(|(y, m)| Period::Month(y, m))
            .collect(),
        Selection::Months { from, to } => months
            .filter(|p| from <= *p && *p <= to)
            .map(|(y, m)| Period::Month(y, m))
            .collect(),
    };
    periods.sort();
    periods.dedup();
    periods
}

/// Render every period with every formatter into `dir` as `<period>.<ext>`.
fn export_periods(
    conn: &Connection,
    settings: &Settings,
    periods: &[Period],
    formatters: &[Box<dyn ReportFormatter>],
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for period in periods {
        let month_data;
        let year_data;
        let data = match *period {
            Period::Month(year, month) => {
                month_data = load_month(conn, settings, year, month)?;
                ReportData::Month(&month_data)
            }
            Period::Year(year) => {
                year_data = load_year(conn, year)?;
                ReportData::Year(&year_data)
            }
        };
        for formatter in formatters {
            let path = dir.join(format!("{}.{}", period.file_stem(), formatter.extension()));
            super::write_output(&path, &formatter.produce(data))?;
            written.push(path);
        }
    }
    tracing::info!(periods = periods.len(), files = written.len(), dir = %dir.display(), "export finished");
    Ok(written)
}

pub fn export(dates: &[String], kind: Option<&str>, format: &str, output_dir: Option<&str>) -> Result<()> {
    let selection = selection(dates, kind)?;
    let settings = super::settings()?;
    let formatters = formatters_for(format, &settings.formatter)?;
    let conn = open_db(&settings)?;

    let periods = plan(&list_bills(&conn)?, selection);
    if periods.is_empty() {
        println!("No stored bills in the selected period; nothing exported.");
        return Ok(());
    }

    let dir = output_dir.map(PathBuf::from).unwrap_or_else(|| settings.exports_dir());
    let written = export_periods(&conn, &settings, &periods, &formatters, &dir)?;
    println!("Exported {} file(s) to {}", written.len(), dir.display());
    Ok(())
}
