//! Report formatters. Each format is a small struct implementing
//! [`ReportFormatter`]; [`formatter_for`] picks one by name.

pub mod latex;
pub mod markdown;
pub mod rst;
pub mod text;
pub mod typst;

use crate::error::{BillError, Result};
use crate::reports::{MonthlyReportData, YearlyReportData};
use crate::settings::FormatterConfig;

#[derive(Clone, Copy)]
pub enum ReportData<'a> {
    Month(&'a MonthlyReportData),
    Year(&'a YearlyReportData),
}

pub trait ReportFormatter {
    /// File extension used when writing the report to disk.
    fn extension(&self) -> &'static str;

    fn produce(&self, data: ReportData<'_>) -> String;
}

type Constructor = fn(FormatterConfig) -> Box<dyn ReportFormatter>;

const FORMATTERS: &[(&str, Constructor)] = &[
    ("md", markdown::MarkdownFormatter::boxed),
    ("rst", rst::RstFormatter::boxed),
    ("typ", typst::TypstFormatter::boxed),
    ("tex", latex::LatexFormatter::boxed),
    ("text", text::TextFormatter::boxed),
];

/// Names accepted by [`formatter_for`], in table order.
pub fn names() -> Vec<&'static str> {
    FORMATTERS.iter().map(|(name, _)| *name).collect()
}

pub fn formatter_for(name: &str, config: &FormatterConfig) -> Result<Box<dyn ReportFormatter>> {
    let key = name.trim().to_lowercase();
    FORMATTERS
        .iter()
        .find(|(n, _)| *n == key)
        .map(|(_, build)| build(config.clone()))
        .ok_or_else(|| {
            BillError::UnknownFormat(format!("{name} (expected one of: {})", names().join(", ")))
        })
}

/// Like [`formatter_for`], but `all` yields every format in table order.
pub fn formatters_for(name: &str, config: &FormatterConfig) -> Result<Vec<Box<dyn ReportFormatter>>> {
    if name.trim().eq_ignore_ascii_case("all") {
        return Ok(FORMATTERS.iter().map(|(_, build)| build(config.clone())).collect());
    }
    formatter_for(name, config).map(|f| vec![f])
}

pub(crate) const NO_DATA: &str = "No data for this period.";

pub(crate) fn month_title(data: &MonthlyReportData) -> String {
    format!("Bill report {:04}-{:02}", data.year, data.month)
}

pub(crate) fn year_title(data: &YearlyReportData) -> String {
    format!("Bill report {:04}", data.year)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::parser::parse_text;
    use crate::reports::{aggregate_month, aggregate_year, MonthlyReportData, YearlyReportData};
    use crate::settings::Settings;

    pub const BILL: &str = "date:202401\nremark:new year\nFood\ngroceries\n50 rice //staple\n30 milk\nHome\nrent\n-900 flat\n";

    pub fn month() -> MonthlyReportData {
        aggregate_month(&[parse_text(BILL, &Settings::default())], 2024, 1)
    }

    pub fn empty_month() -> MonthlyReportData {
        aggregate_month(&[], 2024, 2)
    }

    pub fn year() -> YearlyReportData {
        aggregate_year(&[parse_text(BILL, &Settings::default())], 2024)
    }
}
