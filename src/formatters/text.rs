use colored::Colorize;
use comfy_table::{Cell, CellAlignment, Table};

use super::{month_title, year_title, ReportData, ReportFormatter, NO_DATA};
use crate::fmt::{money, percent};
use crate::reports::{MonthlyReportData, YearlyReportData};
use crate::settings::FormatterConfig;

/// Terminal tables.
pub struct TextFormatter {
    config: FormatterConfig,
}

impl TextFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn boxed(config: FormatterConfig) -> Box<dyn ReportFormatter> {
        Box::new(Self::new(config))
    }

    fn amount(&self, val: f64) -> Cell {
        Cell::new(money(val, &self.config.currency_symbol)).set_alignment(CellAlignment::Right)
    }

    fn month(&self, data: &MonthlyReportData) -> String {
        let title = month_title(data);
        let mut out = format!("{}\n", title.bold());
        if !data.data_found {
            out.push_str(NO_DATA);
            return out;
        }
        if !data.remark.is_empty() {
            out.push_str(&data.remark);
            out.push('\n');
        }

        let mut table = Table::new();
        table.set_header(vec!["Category", "Amount", "Share"]);
        for parent in &data.categories {
            table.add_row(vec![
                Cell::new(parent.display_name.bold()),
                self.amount(parent.parent_total),
                Cell::new(percent(data.share_of_volume(parent))).set_alignment(CellAlignment::Right),
            ]);
            for sub in &parent.sub_categories {
                table.add_row(vec![
                    Cell::new(format!("  {}", sub.name)),
                    self.amount(sub.sub_total),
                    Cell::new(""),
                ]);
                for txn in &sub.transactions {
                    let label = match &txn.comment {
                        Some(comment) => format!("    {} ({comment})", txn.description),
                        None => format!("    {}", txn.description),
                    };
                    table.add_row(vec![Cell::new(label), self.amount(txn.amount), Cell::new("")]);
                }
            }
        }
        table.add_row(vec![Cell::new(""), Cell::new(""), Cell::new("")]);
        table.add_row(vec![Cell::new("Income".green()), self.amount(data.total_income), Cell::new("")]);
        table.add_row(vec![Cell::new("Expense".red()), self.amount(data.total_expense), Cell::new("")]);
        table.add_row(vec![Cell::new("Balance".bold()), self.amount(data.balance), Cell::new("")]);

        out.push_str(&table.to_string());
        out
    }

    fn year(&self, data: &YearlyReportData) -> String {
        let title = year_title(data);
        let mut out = format!("{}\n", title.bold());
        if !data.data_found {
            out.push_str(NO_DATA);
            return out;
        }

        let mut table = Table::new();
        table.set_header(vec!["Month", "Income", "Expense", "Balance"]);
        for m in &data.months {
            table.add_row(vec![
                Cell::new(format!("{:04}-{:02}", data.year, m.month)),
                self.amount(m.income),
                self.amount(m.expense),
                self.amount(m.balance()),
            ]);
        }
        table.add_row(vec![
            Cell::new("Total".bold()),
            self.amount(data.total_income),
            self.amount(data.total_expense),
            self.amount(data.balance),
        ]);

        out.push_str(&table.to_string());
        out
    }
}

impl ReportFormatter for TextFormatter {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn produce(&self, data: ReportData<'_>) -> String {
        match data {
            ReportData::Month(m) => self.month(m),
            ReportData::Year(y) => self.year(y),
        }
    }
}
