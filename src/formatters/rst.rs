use super::{month_title, year_title, ReportData, ReportFormatter, NO_DATA};
use crate::fmt::{money, percent};
use crate::reports::{MonthlyReportData, YearlyReportData};
use crate::settings::FormatterConfig;

pub struct RstFormatter {
    config: FormatterConfig,
}

impl RstFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn boxed(config: FormatterConfig) -> Box<dyn ReportFormatter> {
        Box::new(Self::new(config))
    }

    fn money(&self, val: f64) -> String {
        money(val, &self.config.currency_symbol)
    }

    fn month(&self, data: &MonthlyReportData) -> String {
        let mut out = heading(&month_title(data), '=');
        if !data.data_found {
            out.push_str(NO_DATA);
            out.push('\n');
            return out;
        }
        if !data.remark.is_empty() {
            out.push_str(&format!("*{}*\n\n", escape(&data.remark)));
        }

        out.push_str(&list_table(
            &["", "Amount"],
            &[
                vec!["Income".to_string(), self.money(data.total_income)],
                vec!["Expense".to_string(), self.money(data.total_expense)],
                vec!["Balance".to_string(), self.money(data.balance)],
            ],
        ));

        for parent in &data.categories {
            out.push('\n');
            out.push_str(&heading(
                &format!(
                    "{} ({}, {})",
                    parent.display_name,
                    self.money(parent.parent_total),
                    percent(data.share_of_volume(parent)),
                ),
                '-',
            ));
            for sub in &parent.sub_categories {
                out.push_str(&heading(
                    &format!("{} ({})", sub.name, self.money(sub.sub_total)),
                    '~',
                ));
                let rows: Vec<Vec<String>> = sub
                    .transactions
                    .iter()
                    .map(|t| {
                        vec![
                            self.money(t.amount),
                            escape(&t.description),
                            escape(t.comment.as_deref().unwrap_or("")),
                        ]
                    })
                    .collect();
                out.push_str(&list_table(&["Amount", "Description", "Comment"], &rows));
                out.push('\n');
            }
        }
        out
    }

    fn year(&self, data: &YearlyReportData) -> String {
        let mut out = heading(&year_title(data), '=');
        if !data.data_found {
            out.push_str(NO_DATA);
            out.push('\n');
            return out;
        }

        let mut rows: Vec<Vec<String>> = data
            .months
            .iter()
            .map(|m| {
                vec![
                    format!("{:04}-{:02}", data.year, m.month),
                    self.money(m.income),
                    self.money(m.expense),
                    self.money(m.balance()),
                ]
            })
            .collect();
        rows.push(vec![
            "Total".to_string(),
            self.money(data.total_income),
            self.money(data.total_expense),
            self.money(data.balance),
        ]);
        out.push_str(&list_table(&["Month", "Income", "Expense", "Balance"], &rows));
        out
    }
}

impl ReportFormatter for RstFormatter {
    fn extension(&self) -> &'static str {
        "rst"
    }

    fn produce(&self, data: ReportData<'_>) -> String {
        match data {
            ReportData::Month(m) => self.month(m),
            ReportData::Year(y) => self.year(y),
        }
    }
}

/// Backslash-escape characters that start inline markup or substitutions.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '*' | '_' | '`' | '|' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Columns a title occupies; wide (CJK) characters count twice.
fn display_width(text: &str) -> usize {
    text.chars()
        .map(|c| if (c as u32) >= 0x1100 { 2 } else { 1 })
        .sum()
}

fn heading(title: &str, underline: char) -> String {
    let rule: String = std::iter::repeat(underline).take(display_width(title)).collect();
    format!("{title}\n{rule}\n\n")
}

fn list_table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::from(".. list-table::\n   :header-rows: 1\n\n");
    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    for row in std::iter::once(&header).chain(rows.iter()) {
        for (i, text) in row.iter().enumerate() {
            let marker = if i == 0 { "   * -" } else { "     -" };
            if text.is_empty() {
                out.push_str(&format!("{marker}\n"));
            } else {
                out.push_str(&format!("{marker} {text}\n"));
            }
        }
    }
    out
}
