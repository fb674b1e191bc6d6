use super::{month_title, year_title, ReportData, ReportFormatter, NO_DATA};
use crate::fmt::{money, percent};
use crate::reports::{MonthlyReportData, YearlyReportData};
use crate::settings::FormatterConfig;

pub struct TypstFormatter {
    config: FormatterConfig,
}

impl TypstFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    pub fn boxed(config: FormatterConfig) -> Box<dyn ReportFormatter> {
        Box::new(Self::new(config))
    }

    fn money(&self, val: f64) -> String {
        escape(&money(val, &self.config.currency_symbol))
    }

    fn month(&self, data: &MonthlyReportData) -> String {
        let mut out = format!("= {}\n\n", month_title(data));
        if !data.data_found {
            out.push_str(NO_DATA);
            out.push('\n');
            return out;
        }
        if !data.remark.is_empty() {
            out.push_str(&format!("_{}_\n\n", escape(&data.remark)));
        }

        out.push_str(&table(
            &["", "Amount"],
            &[
                vec!["Income".to_string(), self.money(data.total_income)],
                vec!["Expense".to_string(), self.money(data.total_expense)],
                vec!["*Balance*".to_string(), format!("*{}*", self.money(data.balance))],
            ],
        ));

        for parent in &data.categories {
            out.push_str(&format!(
                "\n== {} ({}, {})\n\n",
                escape(&parent.display_name),
                self.money(parent.parent_total),
                percent(data.share_of_volume(parent)),
            ));
            for sub in &parent.sub_categories {
                out.push_str(&format!("=== {} ({})\n\n", escape(&sub.name), self.money(sub.sub_total)));
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
                out.push_str(&table(&["Amount", "Description", "Comment"], &rows));
            }
        }
        out
    }

    fn year(&self, data: &YearlyReportData) -> String {
        let mut out = format!("= {}\n\n", year_title(data));
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
            "*Total*".to_string(),
            self.money(data.total_income),
            self.money(data.total_expense),
            self.money(data.balance),
        ]);
        out.push_str(&table(&["Month", "Income", "Expense", "Balance"], &rows));
        out
    }
}

impl ReportFormatter for TypstFormatter {
    fn extension(&self) -> &'static str {
        "typ"
    }

    fn produce(&self, data: ReportData<'_>) -> String {
        match data {
            ReportData::Month(m) => self.month(m),
            ReportData::Year(y) => self.year(y),
        }
    }
}

/// Escape markup characters that would otherwise start Typst syntax.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '#' | '*' | '_' | '$' | '@' | '<' | '>' | '[' | ']' | '\\' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = format!("#table(\n  columns: {},\n", header.len());
    let cells: Vec<String> = header.iter().map(|h| if h.is_empty() { "[]".to_string() } else { format!("[*{h}*]") }).collect();
    out.push_str(&format!("  {},\n", cells.join(", ")));
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| format!("[{c}]")).collect();
        out.push_str(&format!("  {},\n", cells.join(", ")));
    }
    out.push_str(")\n");
    out
}
