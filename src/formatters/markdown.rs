use super::{month_title, year_title, ReportData, ReportFormatter, NO_DATA};
use crate::fmt::{money, percent};
use crate::reports::{MonthlyReportData, YearlyReportData};
use crate::settings::FormatterConfig;

pub struct MarkdownFormatter {
    config: FormatterConfig,
}

impl MarkdownFormatter {
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
        let mut out = format!("# {}\n\n", month_title(data));
        if !data.data_found {
            out.push_str(NO_DATA);
            out.push('\n');
            return out;
        }
        if !data.remark.is_empty() {
            out.push_str(&format!("> {}\n\n", escape(&data.remark)));
        }

        out.push_str("| | Amount |\n|---|---:|\n");
        out.push_str(&format!("| Income | {} |\n", self.money(data.total_income)));
        out.push_str(&format!("| Expense | {} |\n", self.money(data.total_expense)));
        out.push_str(&format!("| **Balance** | **{}** |\n", self.money(data.balance)));

        for parent in &data.categories {
            out.push_str(&format!(
                "\n## {} ({}, {})\n\n",
                escape(&parent.display_name),
                self.money(parent.parent_total),
                percent(data.share_of_volume(parent)),
            ));
            for sub in &parent.sub_categories {
                out.push_str(&format!("### {} ({})\n\n", escape(&sub.name), self.money(sub.sub_total)));
                out.push_str("| Amount | Description | Comment |\n|---:|---|---|\n");
                for txn in &sub.transactions {
                    out.push_str(&format!(
                        "| {} | {} | {} |\n",
                        self.money(txn.amount),
                        escape(&txn.description),
                        escape(txn.comment.as_deref().unwrap_or("")),
                    ));
                }
                out.push('\n');
            }
        }
        out
    }

    fn year(&self, data: &YearlyReportData) -> String {
        let mut out = format!("# {}\n\n", year_title(data));
        if !data.data_found {
            out.push_str(NO_DATA);
            out.push('\n');
            return out;
        }

        out.push_str("| Month | Income | Expense | Balance |\n|---|---:|---:|---:|\n");
        for m in &data.months {
            out.push_str(&format!(
                "| {:04}-{:02} | {} | {} | {} |\n",
                data.year,
                m.month,
                self.money(m.income),
                self.money(m.expense),
                self.money(m.balance()),
            ));
        }
        out.push_str(&format!(
            "| **Total** | **{}** | **{}** | **{}** |\n",
            self.money(data.total_income),
            self.money(data.total_expense),
            self.money(data.balance),
        ));
        out
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn produce(&self, data: ReportData<'_>) -> String {
        match data {
            ReportData::Month(m) => self.month(m),
            ReportData::Year(y) => self.year(y),
        }
    }
}

/// Keep user text from breaking table cells or emphasis.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '|' | '*' | '_' | '`' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
