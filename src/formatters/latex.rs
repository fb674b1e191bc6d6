use super::{month_title, year_title, ReportData, ReportFormatter, NO_DATA};
use crate::fmt::{money, percent};
use crate::reports::{MonthlyReportData, YearlyReportData};
use crate::settings::FormatterConfig;

const PREAMBLE: &str = "\\documentclass{article}\n\\usepackage{fontspec}\n\\usepackage{booktabs}\n\\begin{document}\n\n";
const END: &str = "\n\\end{document}\n";

pub struct LatexFormatter {
    config: FormatterConfig,
}

impl LatexFormatter {
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
        let mut out = String::from(PREAMBLE);
        out.push_str(&format!("\\section*{{{}}}\n\n", month_title(data)));
        if !data.data_found {
            out.push_str(NO_DATA);
            out.push('\n');
            out.push_str(END);
            return out;
        }
        if !data.remark.is_empty() {
            out.push_str(&format!("\\emph{{{}}}\n\n", escape(&data.remark)));
        }

        out.push_str(&tabular(
            "lr",
            &["", "Amount"],
            &[
                vec!["Income".to_string(), self.money(data.total_income)],
                vec!["Expense".to_string(), self.money(data.total_expense)],
                vec!["\\textbf{Balance}".to_string(), format!("\\textbf{{{}}}", self.money(data.balance))],
            ],
        ));

        for parent in &data.categories {
            out.push_str(&format!(
                "\n\\subsection*{{{} ({}, {})}}\n\n",
                escape(&parent.display_name),
                self.money(parent.parent_total),
                escape(&percent(data.share_of_volume(parent))),
            ));
            for sub in &parent.sub_categories {
                out.push_str(&format!(
                    "\\subsubsection*{{{} ({})}}\n\n",
                    escape(&sub.name),
                    self.money(sub.sub_total)
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
                out.push_str(&tabular("rll", &["Amount", "Description", "Comment"], &rows));
            }
        }
        out.push_str(END);
        out
    }

    fn year(&self, data: &YearlyReportData) -> String {
        let mut out = String::from(PREAMBLE);
        out.push_str(&format!("\\section*{{{}}}\n\n", year_title(data)));
        if !data.data_found {
            out.push_str(NO_DATA);
            out.push('\n');
            out.push_str(END);
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
            "\\textbf{Total}".to_string(),
            self.money(data.total_income),
            self.money(data.total_expense),
            self.money(data.balance),
        ]);
        out.push_str(&tabular("lrrr", &["Month", "Income", "Expense", "Balance"], &rows));
        out.push_str(END);
        out
    }
}

impl ReportFormatter for LatexFormatter {
    fn extension(&self) -> &'static str {
        "tex"
    }

    fn produce(&self, data: ReportData<'_>) -> String {
        match data {
            ReportData::Month(m) => self.month(m),
            ReportData::Year(y) => self.year(y),
        }
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '\\' => out.push_str("\\textbackslash{}"),
            _ => out.push(c),
        }
    }
    out
}

fn tabular(spec: &str, header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = format!("\\begin{{tabular}}{{{spec}}}\n\\toprule\n");
    out.push_str(&format!("{} \\\\\n\\midrule\n", header.join(" & ")));
    for row in rows {
        out.push_str(&format!("{} \\\\\n", row.join(" & ")));
    }
    out.push_str("\\bottomrule\n\\end{tabular}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formatters::fixtures;

    #[test]
    fn test_month_report() {
        let out = LatexFormatter::new(FormatterConfig::default())
            .produce(ReportData::Month(&fixtures::month()));
        assert!(out.starts_with("\\documentclass{article}"));
        assert!(out.ends_with("\\end{document}\n"));
        assert!(out.contains("\\section*{Bill report 2024-01}"));
        assert!(out.contains("Income & ¥80.00 \\\\"));
        assert!(out.contains("\\subsection*{Food (¥80.00, 8.2\\%)}"));
        assert!(out.contains("¥50.00 & rice & staple \\\\"));
    }

    #[test]
    fn test_year_report() {
        let out = LatexFormatter::new(FormatterConfig::default())
            .produce(ReportData::Year(&fixtures::year()));
        assert!(out.contains("\\begin{tabular}{lrrr}"));
        assert!(out.contains("2024-01 & ¥80.00 & -¥900.00 & -¥820.00 \\\\"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("R&D 50% #1"), "R\\&D 50\\% \\#1");
        assert_eq!(escape("a_b~"), "a\\_b\\textasciitilde{}");
    }
}
