use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{ParsedBill, Transaction, TransactionType};

// ---------------------------------------------------------------------------
// Monthly rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubCategoryData {
    pub name: String,
    pub sub_total: f64,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParentCategoryData {
    pub name: String,
    pub display_name: String,
    pub parent_total: f64,
    pub sub_categories: Vec<SubCategoryData>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReportData {
    pub year: i32,
    pub month: u32,
    pub remark: String,
    pub categories: Vec<ParentCategoryData>,
    pub total_income: f64,
    /// Sum of expense amounts; never positive.
    pub total_expense: f64,
    pub balance: f64,
    pub data_found: bool,
}

impl MonthlyReportData {
    /// Percentage of the month's gross volume (income plus absolute expense)
    /// that one parent accounts for. Zero when the month has no volume.
    pub fn share_of_volume(&self, parent: &ParentCategoryData) -> f64 {
        let volume = self.total_income + self.total_expense.abs();
        if volume == 0.0 {
            0.0
        } else {
            parent.parent_total.abs() / volume * 100.0
        }
    }

    /// Replace presentation names; aggregation keys stay untouched.
    pub fn apply_display_names(&mut self, names: &BTreeMap<String, String>) {
        for parent in &mut self.categories {
            if let Some(display) = names.get(&parent.name) {
                parent.display_name = display.clone();
            }
        }
    }

    fn parent_mut_or_insert(&mut self, name: &str, display_name: &str) -> &mut ParentCategoryData {
        let idx = match self.categories.iter().position(|p| p.name == name) {
            Some(idx) => idx,
            None => {
                self.categories.push(ParentCategoryData {
                    name: name.to_string(),
                    display_name: display_name.to_string(),
                    parent_total: 0.0,
                    sub_categories: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        &mut self.categories[idx]
    }
}

fn sub_mut_or_insert<'a>(parent: &'a mut ParentCategoryData, name: &str) -> &'a mut SubCategoryData {
    let idx = match parent.sub_categories.iter().position(|s| s.name == name) {
        Some(idx) => idx,
        None => {
            parent.sub_categories.push(SubCategoryData {
                name: name.to_string(),
                sub_total: 0.0,
                transactions: Vec::new(),
            });
            parent.sub_categories.len() - 1
        }
    };
    &mut parent.sub_categories[idx]
}

/// Fold every transaction of the bills dated `year`/`month` into a monthly rollup.
pub fn aggregate_month(bills: &[ParsedBill], year: i32, month: u32) -> MonthlyReportData {
    let mut data = MonthlyReportData {
        year,
        month,
        remark: String::new(),
        categories: Vec::new(),
        total_income: 0.0,
        total_expense: 0.0,
        balance: 0.0,
        data_found: false,
    };

    for bill in bills
        .iter()
        .filter(|b| b.metadata.period() == Some((year, month)))
    {
        if data.remark.is_empty() {
            data.remark = bill.metadata.remark.clone();
        }
        for parent in &bill.categories {
            for sub in &parent.sub_categories {
                for txn in &sub.transactions {
                    let p = data.parent_mut_or_insert(&parent.title, &parent.display_name);
                    p.parent_total += txn.amount;
                    let s = sub_mut_or_insert(p, &sub.title);
                    s.sub_total += txn.amount;
                    s.transactions.push(txn.clone());

                    match txn.transaction_type {
                        TransactionType::Income => data.total_income += txn.amount,
                        TransactionType::Expense => data.total_expense += txn.amount,
                    }
                    data.data_found = true;
                }
            }
        }
    }

    data.balance = data.total_income + data.total_expense;
    data
}

/// Presentation order: transactions by amount descending, parents by total
/// descending. Ties keep first-seen order.
pub fn sort_for_presentation(data: &MonthlyReportData) -> MonthlyReportData {
    let mut sorted = data.clone();
    for parent in &mut sorted.categories {
        for sub in &mut parent.sub_categories {
            sub.transactions.sort_by(|a, b| b.amount.total_cmp(&a.amount));
        }
    }
    sorted
        .categories
        .sort_by(|a, b| b.parent_total.total_cmp(&a.parent_total));
    sorted
}

// ---------------------------------------------------------------------------
// Yearly rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlySummary {
    pub month: u32,
    pub income: f64,
    pub expense: f64,
}

impl MonthlySummary {
    pub fn balance(&self) -> f64 {
        self.income + self.expense
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyReportData {
    pub year: i32,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub data_found: bool,
    /// Only months that have data, in calendar order.
    pub months: Vec<MonthlySummary>,
}

pub fn aggregate_year(bills: &[ParsedBill], year: i32) -> YearlyReportData {
    let months: Vec<MonthlySummary> = (1..=12)
        .map(|month| aggregate_month(bills, year, month))
        .filter(|m| m.data_found)
        .map(|m| MonthlySummary {
            month: m.month,
            income: m.total_income,
            expense: m.total_expense,
        })
        .collect();

    let total_income: f64 = months.iter().map(|m| m.income).sum();
    let total_expense: f64 = months.iter().map(|m| m.expense).sum();

    YearlyReportData {
        year,
        total_income,
        total_expense,
        balance: total_income + total_expense,
        data_found: !months.is_empty(),
        months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionSource;
    use crate::parser::parse_text;
    use crate::settings::Settings;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SCENARIO_A: &str = "DATE:202401\nREMARK:test\nFood\ngroceries\n50 rice //staple\n30 milk\n";

    fn bill(text: &str) -> ParsedBill {
        parse_text(text, &Settings::default())
    }

    fn parent<'a>(data: &'a MonthlyReportData, name: &str) -> &'a ParentCategoryData {
        data.categories.iter().find(|p| p.name == name).unwrap()
    }

    fn sub<'a>(parent: &'a ParentCategoryData, name: &str) -> &'a SubCategoryData {
        parent.sub_categories.iter().find(|s| s.name == name).unwrap()
    }

    #[test]
    fn test_monthly_rollup_scenario_a() {
        let data = aggregate_month(&[bill(SCENARIO_A)], 2024, 1);
        assert!(data.data_found);
        assert_eq!(data.remark, "test");
        let food = parent(&data, "Food");
        assert_eq!(food.parent_total, 80.0);
        assert_eq!(sub(food, "groceries").sub_total, 80.0);
        assert_eq!(data.total_income, 80.0);
        assert_eq!(data.total_expense, 0.0);
        assert_eq!(data.balance, 80.0);
    }

    #[test]
    fn test_income_expense_and_balance() {
        let text = "date:202403\nremark:\nSalary\nbase_pay\n3000 pay\nHome\nrent\n-900 flat\npower\n-120.5 bill\n";
        let data = aggregate_month(&[bill(text)], 2024, 3);
        assert_eq!(data.total_income, 3000.0);
        assert_eq!(data.total_expense, -1020.5);
        assert_eq!(data.balance, 1979.5);
        assert_eq!(parent(&data, "Home").parent_total, -1020.5);
    }

    #[test]
    fn test_no_matching_period() {
        let data = aggregate_month(&[bill(SCENARIO_A)], 2024, 2);
        assert!(!data.data_found);
        assert!(data.categories.is_empty());
        assert_eq!(data.balance, 0.0);
        assert_eq!(data.share_of_volume(&ParentCategoryData {
            name: "x".into(),
            display_name: "x".into(),
            parent_total: 5.0,
            sub_categories: Vec::new(),
        }), 0.0);
    }

    #[test]
    fn test_share_of_volume() {
        let text = "date:202403\nremark:\nSalary\nbase_pay\n75 pay\nHome\nrent\n-25 flat\n";
        let data = aggregate_month(&[bill(text)], 2024, 3);
        let home = parent(&data, "Home");
        assert!((data.share_of_volume(home) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_two_bills_same_month_merge() {
        let a = bill("date:202401\nremark:first\nFood\ngroceries\n10 a\n");
        let b = bill("date:202401\nremark:second\nFood\ngroceries\n5 b\nsnacks\n1 c\n");
        let data = aggregate_month(&[a, b], 2024, 1);
        assert_eq!(data.remark, "first");
        let food = parent(&data, "Food");
        assert_eq!(food.parent_total, 16.0);
        assert_eq!(food.sub_categories.len(), 2);
        assert_eq!(sub(food, "groceries").transactions.len(), 2);
    }

    #[test]
    fn test_presentation_sort_is_stable() {
        let text = "date:202401\nremark:\nSmall\nx\n1 s\nBig\nsame\n5 first\n9 top\n5 second\n5 third\nTied\ny\n1 t\n";
        let data = aggregate_month(&[bill(text)], 2024, 1);
        let sorted = sort_for_presentation(&data);

        let parents: Vec<&str> = sorted.categories.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(parents, vec!["Big", "Small", "Tied"]);

        let descs: Vec<&str> = sorted.categories[0].sub_categories[0]
            .transactions
            .iter()
            .map(|t| t.description.as_str())
            .collect();
        assert_eq!(descs, vec!["top", "first", "second", "third"]);
        // The input is left as it was.
        assert_eq!(data.categories[0].name, "Small");
    }

    #[test]
    fn test_rollup_invariants_hold_for_generated_data() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let mut b = ParsedBill::default();
            b.metadata.date = "202405".to_string();
            for _ in 0..rng.gen_range(1..40) {
                let parent = ["Food", "Home", "Pay"][rng.gen_range(0..3)];
                let sub = ["a", "b", "c"][rng.gen_range(0..3)];
                let amount = (rng.gen_range(-100_000..100_000) as f64) / 100.0;
                b.push_transaction(Transaction::new(parent, sub, amount, "x", None, TransactionSource::Manual));
            }
            let data = aggregate_month(std::slice::from_ref(&b), 2024, 5);

            for parent in &data.categories {
                let subs: f64 = parent.sub_categories.iter().map(|s| s.sub_total).sum();
                assert!((parent.parent_total - subs).abs() < 1e-9);
                for sub in &parent.sub_categories {
                    let leaves: f64 = sub.transactions.iter().map(|t| t.amount).sum();
                    assert!((sub.sub_total - leaves).abs() < 1e-9);
                }
            }

            let gross: f64 = b.transactions().map(|t| t.amount.abs()).sum();
            assert!((gross - (data.total_income + data.total_expense.abs())).abs() < 1e-9);
            let net: f64 = b.transactions().map(|t| t.amount).sum();
            assert!((net - data.balance).abs() < 1e-9);
        }
    }

    #[test]
    fn test_yearly_rollup_omits_empty_months() {
        let bills = vec![
            bill("date:202401\nremark:\nPay\nbase\n100 a\nHome\nrent\n-40 b\n"),
            bill("date:202403\nremark:\nPay\nbase\n50 a\n"),
            bill("date:202301\nremark:\nPay\nbase\n999 old\n"),
        ];
        let year = aggregate_year(&bills, 2024);
        assert!(year.data_found);
        assert_eq!(year.months.len(), 2);
        assert_eq!(year.months[0].month, 1);
        assert_eq!(year.months[0].income, 100.0);
        assert_eq!(year.months[0].expense, -40.0);
        assert_eq!(year.months[0].balance(), 60.0);
        assert_eq!(year.months[1].month, 3);
        assert_eq!(year.total_income, 150.0);
        assert_eq!(year.total_expense, -40.0);
        assert_eq!(year.balance, 110.0);

        let empty = aggregate_year(&bills, 2022);
        assert!(!empty.data_found);
        assert!(empty.months.is_empty());
    }

    #[test]
    fn test_apply_display_names() {
        let mut data = aggregate_month(&[bill(SCENARIO_A)], 2024, 1);
        let mut names = BTreeMap::new();
        names.insert("Food".to_string(), "Food & Dining".to_string());
        data.apply_display_names(&names);
        let food = parent(&data, "Food");
        assert_eq!(food.display_name, "Food & Dining");
    }
}
