use crate::models::{ParsedBill, Transaction, TransactionSource};
use crate::settings::{AutoRenewalConfig, AutoRenewalRule};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenewalOutcome {
    pub injected: usize,
    /// Rules whose target (parent, sub) is absent from the bill.
    pub missing_location: Vec<String>,
    /// Rules whose description the target sub-category already lists.
    pub already_present: Vec<String>,
}

/// Split `Parent.sub` into its parts. A location without a dot names a sub-category only.
fn split_location(location: &str) -> (Option<&str>, &str) {
    match location.rsplit_once('.') {
        Some((parent, sub)) => (Some(parent.trim()), sub.trim()),
        None => (None, location.trim()),
    }
}

fn resolve(bill: &ParsedBill, rule: &AutoRenewalRule) -> Option<(String, String)> {
    let (parent, sub) = split_location(&rule.header_location);
    if sub.is_empty() {
        return None;
    }
    let found = match parent {
        Some(name) => bill.parent(name).filter(|p| p.sub(sub).is_some()),
        None => bill.categories.iter().find(|p| p.sub(sub).is_some()),
    };
    found.map(|p| (p.title.clone(), sub.to_string()))
}

/// Append configured auto-renewal transactions to a parsed bill. Runs at most
/// once per bill; the bill file itself is never touched.
pub fn apply(bill: &mut ParsedBill, config: &AutoRenewalConfig) -> RenewalOutcome {
    let mut outcome = RenewalOutcome::default();
    if !config.enabled || bill.renewals_applied {
        return outcome;
    }

    for rule in &config.rules {
        let Some((parent, sub)) = resolve(bill, rule) else {
            tracing::warn!(location = %rule.header_location, "auto-renewal target not found, rule skipped");
            outcome.missing_location.push(rule.header_location.clone());
            continue;
        };
        let Some(target) = bill.parent_mut(&parent).and_then(|p| {
            p.sub_categories.iter_mut().find(|s| s.title == sub)
        }) else {
            continue;
        };

        let needle = rule.description.trim();
        if !needle.is_empty() && target.transactions.iter().any(|t| t.description.contains(needle)) {
            tracing::debug!(location = %rule.header_location, "renewal already listed in bill");
            outcome.already_present.push(rule.header_location.clone());
            continue;
        }

        target.transactions.push(Transaction::new(
            &parent,
            &sub,
            rule.amount,
            &rule.description,
            None,
            TransactionSource::AutoRenewal,
        ));
        outcome.injected += 1;
    }

    bill.renewals_applied = true;
    tracing::debug!(injected = outcome.injected, "auto-renewal applied");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;
    use crate::settings::Settings;

    const SCENARIO_A: &str = "DATE:202401\nREMARK:test\nFood\ngroceries\n50 rice //staple\n30 milk\n";

    fn rule(location: &str, amount: f64, description: &str) -> AutoRenewalRule {
        AutoRenewalRule {
            header_location: location.to_string(),
            amount,
            description: description.to_string(),
        }
    }

    fn enabled(rules: Vec<AutoRenewalRule>) -> AutoRenewalConfig {
        AutoRenewalConfig { enabled: true, rules }
    }

    #[test]
    fn test_scenario_c() {
        let mut bill = parse_text(SCENARIO_A, &Settings::default());
        let groceries_total = |b: &ParsedBill| b.parent("Food").unwrap().sub("groceries").unwrap().sub_total();
        assert_eq!(groceries_total(&bill), 80.0);

        let outcome = apply(&mut bill, &enabled(vec![rule("Food.groceries", 99.0, "rent")]));
        assert_eq!(outcome.injected, 1);
        assert_eq!(groceries_total(&bill), 179.0);

        let injected = bill.transactions().last().unwrap();
        assert_eq!(injected.source, TransactionSource::AutoRenewal);
        assert_eq!(injected.description, "rent");
        assert_eq!(injected.amount, 99.0);
        assert_eq!(injected.parent_category, "Food");
    }

    #[test]
    fn test_runs_once_per_bill() {
        let mut bill = parse_text(SCENARIO_A, &Settings::default());
        let config = enabled(vec![rule("Food.groceries", 99.0, "rent")]);
        apply(&mut bill, &config);
        let second = apply(&mut bill, &config);
        assert_eq!(second.injected, 0);
        assert_eq!(bill.transactions().count(), 3);
    }

    #[test]
    fn test_disabled_does_nothing() {
        let mut bill = parse_text(SCENARIO_A, &Settings::default());
        let config = AutoRenewalConfig {
            enabled: false,
            rules: vec![rule("Food.groceries", 99.0, "rent")],
        };
        let outcome = apply(&mut bill, &config);
        assert_eq!(outcome, RenewalOutcome::default());
        assert!(!bill.renewals_applied);
        assert_eq!(bill.transactions().count(), 2);
    }

    #[test]
    fn test_missing_location_is_skipped() {
        let mut bill = parse_text(SCENARIO_A, &Settings::default());
        let config = enabled(vec![
            rule("Home.rent", 900.0, "flat"),
            rule("Food.snacks", 5.0, "chips"),
            rule("Food.groceries", 10.0, "bread"),
        ]);
        let outcome = apply(&mut bill, &config);
        assert_eq!(outcome.injected, 1);
        assert_eq!(outcome.missing_location, vec!["Home.rent", "Food.snacks"]);
        assert!(bill.parent("Home").is_none());
    }

    #[test]
    fn test_bare_sub_location() {
        let mut bill = parse_text(SCENARIO_A, &Settings::default());
        let outcome = apply(&mut bill, &enabled(vec![rule("groceries", 1.0, "bag")]));
        assert_eq!(outcome.injected, 1);
        assert_eq!(bill.parent("Food").unwrap().sub("groceries").unwrap().transactions.len(), 3);
    }

    #[test]
    fn test_qualified_location_picks_named_parent() {
        let text = "date:202401\nremark:\nFood\nmisc\n5 gum\nHome\nmisc\n7 tape\n";
        let mut bill = parse_text(text, &Settings::default());
        let outcome = apply(&mut bill, &enabled(vec![rule("Home.misc", 3.0, "bulbs")]));
        assert_eq!(outcome.injected, 1);
        assert_eq!(bill.parent("Food").unwrap().sub("misc").unwrap().transactions.len(), 1);
        let home = bill.parent("Home").unwrap().sub("misc").unwrap();
        assert_eq!(home.transactions.last().unwrap().description, "bulbs");

        let outcome = apply(
            &mut parse_text(text, &Settings::default()),
            &enabled(vec![rule("Salary.misc", 1.0, "x")]),
        );
        assert_eq!(outcome.missing_location, vec!["Salary.misc"]);
    }

    #[test]
    fn test_already_listed_renewal_is_not_doubled() {
        let mut bill = parse_text(SCENARIO_A, &Settings::default());
        let outcome = apply(&mut bill, &enabled(vec![rule("Food.groceries", 30.0, "milk")]));
        assert_eq!(outcome.injected, 0);
        assert_eq!(outcome.already_present, vec!["Food.groceries"]);
        assert_eq!(bill.total_amount(), 80.0);
    }
}
