use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

/// Where a transaction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Manual,
    AutoRenewal,
}

impl TransactionSource {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::AutoRenewal => "auto_renewal",
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key {
            "auto_renewal" => Self::AutoRenewal,
            _ => Self::Manual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    /// Amounts are kept as written; only negative amounts are expenses.
    pub fn for_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Expense
        } else {
            Self::Income
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub parent_category: String,
    pub sub_category: String,
    pub amount: f64,
    pub description: String,
    pub source: TransactionSource,
    pub comment: Option<String>,
    pub transaction_type: TransactionType,
}

impl Transaction {
    pub fn new(
        parent_category: &str,
        sub_category: &str,
        amount: f64,
        description: &str,
        comment: Option<String>,
        source: TransactionSource,
    ) -> Self {
        Self {
            parent_category: parent_category.to_string(),
            sub_category: sub_category.to_string(),
            amount,
            description: description.to_string(),
            source,
            comment,
            transaction_type: TransactionType::for_amount(amount),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BillMetadata {
    /// Raw `YYYYMM` digits from the date line, empty when absent.
    pub date: String,
    pub remark: String,
}

impl BillMetadata {
    pub fn period(&self) -> Option<(i32, u32)> {
        parse_period(&self.date)
    }
}

/// Split `YYYYMM` into (year, month). Months outside 1..=12 are rejected.
pub fn parse_period(date: &str) -> Option<(i32, u32)> {
    if date.len() != 6 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = date[..4].parse().ok()?;
    let month: u32 = date[4..].parse().ok()?;
    chrono::NaiveDate::from_ymd_opt(year, month, 1).map(|_| (year, month))
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubCategory {
    pub title: String,
    pub transactions: Vec<Transaction>,
}

impl SubCategory {
    pub fn sub_total(&self) -> f64 {
        self.transactions.iter().map(|t| t.amount).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParentCategory {
    pub title: String,
    pub display_name: String,
    pub sub_categories: Vec<SubCategory>,
}

impl ParentCategory {
    pub fn parent_total(&self) -> f64 {
        self.sub_categories.iter().map(|s| s.sub_total()).sum()
    }

    pub fn sub(&self, title: &str) -> Option<&SubCategory> {
        self.sub_categories.iter().find(|s| s.title == title)
    }

    /// Find or append the named sub-category, keeping first-seen order.
    pub fn sub_mut_or_insert(&mut self, title: &str) -> &mut SubCategory {
        let idx = match self.sub_categories.iter().position(|s| s.title == title) {
            Some(idx) => idx,
            None => {
                self.sub_categories.push(SubCategory {
                    title: title.to_string(),
                    transactions: Vec::new(),
                });
                self.sub_categories.len() - 1
            }
        };
        &mut self.sub_categories[idx]
    }
}

/// One bill file after parsing: metadata plus the parent/sub/transaction tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBill {
    pub metadata: BillMetadata,
    pub categories: Vec<ParentCategory>,
    pub renewals_applied: bool,
}

impl ParsedBill {
    pub fn parent(&self, title: &str) -> Option<&ParentCategory> {
        self.categories.iter().find(|p| p.title == title)
    }

    pub fn parent_mut(&mut self, title: &str) -> Option<&mut ParentCategory> {
        self.categories.iter_mut().find(|p| p.title == title)
    }

    pub fn parent_mut_or_insert(&mut self, title: &str, display_name: &str) -> &mut ParentCategory {
        let idx = match self.categories.iter().position(|p| p.title == title) {
            Some(idx) => idx,
            None => {
                self.categories.push(ParentCategory {
                    title: title.to_string(),
                    display_name: display_name.to_string(),
                    sub_categories: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        &mut self.categories[idx]
    }

    /// Append a transaction under its own (parent, sub), creating either if needed.
    pub fn push_transaction(&mut self, txn: Transaction) {
        let parent = txn.parent_category.clone();
        let sub = txn.sub_category.clone();
        self.parent_mut_or_insert(&parent, &parent)
            .sub_mut_or_insert(&sub)
            .transactions
            .push(txn);
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.categories
            .iter()
            .flat_map(|p| p.sub_categories.iter())
            .flat_map(|s| s.transactions.iter())
    }

    pub fn total_amount(&self) -> f64 {
        self.transactions().map(|t| t.amount).sum()
    }

    pub fn total_income(&self) -> f64 {
        self.transactions()
            .filter(|t| t.transaction_type == TransactionType::Income)
            .map(|t| t.amount)
            .sum()
    }

    pub fn total_expense(&self) -> f64 {
        self.transactions()
            .filter(|t| t.transaction_type == TransactionType::Expense)
            .map(|t| t.amount)
            .sum()
    }
}

// ---------------------------------------------------------------------------
// JSON bill document
// ---------------------------------------------------------------------------

struct CategoriesDoc<'a>(&'a [ParentCategory]);

struct ParentDoc<'a>(&'a ParentCategory);

#[derive(Serialize)]
struct TransactionDoc<'a> {
    sub_category: &'a str,
    description: &'a str,
    amount: f64,
    source: TransactionSource,
    transaction_type: TransactionType,
    comment: Option<&'a str>,
}

impl Serialize for ParsedBill {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("ParsedBill", 7)?;
        doc.serialize_field("date", &self.metadata.date)?;
        doc.serialize_field("remark", &self.metadata.remark)?;
        doc.serialize_field("total_amount", &round2(self.total_amount()))?;
        doc.serialize_field("total_income", &round2(self.total_income()))?;
        doc.serialize_field("total_expense", &round2(self.total_expense()))?;
        doc.serialize_field("balance", &round2(self.total_income() + self.total_expense()))?;
        doc.serialize_field("categories", &CategoriesDoc(&self.categories))?;
        doc.end()
    }
}

impl Serialize for CategoriesDoc<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for parent in self.0 {
            map.serialize_entry(&parent.title, &ParentDoc(parent))?;
        }
        map.end()
    }
}

impl Serialize for ParentDoc<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let parent = self.0;
        let transactions: Vec<TransactionDoc> = parent
            .sub_categories
            .iter()
            .flat_map(|s| s.transactions.iter())
            .map(|t| TransactionDoc {
                sub_category: &t.sub_category,
                description: &t.description,
                amount: t.amount,
                source: t.source,
                transaction_type: t.transaction_type,
                comment: t.comment.as_deref(),
            })
            .collect();
        let mut doc = serializer.serialize_struct("ParentCategory", 3)?;
        doc.serialize_field("display_name", &parent.display_name)?;
        doc.serialize_field("sub_total", &round2(parent.parent_total()))?;
        doc.serialize_field("transactions", &transactions)?;
        doc.end()
    }
}

fn round2(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}
