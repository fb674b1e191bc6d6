use crate::classifier::{tokenize, Token};
use crate::models::{BillMetadata, ParsedBill, Transaction, TransactionSource};
use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Content lines
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ContentParts {
    pub amount: f64,
    pub description: String,
    pub comment: String,
}

/// Evaluate an amount expression such as `12`, `-3.5` or `-27.21-6.12`.
pub fn evaluate_amount(expr: &str) -> Option<f64> {
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }
    let mut total = 0.0;
    let mut term = String::new();
    for (i, c) in compact.char_indices() {
        if (c == '+' || c == '-') && i > 0 {
            total += term.parse::<f64>().ok()?;
            term.clear();
        }
        term.push(c);
    }
    total += term.parse::<f64>().ok()?;
    Some(total)
}

fn split_comment(rest: &str) -> (String, String) {
    match rest.split_once("//") {
        Some((desc, comment)) => (desc.trim().to_string(), comment.trim().to_string()),
        None => (rest.trim().to_string(), String::new()),
    }
}

/// Build content parts from a classified content line. An amount that does not
/// evaluate yields amount 0 with the whole line as description.
pub fn content_from_token(amount: &str, remainder: &str) -> ContentParts {
    match evaluate_amount(amount) {
        Some(value) => {
            let (description, comment) = split_comment(remainder);
            ContentParts {
                amount: value,
                description,
                comment,
            }
        }
        None => fail_soft(&format!("{amount}{remainder}")),
    }
}

fn fail_soft(line: &str) -> ContentParts {
    tracing::debug!(line, "content line without a usable amount, defaulting to 0");
    let (description, comment) = split_comment(line);
    ContentParts {
        amount: 0.0,
        description,
        comment,
    }
}

// ---------------------------------------------------------------------------
// Bill parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct BillParser<'a> {
    settings: &'a Settings,
}

impl<'a> BillParser<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Build the bill tree. Never fails: malformed lines are skipped so a
    /// best-effort structure is always returned.
    pub fn parse<'l, I>(&self, lines: I) -> ParsedBill
    where
        I: IntoIterator<Item = &'l str>,
    {
        let mut bill = ParsedBill::default();
        let mut metadata = BillMetadata::default();
        let mut current_parent: Option<String> = None;
        let mut current_sub: Option<String> = None;

        for line in tokenize(lines, &self.settings.metadata_prefixes) {
            match line.token {
                Token::Empty => {}
                Token::Date(digits) => {
                    if metadata.date.is_empty() {
                        metadata.date = digits;
                    }
                }
                Token::Remark(text) => {
                    if metadata.remark.is_empty() {
                        metadata.remark = text;
                    }
                }
                Token::ParentHeader(title) => {
                    let display = self.settings.display_name(&title).to_string();
                    bill.parent_mut_or_insert(&title, &display);
                    current_parent = Some(title);
                    current_sub = None;
                }
                Token::SubHeader(title) => match &current_parent {
                    Some(parent) => {
                        if let Some(p) = bill.parent_mut(parent) {
                            p.sub_mut_or_insert(&title);
                        }
                        current_sub = Some(title);
                    }
                    None => {
                        tracing::debug!(line = line.number, sub = %title, "sub-category before any parent, skipped");
                    }
                },
                Token::ContentLine { amount, remainder } => {
                    let (Some(parent), Some(sub)) = (&current_parent, &current_sub) else {
                        tracing::debug!(line = line.number, "content line outside a sub-category, skipped");
                        continue;
                    };
                    let parts = content_from_token(&amount, &remainder);
                    let comment = (!parts.comment.is_empty()).then_some(parts.comment);
                    let txn = Transaction::new(
                        parent,
                        sub,
                        parts.amount,
                        &parts.description,
                        comment,
                        TransactionSource::Manual,
                    );
                    if let Some(p) = bill.parent_mut(parent) {
                        p.sub_mut_or_insert(sub).transactions.push(txn);
                    }
                }
                Token::Unrecognized { line_no, .. } => {
                    tracing::debug!(line = line_no, "unrecognized line skipped");
                }
            }
        }

        bill.metadata = metadata;
        bill
    }
}

pub fn parse_text(text: &str, settings: &Settings) -> ParsedBill {
    BillParser::new(settings).parse(text.lines())
}
