use std::sync::OnceLock;

use regex::Regex;

pub const DATE_MARKER: &str = "date:";
pub const REMARK_MARKER: &str = "remark:";

/// One classified line of a bill file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// `date:YYYYMM`, carrying the six digits.
    Date(String),
    /// `remark:` followed by free text.
    Remark(String),
    ParentHeader(String),
    SubHeader(String),
    /// A transaction line: the amount expression and everything after it.
    ContentLine { amount: String, remainder: String },
    Empty,
    Unrecognized { raw: String, line_no: usize },
}

impl Token {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Date(_) => "date line",
            Self::Remark(_) => "remark line",
            Self::ParentHeader(_) => "parent header",
            Self::SubHeader(_) => "sub-category header",
            Self::ContentLine { .. } => "content line",
            Self::Empty => "empty line",
            Self::Unrecognized { .. } => "unrecognized line",
        }
    }
}

/// A token together with the 1-based line it came from and the trimmed source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub number: usize,
    pub text: String,
    pub token: Token,
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^date:\s*(\d{6})$").expect("invalid date regex"))
}

fn remark_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^remark:(.*)$").expect("invalid remark regex"))
}

fn content_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([+-]?\s*\d+(?:\.\d+)?(?:\s*[+-]\s*\d+(?:\.\d+)?)*)(.*)$")
            .expect("invalid content regex")
    })
}

fn sub_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z_]+$").expect("invalid sub header regex"))
}

fn parent_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\p{Lu}").expect("invalid parent header regex"))
}

/// Classify a single line. Match order matters: numeric lines must never be read
/// as headers and metadata lines are not re-tested against header patterns.
pub fn classify(line_no: usize, line: &str) -> Token {
    let line = line.trim();
    if line.is_empty() {
        return Token::Empty;
    }
    if let Some(caps) = date_re().captures(line) {
        return Token::Date(caps[1].to_string());
    }
    if let Some(caps) = remark_re().captures(line) {
        return Token::Remark(caps[1].trim().to_string());
    }
    if let Some(caps) = content_re().captures(line) {
        return Token::ContentLine {
            amount: caps[1].to_string(),
            remainder: caps[2].to_string(),
        };
    }
    if sub_header_re().is_match(line) {
        return Token::SubHeader(line.to_string());
    }
    if parent_header_re().is_match(line) {
        return Token::ParentHeader(line.to_string());
    }
    Token::Unrecognized {
        raw: line.to_string(),
        line_no,
    }
}

/// Classify every line of `lines`, numbering from 1. Lines that start with one of
/// `extra_prefixes` are extra metadata and come back as [`Token::Empty`].
pub fn tokenize<'a, I>(lines: I, extra_prefixes: &[String]) -> Vec<Line>
where
    I: IntoIterator<Item = &'a str>,
{
    lines
        .into_iter()
        .enumerate()
        .map(|(idx, raw)| {
            let number = idx + 1;
            let text = raw.trim().to_string();
            let token = if is_extra_metadata(&text, extra_prefixes) {
                Token::Empty
            } else {
                classify(number, &text)
            };
            Line { number, text, token }
        })
        .collect()
}

fn is_extra_metadata(line: &str, prefixes: &[String]) -> bool {
    let lower = line.to_lowercase();
    prefixes
        .iter()
        .map(|p| p.to_lowercase())
        .filter(|p| !p.is_empty() && p != DATE_MARKER && p != REMARK_MARKER)
        .any(|p| lower.starts_with(&p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_lines_are_empty() {
        assert_eq!(classify(1, ""), Token::Empty);
        assert_eq!(classify(1, "   \t "), Token::Empty);
    }

    #[test]
    fn test_date_line() {
        assert_eq!(classify(1, "DATE:202401"), Token::Date("202401".to_string()));
        assert_eq!(classify(1, "date:202312"), Token::Date("202312".to_string()));
        assert_eq!(classify(1, "  date:202312  "), Token::Date("202312".to_string()));
    }

    #[test]
    fn test_date_with_wrong_digit_count_is_not_a_date() {
        assert!(matches!(classify(1, "DATE:2024011"), Token::ParentHeader(_)));
        assert!(matches!(classify(1, "date:2024"), Token::Unrecognized { .. }));
    }

    #[test]
    fn test_remark_line() {
        assert_eq!(classify(2, "REMARK:test"), Token::Remark("test".to_string()));
        assert_eq!(classify(2, "remark:"), Token::Remark(String::new()));
        // Never re-read as a parent header even though it starts uppercase.
        assert_eq!(
            classify(2, "REMARK: Moved House"),
            Token::Remark("Moved House".to_string())
        );
    }

    #[test]
    fn test_content_lines() {
        assert_eq!(
            classify(5, "50 rice //staple"),
            Token::ContentLine {
                amount: "50".to_string(),
                remainder: " rice //staple".to_string()
            }
        );
        assert_eq!(
            classify(5, "12.5coffee"),
            Token::ContentLine {
                amount: "12.5".to_string(),
                remainder: "coffee".to_string()
            }
        );
        assert_eq!(
            classify(5, "-27.21-6.12 taxi"),
            Token::ContentLine {
                amount: "-27.21-6.12".to_string(),
                remainder: " taxi".to_string()
            }
        );
    }

    #[test]
    fn test_digit_lines_are_never_headers() {
        assert!(matches!(classify(3, "2024"), Token::ContentLine { .. }));
        assert!(matches!(classify(3, "1 Apple"), Token::ContentLine { .. }));
    }

    #[test]
    fn test_headers() {
        assert_eq!(classify(3, "Food"), Token::ParentHeader("Food".to_string()));
        assert_eq!(
            classify(3, "Food & Drink"),
            Token::ParentHeader("Food & Drink".to_string())
        );
        assert_eq!(classify(4, "groceries"), Token::SubHeader("groceries".to_string()));
        assert_eq!(
            classify(4, "eating_out"),
            Token::SubHeader("eating_out".to_string())
        );
    }

    #[test]
    fn test_unrecognized_carries_line_number() {
        assert_eq!(
            classify(7, "groceries2"),
            Token::Unrecognized {
                raw: "groceries2".to_string(),
                line_no: 7
            }
        );
        assert!(matches!(classify(8, "// orphan comment"), Token::Unrecognized { .. }));
        assert!(matches!(classify(9, "snacks and more"), Token::Unrecognized { .. }));
    }

    #[test]
    fn test_tokenize_numbers_from_one() {
        let lines = tokenize(["DATE:202401", "", "Food"], &[]);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].number, 1);
        assert_eq!(lines[1].token, Token::Empty);
        assert_eq!(lines[2].number, 3);
        assert_eq!(lines[2].token, Token::ParentHeader("Food".to_string()));
    }

    #[test]
    fn test_tokenize_skips_extra_metadata_prefixes() {
        let prefixes = vec!["author:".to_string()];
        let lines = tokenize(["Author: someone", "Food"], &prefixes);
        assert_eq!(lines[0].token, Token::Empty);
        assert_eq!(lines[1].token, Token::ParentHeader("Food".to_string()));
    }

    #[test]
    fn test_date_and_remark_markers_are_never_skipped() {
        let prefixes = vec!["DATE:".to_string(), "remark:".to_string()];
        let lines = tokenize(["date:202401", "remark:x"], &prefixes);
        assert_eq!(lines[0].token, Token::Date("202401".to_string()));
        assert_eq!(lines[1].token, Token::Remark("x".to_string()));
    }
}
