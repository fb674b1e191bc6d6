//! Grammar validation for bill files.
//!
//! Validation is an explicit state machine: [`transition`] maps the current
//! [`State`] and one classified [`Line`] to the next state plus a list of
//! [`Event`]s. [`Validator::run`] folds those events into the recorded
//! parent/sub outline and a [`ValidationResult`]. Every defect in a file is
//! reported in one pass; only a broken date/remark preamble stops the walk.

use std::path::Path;

use colored::Colorize;

use crate::classifier::{tokenize, Line, Token};
use crate::error::{BillError, Result};
use crate::models::parse_period;
use crate::settings::{EmptyParentPolicy, Settings};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn add_error(&mut self, message: String) {
        self.errors.push(message);
    }

    pub fn add_warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Warnings never fail validation.
    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }

    pub fn report(&self, name: &str) -> String {
        let mut out = format!("--- Validation Report: {name} ---\n");
        if self.errors.is_empty() && self.warnings.is_empty() {
            out.push_str("Validation passed, no errors or warnings found.\n");
            return out;
        }
        if !self.errors.is_empty() {
            let header = format!("Found {} error(s):", self.errors.len());
            out.push_str(&format!("{}\n", header.red()));
            for e in &self.errors {
                out.push_str(&format!("- {e}\n"));
            }
        }
        if !self.warnings.is_empty() {
            let header = format!("Found {} warning(s):", self.warnings.len());
            out.push_str(&format!("{}\n", header.yellow()));
            for w in &self.warnings {
                out.push_str(&format!("- {w}\n"));
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preamble {
    Date,
    Remark,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    ExpectPreamble(Preamble),
    ExpectParent,
    ExpectSub { parent: String },
    ExpectContent { parent: String, sub: String },
    /// Entered after a fatal preamble error; the rest of the input is ignored.
    Halted,
}

impl State {
    pub fn initial() -> Self {
        Self::ExpectPreamble(Preamble::Date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Error(String),
    Warning(String),
    OpenParent(String),
    OpenSub { parent: String, sub: String },
    Content { parent: String, sub: String },
}

fn empty_parent(policy: EmptyParentPolicy, message: String) -> Event {
    match policy {
        EmptyParentPolicy::Warn => Event::Warning(message),
        EmptyParentPolicy::Error => Event::Error(message),
    }
}

fn unrecognized(line: &Line) -> Event {
    Event::Error(format!("Line {}: unrecognized line '{}'", line.number, line.text))
}

/// One step of the validator.
pub fn transition(state: State, line: &Line, policy: EmptyParentPolicy) -> (State, Vec<Event>) {
    if line.token == Token::Empty {
        return (state, Vec::new());
    }
    let n = line.number;

    match state {
        State::Halted => (State::Halted, Vec::new()),

        State::ExpectPreamble(Preamble::Date) => match &line.token {
            Token::Date(digits) => {
                let mut events = Vec::new();
                if parse_period(digits).is_none() {
                    events.push(Event::Error(format!(
                        "Line {n}: date '{digits}' is not a valid YYYYMM month"
                    )));
                }
                (State::ExpectPreamble(Preamble::Remark), events)
            }
            _ => (
                State::Halted,
                vec![Event::Error(format!(
                    "Line {n}: expected 'date:YYYYMM' as the first line, found '{}'",
                    line.text
                ))],
            ),
        },

        State::ExpectPreamble(Preamble::Remark) => match &line.token {
            Token::Remark(_) => (State::ExpectParent, Vec::new()),
            _ => (
                State::Halted,
                vec![Event::Error(format!(
                    "Line {n}: expected 'remark:' after the date line, found '{}'",
                    line.text
                ))],
            ),
        },

        State::ExpectParent => match &line.token {
            Token::ParentHeader(name) => (
                State::ExpectSub {
                    parent: name.clone(),
                },
                vec![Event::OpenParent(name.clone())],
            ),
            Token::Unrecognized { .. } => (State::ExpectParent, vec![unrecognized(line)]),
            other => (
                State::ExpectParent,
                vec![Event::Error(format!(
                    "Line {n}: expected parent header, found {} '{}'",
                    other.kind(),
                    line.text
                ))],
            ),
        },

        State::ExpectSub { parent } => match &line.token {
            Token::SubHeader(sub) => (
                State::ExpectContent {
                    parent: parent.clone(),
                    sub: sub.clone(),
                },
                vec![Event::OpenSub {
                    parent,
                    sub: sub.clone(),
                }],
            ),
            Token::ParentHeader(next) => (
                State::ExpectSub {
                    parent: next.clone(),
                },
                vec![
                    empty_parent(
                        policy,
                        format!("Line {n}: parent category '{parent}' has no sub-categories"),
                    ),
                    Event::OpenParent(next.clone()),
                ],
            ),
            Token::Unrecognized { .. } => (State::ExpectSub { parent }, vec![unrecognized(line)]),
            other => {
                let event = Event::Error(format!(
                    "Line {n}: expected sub-category header under '{parent}', found {} '{}'",
                    other.kind(),
                    line.text
                ));
                (State::ExpectSub { parent }, vec![event])
            }
        },

        State::ExpectContent { parent, sub } => match &line.token {
            Token::ContentLine { .. } => {
                let event = Event::Content {
                    parent: parent.clone(),
                    sub: sub.clone(),
                };
                (State::ExpectContent { parent, sub }, vec![event])
            }
            Token::SubHeader(next) => (
                State::ExpectContent {
                    parent: parent.clone(),
                    sub: next.clone(),
                },
                vec![Event::OpenSub {
                    parent,
                    sub: next.clone(),
                }],
            ),
            Token::ParentHeader(next) => (
                State::ExpectSub {
                    parent: next.clone(),
                },
                vec![Event::OpenParent(next.clone())],
            ),
            Token::Unrecognized { .. } => {
                (State::ExpectContent { parent, sub }, vec![unrecognized(line)])
            }
            other => {
                let event = Event::Error(format!(
                    "Line {n}: unexpected {} '{}' inside sub-category '{sub}'",
                    other.kind(),
                    line.text
                ));
                (State::ExpectContent { parent, sub }, vec![event])
            }
        },
    }
}

/// Diagnostics for the state left over at end of input.
pub fn finish(state: &State, policy: EmptyParentPolicy) -> Vec<Event> {
    match state {
        State::ExpectPreamble(Preamble::Date) => vec![Event::Error(
            "End of file: missing 'date:YYYYMM' line".to_string(),
        )],
        State::ExpectPreamble(Preamble::Remark) => vec![Event::Error(
            "End of file: missing 'remark:' line".to_string(),
        )],
        State::ExpectSub { parent } => vec![empty_parent(
            policy,
            format!("End of file: parent category '{parent}' has no sub-categories"),
        )],
        State::ExpectParent | State::ExpectContent { .. } | State::Halted => Vec::new(),
    }
}

/// Parent → sub → content-line count, in first-seen order.
#[derive(Debug, Default)]
struct Outline {
    parents: Vec<(String, Vec<(String, usize)>)>,
}

impl Outline {
    fn parent_mut(&mut self, parent: &str) -> &mut Vec<(String, usize)> {
        let idx = match self.parents.iter().position(|(p, _)| p == parent) {
            Some(idx) => idx,
            None => {
                self.parents.push((parent.to_string(), Vec::new()));
                self.parents.len() - 1
            }
        };
        &mut self.parents[idx].1
    }

    fn sub_mut(&mut self, parent: &str, sub: &str) -> &mut usize {
        let subs = self.parent_mut(parent);
        let idx = match subs.iter().position(|(s, _)| s == sub) {
            Some(idx) => idx,
            None => {
                subs.push((sub.to_string(), 0));
                subs.len() - 1
            }
        };
        &mut subs[idx].1
    }

    fn empty_subs(&self) -> impl Iterator<Item = &str> {
        self.parents
            .iter()
            .flat_map(|(_, subs)| subs.iter())
            .filter(|(_, count)| *count == 0)
            .map(|(sub, _)| sub.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Validator {
    policy: EmptyParentPolicy,
    extra_prefixes: Vec<String>,
}

impl Validator {
    pub fn new(settings: &Settings) -> Self {
        Self {
            policy: settings.empty_parent_policy,
            extra_prefixes: settings.metadata_prefixes.clone(),
        }
    }

    pub fn run<'a, I>(&self, lines: I) -> ValidationResult
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut result = ValidationResult::default();
        let mut outline = Outline::default();
        let mut state = State::initial();

        for line in tokenize(lines, &self.extra_prefixes) {
            let (next, events) = transition(state, &line, self.policy);
            state = next;
            apply(events, &mut outline, &mut result);
        }
        apply(finish(&state, self.policy), &mut outline, &mut result);

        for sub in outline.empty_subs() {
            result.add_warning(format!("sub-category '{sub}' has no transactions"));
        }

        tracing::debug!(
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validation finished"
        );
        result
    }
}

fn apply(events: Vec<Event>, outline: &mut Outline, result: &mut ValidationResult) {
    for event in events {
        match event {
            Event::Error(msg) => result.add_error(msg),
            Event::Warning(msg) => result.add_warning(msg),
            Event::OpenParent(parent) => {
                outline.parent_mut(&parent);
            }
            Event::OpenSub { parent, sub } => {
                outline.sub_mut(&parent, &sub);
            }
            Event::Content { parent, sub } => *outline.sub_mut(&parent, &sub) += 1,
        }
    }
}

/// Validate bill text. The file passes iff the result carries no errors.
pub fn validate(text: &str, settings: &Settings) -> ValidationResult {
    Validator::new(settings).run(text.lines())
}

pub fn validate_file(path: &Path, settings: &Settings) -> Result<ValidationResult> {
    let text = std::fs::read_to_string(path).map_err(|source| BillError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    Ok(validate(&text, settings))
}
