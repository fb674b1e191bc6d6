use std::path::Path;

use crate::error::{BillError, Result};
use crate::validator::validate_file;

pub fn run(files: &[String], strict: bool) -> Result<()> {
    let settings = super::settings()?;
    let mut first_failure: Option<(String, usize)> = None;

    for file in files {
        let result = validate_file(Path::new(file), &settings)?;
        print!("{}", result.report(file));
        if result.has_errors() && first_failure.is_none() {
            first_failure = Some((file.clone(), result.errors.len()));
        }
    }

    match first_failure {
        Some((path, errors)) if strict => Err(BillError::Validation { path, errors }),
        _ => Ok(()),
    }
}
