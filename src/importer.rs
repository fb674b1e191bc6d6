use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rusqlite::Connection;
use sha2::{Digest, Sha256};

use crate::db::{upsert_bill, UpsertOutcome};
use crate::error::{BillError, Result};
use crate::models::ParsedBill;
use crate::parser::parse_text;
use crate::renewal::{self, RenewalOutcome};
use crate::settings::Settings;
use crate::validator::{validate, ValidationResult};

/// Fingerprint of a bill file plus the settings that shape what gets stored.
pub fn compute_checksum(data: &[u8], settings: &Settings) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.update(serde_json::to_vec(&settings.metadata_prefixes)?);
    hasher.update(serde_json::to_vec(&settings.auto_renewal)?);
    Ok(hex::encode(hasher.finalize()))
}

/// One bill file taken through validate, parse and auto-renewal.
#[derive(Debug, Clone)]
pub struct IngestedBill {
    pub path: PathBuf,
    pub checksum: String,
    pub validation: ValidationResult,
    pub bill: ParsedBill,
    pub renewal: RenewalOutcome,
}

impl IngestedBill {
    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

pub fn ingest_file(path: &Path, settings: &Settings) -> Result<IngestedBill> {
    let data = std::fs::read(path).map_err(|source| BillError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    let text = String::from_utf8_lossy(&data);
    let checksum = compute_checksum(&data, settings)?;

    let validation = validate(&text, settings);
    let mut bill = parse_text(&text, settings);
    let renewal = if validation.is_valid() {
        renewal::apply(&mut bill, &settings.auto_renewal)
    } else {
        RenewalOutcome::default()
    };

    tracing::debug!(
        path = %path.display(),
        errors = validation.errors.len(),
        warnings = validation.warnings.len(),
        transactions = bill.transactions().count(),
        "bill ingested"
    );

    Ok(IngestedBill {
        path: path.to_path_buf(),
        checksum,
        validation,
        bill,
        renewal,
    })
}

/// Workers used for a batch of `jobs` files: one per core, never more than the jobs.
fn worker_count(jobs: usize) -> usize {
    let cores = std::thread::available_parallelism().map_or(4, |n| n.get());
    cores.min(jobs).max(1)
}

/// Ingest several files on a fixed pool of scoped workers pulling from a
/// shared index. Results keep input order.
pub fn ingest_files(paths: &[PathBuf], settings: &Settings) -> Vec<Result<IngestedBill>> {
    if paths.is_empty() {
        return Vec::new();
    }
    let next = AtomicUsize::new(0);
    let mut slots: Vec<Option<Result<IngestedBill>>> = paths.iter().map(|_| None).collect();

    let started = std::thread::scope(|s| {
        let handles: Vec<_> = (0..worker_count(paths.len()))
            .filter_map(|id| {
                let next = &next;
                std::thread::Builder::new()
                    .name(format!("ingest-{id}"))
                    .spawn_scoped(s, move || {
                        let mut done = Vec::new();
                        loop {
                            let idx = next.fetch_add(1, Ordering::Relaxed);
                            let Some(path) = paths.get(idx) else { break };
                            done.push((idx, ingest_file(path, settings)));
                        }
                        done
                    })
                    .map_err(|e| tracing::warn!(worker = id, error = %e, "ingest worker not started"))
                    .ok()
            })
            .collect();

        let started = handles.len();
        for handle in handles {
            match handle.join() {
                Ok(done) => {
                    for (idx, result) in done {
                        slots[idx] = Some(result);
                    }
                }
                Err(_) => tracing::error!("ingest worker panicked"),
            }
        }
        started
    });

    if started == 0 {
        return paths.iter().map(|path| ingest_file(path, settings)).collect();
    }
    tracing::debug!(files = paths.len(), workers = started, "batch ingested");

    slots
        .into_iter()
        .zip(paths)
        .map(|(slot, path)| {
            slot.unwrap_or_else(|| {
                Err(BillError::Other(format!("no ingest result for {}", path.display())))
            })
        })
        .collect()
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub unchanged: usize,
    pub warnings: usize,
    /// (file, reason) for every file that was not stored.
    pub rejected: Vec<(String, String)>,
}

impl ImportSummary {
    pub fn stored(&self) -> usize {
        self.inserted + self.replaced
    }
}

/// Validate, parse and store a batch of bill files.
///
/// Without `keep_going` the batch is all-or-nothing: the first unreadable or
/// invalid file is returned as an error and nothing is written. With it, bad
/// files are listed in [`ImportSummary::rejected`] and the rest are stored.
pub fn import_files(
    conn: &mut Connection,
    paths: &[PathBuf],
    settings: &Settings,
    keep_going: bool,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();
    let mut ready = Vec::new();

    for result in ingest_files(paths, settings) {
        let ingested = match result {
            Ok(ingested) => ingested,
            Err(e) if keep_going => {
                let path = match &e {
                    BillError::Unreadable { path, .. } => path.clone(),
                    _ => String::new(),
                };
                tracing::warn!(error = %e, "file skipped");
                summary.rejected.push((path, e.to_string()));
                continue;
            }
            Err(e) => return Err(e),
        };

        summary.warnings += ingested.validation.warnings.len();
        if ingested.validation.has_errors() {
            let err = BillError::Validation {
                path: ingested.display_path(),
                errors: ingested.validation.errors.len(),
            };
            if !keep_going {
                return Err(err);
            }
            tracing::warn!(error = %err, "file skipped");
            summary.rejected.push((ingested.display_path(), err.to_string()));
            continue;
        }
        ready.push(ingested);
    }

    for ingested in ready {
        let source = ingested.display_path();
        match upsert_bill(conn, &ingested.bill, &source, &ingested.checksum) {
            Ok(UpsertOutcome::Inserted) => summary.inserted += 1,
            Ok(UpsertOutcome::Replaced) => summary.replaced += 1,
            Ok(UpsertOutcome::Unchanged) => summary.unchanged += 1,
            Err(e) if keep_going => {
                tracing::warn!(path = %source, error = %e, "bill not stored");
                summary.rejected.push((source, e.to_string()));
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        inserted = summary.inserted,
        replaced = summary.replaced,
        unchanged = summary.unchanged,
        rejected = summary.rejected.len(),
        "import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db, load_bills};
    use crate::models::TransactionSource;
    use crate::settings::AutoRenewalRule;

    const JAN: &str = "date:202401\nremark:test\nFood\ngroceries\n50 rice //staple\n30 milk\n";
    const FEB: &str = "date:202402\nremark:\nHome\nrent\n-900 flat\n";
    const BROKEN: &str = "date:202403\nremark:\nFood\n5 orphan\n";

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn renewing_settings() -> Settings {
        let mut settings = Settings::default();
        settings.auto_renewal.enabled = true;
        settings.auto_renewal.rules.push(AutoRenewalRule {
            header_location: "Food.groceries".to_string(),
            amount: 99.0,
            description: "rent".to_string(),
        });
        settings
    }

    #[test]
    fn test_checksum_is_stable_and_settings_aware() {
        let settings = Settings::default();
        let a = compute_checksum(b"abc", &settings).unwrap();
        assert_eq!(a, compute_checksum(b"abc", &settings).unwrap());
        assert_eq!(a.len(), 64);
        assert_ne!(a, compute_checksum(b"abd", &settings).unwrap());
        assert_ne!(a, compute_checksum(b"abc", &renewing_settings()).unwrap());
    }

    #[test]
    fn test_ingest_applies_renewals() {
        let (dir, _conn) = test_db();
        let path = write(dir.path(), "jan.txt", JAN);
        let ingested = ingest_file(&path, &renewing_settings()).unwrap();
        assert!(ingested.validation.is_valid());
        assert_eq!(ingested.renewal.injected, 1);
        assert_eq!(ingested.bill.total_amount(), 179.0);
        assert_eq!(
            ingested.bill.transactions().last().unwrap().source,
            TransactionSource::AutoRenewal
        );
    }

    #[test]
    fn test_ingest_invalid_bill_skips_renewals() {
        let (dir, _conn) = test_db();
        let path = write(dir.path(), "bad.txt", BROKEN);
        let ingested = ingest_file(&path, &renewing_settings()).unwrap();
        assert!(ingested.validation.has_errors());
        assert_eq!(ingested.renewal.injected, 0);
    }

    #[test]
    fn test_ingest_missing_file() {
        let err = ingest_file(Path::new("/nonexistent/bill.txt"), &Settings::default()).unwrap_err();
        assert!(matches!(err, BillError::Unreadable { .. }));
    }

    #[test]
    fn test_ingest_files_keeps_order() {
        let (dir, _conn) = test_db();
        let paths = vec![
            write(dir.path(), "a.txt", FEB),
            write(dir.path(), "b.txt", JAN),
            dir.path().join("missing.txt"),
        ];
        let results = ingest_files(&paths, &Settings::default());
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().bill.metadata.date, "202402");
        assert_eq!(results[1].as_ref().unwrap().bill.metadata.date, "202401");
        assert!(results[2].is_err());
    }

    #[test]
    fn test_worker_count_is_bounded() {
        assert_eq!(worker_count(1), 1);
        assert_eq!(worker_count(0), 1);
        let cores = std::thread::available_parallelism().map_or(4, |n| n.get());
        assert_eq!(worker_count(10_000), cores);
    }

    #[test]
    fn test_ingest_many_files_keeps_order() {
        let (dir, _conn) = test_db();
        let paths: Vec<PathBuf> = (0..64)
            .map(|i| {
                let month = i % 12 + 1;
                let text = format!("date:2024{month:02}\nremark:file {i}\nFood\ngroceries\n{i} item\n");
                write(dir.path(), &format!("{i:02}.txt"), &text)
            })
            .collect();
        let results = ingest_files(&paths, &Settings::default());
        assert_eq!(results.len(), 64);
        for (i, result) in results.iter().enumerate() {
            let ingested = result.as_ref().unwrap();
            assert_eq!(ingested.path, paths[i]);
            assert_eq!(ingested.bill.metadata.remark, format!("file {i}"));
            assert_eq!(ingested.bill.total_amount(), i as f64);
        }
        assert!(ingest_files(&[], &Settings::default()).is_empty());
    }

    #[test]
    fn test_import_files_stores_bills() {
        let (dir, mut conn) = test_db();
        let paths = vec![write(dir.path(), "jan.txt", JAN), write(dir.path(), "feb.txt", FEB)];
        let summary = import_files(&mut conn, &paths, &Settings::default(), false).unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.stored(), 2);
        assert!(summary.rejected.is_empty());

        let again = import_files(&mut conn, &paths, &Settings::default(), false).unwrap();
        assert_eq!(again.unchanged, 2);
        assert_eq!(again.stored(), 0);

        assert_eq!(load_bills(&conn, 2024, None).unwrap().len(), 2);
    }

    #[test]
    fn test_import_aborts_without_writing() {
        let (dir, mut conn) = test_db();
        let paths = vec![write(dir.path(), "jan.txt", JAN), write(dir.path(), "bad.txt", BROKEN)];
        let err = import_files(&mut conn, &paths, &Settings::default(), false).unwrap_err();
        assert!(matches!(err, BillError::Validation { errors, .. } if errors > 0));
        assert!(load_bills(&conn, 2024, None).unwrap().is_empty());
    }

    #[test]
    fn test_import_keep_going() {
        let (dir, mut conn) = test_db();
        let paths = vec![
            write(dir.path(), "jan.txt", JAN),
            write(dir.path(), "bad.txt", BROKEN),
            dir.path().join("missing.txt"),
        ];
        let summary = import_files(&mut conn, &paths, &Settings::default(), true).unwrap();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.rejected.len(), 2);
        assert!(summary.rejected[0].0.ends_with("bad.txt"));
        assert!(summary.rejected[1].0.ends_with("missing.txt"));
    }

    #[test]
    fn test_changed_renewal_rules_reimport() {
        let (dir, mut conn) = test_db();
        let paths = vec![write(dir.path(), "jan.txt", JAN)];
        import_files(&mut conn, &paths, &Settings::default(), false).unwrap();
        let summary = import_files(&mut conn, &paths, &renewing_settings(), false).unwrap();
        assert_eq!(summary.replaced, 1);
        let bills = load_bills(&conn, 2024, Some(1)).unwrap();
        assert_eq!(bills[0].total_amount(), 179.0);
    }
}
