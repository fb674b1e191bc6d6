use std::path::Path;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::error::{BillError, Result};
use crate::models::{BillMetadata, ParsedBill, Transaction, TransactionSource};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS bills (
    id INTEGER PRIMARY KEY,
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    remark TEXT NOT NULL DEFAULT '',
    total_income REAL NOT NULL,
    total_expense REAL NOT NULL,
    balance REAL NOT NULL,
    source_file TEXT,
    checksum TEXT NOT NULL,
    renewals_applied INTEGER NOT NULL DEFAULT 0,
    imported_at TEXT DEFAULT (datetime('now')),
    UNIQUE (year, month)
);

CREATE TABLE IF NOT EXISTS bill_transactions (
    id INTEGER PRIMARY KEY,
    bill_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    parent_category TEXT NOT NULL,
    sub_category TEXT NOT NULL,
    amount REAL NOT NULL,
    description TEXT NOT NULL,
    comment TEXT,
    source TEXT NOT NULL,
    FOREIGN KEY (bill_id) REFERENCES bills(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_bill_transactions_bill ON bill_transactions(bill_id);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(10))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// Same checksum as the stored bill; nothing written.
    Unchanged,
}

/// Store a bill under its (year, month), replacing whatever that period held.
/// The whole replacement runs in one IMMEDIATE transaction.
pub fn upsert_bill(
    conn: &mut Connection,
    bill: &ParsedBill,
    source_file: &str,
    checksum: &str,
) -> Result<UpsertOutcome> {
    let (year, month) = bill.metadata.period().ok_or_else(|| {
        BillError::InvalidPeriod(format!("{source_file}: date '{}'", bill.metadata.date))
    })?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing: Option<(i64, String)> = tx
        .query_row(
            "SELECT id, checksum FROM bills WHERE year = ?1 AND month = ?2",
            params![year, month],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let income = bill.total_income();
    let expense = bill.total_expense();

    let (bill_id, outcome) = match existing {
        Some((_, stored)) if stored == checksum => return Ok(UpsertOutcome::Unchanged),
        Some((id, _)) => {
            tx.execute("DELETE FROM bill_transactions WHERE bill_id = ?1", [id])?;
            tx.execute(
                "UPDATE bills SET remark = ?1, total_income = ?2, total_expense = ?3, balance = ?4,
                 source_file = ?5, checksum = ?6, renewals_applied = ?7, imported_at = datetime('now')
                 WHERE id = ?8",
                params![
                    bill.metadata.remark,
                    income,
                    expense,
                    income + expense,
                    source_file,
                    checksum,
                    bill.renewals_applied,
                    id
                ],
            )?;
            (id, UpsertOutcome::Replaced)
        }
        None => {
            tx.execute(
                "INSERT INTO bills (year, month, remark, total_income, total_expense, balance,
                 source_file, checksum, renewals_applied)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    year,
                    month,
                    bill.metadata.remark,
                    income,
                    expense,
                    income + expense,
                    source_file,
                    checksum,
                    bill.renewals_applied
                ],
            )?;
            (tx.last_insert_rowid(), UpsertOutcome::Inserted)
        }
    };

    {
        let mut stmt = tx.prepare(
            "INSERT INTO bill_transactions
             (bill_id, position, parent_category, sub_category, amount, description, comment, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (position, txn) in bill.transactions().enumerate() {
            stmt.execute(params![
                bill_id,
                position as i64,
                txn.parent_category,
                txn.sub_category,
                txn.amount,
                txn.description,
                txn.comment,
                txn.source.key(),
            ])?;
        }
    }

    tx.commit()?;
    Ok(outcome)
}

/// Load stored bills for a year, or a single month of it, in month order.
pub fn load_bills(conn: &Connection, year: i32, month: Option<u32>) -> Result<Vec<ParsedBill>> {
    let mut stmt = conn.prepare(
        "SELECT id, month, remark, renewals_applied FROM bills
         WHERE year = ?1 AND (?2 IS NULL OR month = ?2)
         ORDER BY month",
    )?;
    let heads = stmt
        .query_map(params![year, month], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut txn_stmt = conn.prepare(
        "SELECT parent_category, sub_category, amount, description, comment, source
         FROM bill_transactions WHERE bill_id = ?1 ORDER BY position",
    )?;

    let mut bills = Vec::with_capacity(heads.len());
    for (id, month, remark, renewals_applied) in heads {
        let mut bill = ParsedBill {
            metadata: BillMetadata {
                date: format!("{year:04}{month:02}"),
                remark,
            },
            categories: Vec::new(),
            renewals_applied,
        };
        let rows = txn_stmt.query_map([id], |row| {
            let source: String = row.get(5)?;
            Ok(Transaction::new(
                &row.get::<_, String>(0)?,
                &row.get::<_, String>(1)?,
                row.get(2)?,
                &row.get::<_, String>(3)?,
                row.get(4)?,
                TransactionSource::from_key(&source),
            ))
        })?;
        for txn in rows {
            bill.push_transaction(txn?);
        }
        bills.push(bill);
    }
    Ok(bills)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBill {
    pub year: i32,
    pub month: u32,
    pub remark: String,
    pub balance: f64,
    pub transactions: i64,
    pub source_file: Option<String>,
}

/// One row per stored period, newest first.
pub fn list_bills(conn: &Connection) -> Result<Vec<StoredBill>> {
    let mut stmt = conn.prepare(
        "SELECT b.year, b.month, b.remark, b.balance, count(t.id), b.source_file
         FROM bills b LEFT JOIN bill_transactions t ON t.bill_id = b.id
         GROUP BY b.id
         ORDER BY b.year DESC, b.month DESC",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredBill {
                year: row.get(0)?,
                month: row.get(1)?,
                remark: row.get(2)?,
                balance: row.get(3)?,
                transactions: row.get(4)?,
                source_file: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
