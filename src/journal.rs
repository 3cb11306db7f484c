//! Execution journal — append-only CSV record of every execution attempt.
//!
//! A minimal cousin of the source codebase's tax/compliance CSV subsystem:
//! same append-on-open, write-headers-once, escape-commas style, scoped down
//! to what operators need for post-hoc review of attempts (no cost-basis or
//! tax-lot accounting).
//!
//! Author: AI-Generated
//! Created: 2026-02-06

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use alloy::primitives::U256;
use chrono::Utc;

use crate::types::AttemptStatus;

/// One row of the execution journal.
#[derive(Debug, Clone)]
pub struct JournalRecord {
    pub token_symbol: String,
    pub borrow_amount: U256,
    pub direction_label: String,
    pub expected_profit: f64,
    pub tx_hash: Option<String>,
    pub status: AttemptStatus,
    pub gas_used: Option<u64>,
    pub actual_profit: Option<i128>,
    pub notes: Option<String>,
}

pub struct ExecutionJournal {
    path: PathBuf,
    headers_written: bool,
}

impl ExecutionJournal {
    const HEADERS: &'static [&'static str] = &[
        "timestamp",
        "token_symbol",
        "borrow_amount",
        "direction",
        "expected_profit",
        "tx_hash",
        "status",
        "gas_used",
        "actual_profit",
        "notes",
    ];

    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let headers_written = path.exists();
        Ok(Self { path, headers_written })
    }

    pub fn append(&mut self, record: &JournalRecord) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        if !self.headers_written {
            self.write_headers(&mut file)?;
            self.headers_written = true;
        }

        self.write_record(&mut file, record)
    }

    fn write_headers(&self, file: &mut File) -> std::io::Result<()> {
        writeln!(file, "{}", Self::HEADERS.join(","))
    }

    fn write_record(&self, file: &mut File, record: &JournalRecord) -> std::io::Result<()> {
        let fields = vec![
            Utc::now().to_rfc3339(),
            record.token_symbol.clone(),
            record.borrow_amount.to_string(),
            record.direction_label.clone(),
            record.expected_profit.to_string(),
            record.tx_hash.clone().unwrap_or_else(|| "N/A".to_string()),
            record.status.to_string(),
            record.gas_used.map(|g| g.to_string()).unwrap_or_default(),
            record.actual_profit.map(|p| p.to_string()).unwrap_or_default(),
            escape_csv_field(&record.notes.clone().unwrap_or_default()),
        ];
        writeln!(file, "{}", fields.join(","))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn escape_csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dexarb_journal_test_{name}.csv"))
    }

    #[test]
    fn csv_escape_wraps_fields_with_commas_or_quotes() {
        assert_eq!(escape_csv_field("simple"), "simple");
        assert_eq!(escape_csv_field("has,comma"), "\"has,comma\"");
        assert_eq!(escape_csv_field("has\"quote"), "\"has\"\"quote\"");
    }

    #[test]
    fn first_write_creates_file_with_header() {
        let path = temp_path("header");
        let _ = fs::remove_file(&path);

        let mut journal = ExecutionJournal::new(&path).unwrap();
        assert!(!journal.headers_written);

        journal
            .append(&JournalRecord {
                token_symbol: "WETH".into(),
                borrow_amount: U256::from(1_000_000u64),
                direction_label: "WETH/USDC low->high".into(),
                expected_profit: 1.23,
                tx_hash: Some("0xabc".into()),
                status: AttemptStatus::Confirmed,
                gas_used: Some(180_000),
                actual_profit: Some(42),
                notes: None,
            })
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().next().unwrap().starts_with("timestamp,"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_tx_hash_writes_not_applicable() {
        let path = temp_path("na");
        let _ = fs::remove_file(&path);

        let mut journal = ExecutionJournal::new(&path).unwrap();
        journal
            .append(&JournalRecord {
                token_symbol: "USDC".into(),
                borrow_amount: U256::from(500_000u64),
                direction_label: "USDC/WETH high->low".into(),
                expected_profit: 0.0,
                tx_hash: None,
                status: AttemptStatus::RejectedPreflight,
                gas_used: None,
                actual_profit: None,
                notes: Some("below floor".into()),
            })
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("N/A"));
        assert!(content.contains("rejected_preflight"));

        let _ = fs::remove_file(&path);
    }
}
