use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use trl_core::errors::AuditError;
use trl_core::traits::{AuditRecord, AuditSink};

const GENESIS: &str = "genesis";

fn line_hash(line: &str) -> String {
    format!("sha256:{:x}", Sha256::digest(line.as_bytes()))
}

fn last_line(content: &str) -> Option<&str> {
    content.lines().rev().find(|line| !line.trim().is_empty())
}

/// Append a record to a JSONL audit log, chaining it to the previous line.
///
/// The record's `prev_hash` is the SHA-256 of the previous raw line, or
/// `genesis` for the first entry. Returns the hash of the appended line.
pub fn append_audit(path: &Path, record: &AuditRecord) -> Result<String> {
    let content = if path.exists() {
        std::fs::read_to_string(path)
            .with_context(|| format!("cannot read audit {}", path.display()))?
    } else {
        String::new()
    };
    let prev_hash = last_line(&content)
        .map(line_hash)
        .unwrap_or_else(|| GENESIS.to_string());

    let mut record = record.clone();
    record.prev_hash = Some(prev_hash);
    let line = serde_json::to_string(&record)?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("cannot open audit {}", path.display()))?;
    if !content.is_empty() && !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    writeln!(file, "{line}").with_context(|| format!("cannot write audit {}", path.display()))?;

    Ok(line_hash(&line))
}

/// Verify the hash chain, returning the number of entries.
pub fn verify_chain(path: &Path) -> Result<u64> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read audit {}", path.display()))?;

    let mut count = 0u64;
    let mut prev_hash = GENESIS.to_string();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: serde_json::Value = serde_json::from_str(line)
            .with_context(|| format!("invalid JSON at line {}", i + 1))?;
        let entry_prev = entry
            .get("prev_hash")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(GENESIS);
        if entry_prev != prev_hash {
            return Err(anyhow::Error::new(AuditError::ChainCorruption(count)).context(format!(
                "hash chain broken at entry {count}: expected prev_hash '{prev_hash}', got '{entry_prev}'"
            )));
        }
        prev_hash = line_hash(line);
        count += 1;
    }
    Ok(count)
}

/// Read every record in order.
pub fn read_records(path: &Path) -> Result<Vec<AuditRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read audit {}", path.display()))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("{}: invalid record at line {}", path.display(), i + 1))
        })
        .collect()
}

/// [`AuditSink`] backed by a JSONL file.
pub struct JsonlAuditSink {
    path: PathBuf,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, entry: &AuditRecord) -> Result<(), AuditError> {
        append_audit(&self.path, entry)
            .map(|_| ())
            .map_err(|e| AuditError::WriteFailure(format!("{e:#}")))
    }
}
