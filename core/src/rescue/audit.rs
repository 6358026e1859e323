//! Encrypted audit log
//!
//! One sealed JSON line per terminal rescue outcome. Records carry spend
//! material on success so the deposited note stays recoverable, which is why
//! every line goes through the envelope; plaintext never reaches disk.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use lifeboat_pool::{SealedRecord, open, seal};

use crate::rescue::plan::DiscoveredAsset;

/// One asset line inside a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditAsset {
    pub label: String,
    pub amount: u64,
    pub usd_value: Option<f64>,
}

impl From<&DiscoveredAsset> for AuditAsset {
    fn from(asset: &DiscoveredAsset) -> Self {
        Self {
            label: asset.label(),
            amount: asset.amount,
            usd_value: asset.usd_value,
        }
    }
}

/// One terminal outcome, as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescueRecord {
    pub unix_timestamp: u64,
    pub source: String,
    pub destination: String,
    pub outcome: String,
    pub bundle_id: Option<String>,
    pub signatures: Vec<String>,
    pub assets: Vec<AuditAsset>,
    /// Commitments minted across failed attempts, hex
    pub commitments: Vec<String>,
    /// Spend material of the landed deposit, hex; only on success
    pub spend_secret: Option<String>,
    pub spend_nullifier: Option<String>,
}

/// Append-only log of sealed records
pub struct AuditLog {
    path: PathBuf,
    passphrase: String,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            passphrase: passphrase.into(),
        }
    }

    /// Seal and append one record as a JSON line.
    pub fn append(&self, record: &RescueRecord) -> Result<()> {
        let plaintext = serde_json::to_vec(record).context("serializing audit record")?;
        let sealed = seal(&self.passphrase, &plaintext, &mut rand::rngs::OsRng);
        let line = serde_json::to_string(&sealed).context("serializing sealed envelope")?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening audit log {}", self.path.display()))?;
        writeln!(file, "{line}").context("appending audit record")?;
        Ok(())
    }

    /// Open every record in the log. Fails on the first line the passphrase
    /// does not open, rather than silently skipping tampered entries.
    pub fn read_all(&self) -> Result<Vec<RescueRecord>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("opening audit log {}", self.path.display()))?;

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.context("reading audit log line")?;
            if line.trim().is_empty() {
                continue;
            }
            let sealed: SealedRecord = serde_json::from_str(&line)
                .with_context(|| format!("parsing sealed envelope at line {}", index + 1))?;
            let plaintext = open(&self.passphrase, &sealed)
                .with_context(|| format!("opening envelope at line {}", index + 1))?;
            let record: RescueRecord = serde_json::from_slice(&plaintext)
                .with_context(|| format!("parsing audit record at line {}", index + 1))?;
            records.push(record);
        }
        Ok(records)
    }
}
