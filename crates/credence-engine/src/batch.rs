//! Batch issuance pipeline.
//!
//! CSV upload flows through two stages. Parsing validates the file shape and
//! every row up front: structural problems (missing columns, too many rows,
//! no data) reject the whole upload, while per-row problems mark that row
//! skipped and never block its neighbours. Processing then mints the rows
//! that survived validation in paced chunks, one ledger transaction per row,
//! with row failures isolated the same way.
//!
//! The format is deliberately plain: comma-delimited, no quoting, fields must
//! not contain commas. Header names are matched case-insensitively.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use credence_core::{
    Address, ContentStore, CredentialId, CredentialTypeId, JobId, LedgerClient, Timestamp,
};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::issue;
use crate::store::EntityStore;

// ---------------------------------------------------------------------------
// Row-level validation messages (surfaced verbatim in upload reports)
// ---------------------------------------------------------------------------

pub const ERR_MISSING_WALLET: &str = "Missing wallet address";
pub const ERR_INVALID_WALLET: &str = "Invalid wallet address";
pub const ERR_MISSING_TYPE: &str = "Missing credential type ID";
pub const ERR_UNKNOWN_TYPE: &str = "Unknown or unauthorized credential type";

const COL_WALLET: &str = "wallet_address";
const COL_TYPE: &str = "credential_type_id";
const COL_EVIDENCE: &str = "evidence_hash";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    /// Validated, waiting to be minted.
    Pending,
    /// Rejected during parsing; never processed.
    Skipped,
    /// Minted successfully.
    Issued,
    /// Mint attempted and failed.
    Failed,
}

/// One data row of an upload, in file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRow {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub wallet_address: String,
    pub credential_type_id: String,
    pub evidence_hash: Option<String>,
    pub status: RowStatus,
    pub error: Option<String>,
    pub credential_id: Option<CredentialId>,
}

/// A row rejected during parsing, with its verbatim message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub message: String,
}

/// Result of parsing an upload: every data row, plus the errors for the
/// skipped ones.
#[derive(Debug, Clone)]
pub struct ParseReport {
    pub rows: Vec<BatchRow>,
    pub errors: Vec<RowError>,
}

impl ParseReport {
    pub fn pending_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == RowStatus::Pending)
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| r.status == RowStatus::Skipped)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Preparing,
    Processing,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub id: JobId,
    pub issuer_address: Address,
    pub rows: Vec<BatchRow>,
    pub total_rows: usize,
    pub processed_rows: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub status: JobStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Snapshot handed to the progress callback after every processed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse and validate a CSV upload for `issuer`.
///
/// Structural failures return `BatchRejected` and nothing is accepted.
/// Row-level failures mark the row `skipped` with a message and leave the
/// rest of the file untouched.
pub fn parse_batch_csv(
    store: &EntityStore,
    issuer: &Address,
    input: &str,
    max_rows: usize,
) -> EngineResult<ParseReport> {
    let mut lines = input.lines().map(str::trim_end).filter(|l| !l.is_empty());

    let header = lines
        .next()
        .ok_or_else(|| EngineError::BatchRejected("file is empty".into()))?;
    let columns: Vec<String> = header
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .collect();
    let wallet_idx = columns
        .iter()
        .position(|c| c == COL_WALLET)
        .ok_or_else(|| missing_column(COL_WALLET))?;
    let type_idx = columns
        .iter()
        .position(|c| c == COL_TYPE)
        .ok_or_else(|| missing_column(COL_TYPE))?;
    let evidence_idx = columns.iter().position(|c| c == COL_EVIDENCE);

    let data: Vec<&str> = lines.collect();
    if data.is_empty() {
        return Err(EngineError::BatchRejected("no data rows".into()));
    }
    if data.len() > max_rows {
        return Err(EngineError::BatchRejected(format!(
            "{} rows exceeds the maximum of {}",
            data.len(),
            max_rows
        )));
    }

    // Only the issuer's own active types are mintable.
    let allowed: HashSet<String> = store
        .active_types_for_issuer(issuer)?
        .into_iter()
        .map(|t| t.id.as_str().to_string())
        .collect();

    let mut rows = Vec::with_capacity(data.len());
    let mut errors = Vec::new();
    for (i, line) in data.iter().enumerate() {
        let row_no = i + 1;
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let field = |idx: usize| fields.get(idx).copied().unwrap_or("");

        let wallet = field(wallet_idx).to_string();
        let type_id = field(type_idx).to_string();
        let evidence = evidence_idx
            .map(field)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let problem = if wallet.is_empty() {
            Some(ERR_MISSING_WALLET)
        } else if !Address::is_valid(&wallet) {
            Some(ERR_INVALID_WALLET)
        } else if type_id.is_empty() {
            Some(ERR_MISSING_TYPE)
        } else if !allowed.contains(&type_id) {
            Some(ERR_UNKNOWN_TYPE)
        } else {
            None
        };

        if let Some(message) = problem {
            errors.push(RowError {
                row: row_no,
                message: message.to_string(),
            });
        }
        rows.push(BatchRow {
            row: row_no,
            wallet_address: wallet,
            credential_type_id: type_id,
            evidence_hash: evidence,
            status: if problem.is_some() {
                RowStatus::Skipped
            } else {
                RowStatus::Pending
            },
            error: problem.map(str::to_string),
            credential_id: None,
        });
    }

    tracing::debug!(
        total = rows.len(),
        skipped = errors.len(),
        "batch upload parsed"
    );
    Ok(ParseReport { rows, errors })
}

fn missing_column(name: &str) -> EngineError {
    EngineError::BatchRejected(format!("missing required column: {}", name))
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Build a job from a parse report. The job starts in `preparing` and keeps
/// skipped rows so the final report covers the whole file.
pub fn create_batch_job(issuer: &Address, report: ParseReport) -> BatchJob {
    let total_rows = report.rows.len();
    BatchJob {
        id: JobId::new(credence_core::random_hex_id()),
        issuer_address: issuer.clone(),
        rows: report.rows,
        total_rows,
        processed_rows: 0,
        success_count: 0,
        failed_count: 0,
        status: JobStatus::Preparing,
        created_at: Timestamp::now(),
        completed_at: None,
    }
}

/// Process every pending row of `job`, minting through the shared issuance
/// path in chunks of `txn_group_size` with a pause between chunks.
///
/// A row failure marks that row `failed` and moves on; it never aborts the
/// job. `on_progress` fires after every processed row with monotonically
/// increasing counters; `on_row` fires exactly once per processed row once
/// its outcome is settled. Skipped rows are not reprocessed.
pub fn process_batch_job(
    store: &EntityStore,
    ledger: &dyn LedgerClient,
    content: &dyn ContentStore,
    config: &EngineConfig,
    mut job: BatchJob,
    mut on_progress: impl FnMut(&BatchProgress),
    mut on_row: impl FnMut(&BatchRow),
) -> EngineResult<BatchJob> {
    job.status = JobStatus::Processing;
    let issuer = job.issuer_address.clone();
    let pending_total = job
        .rows
        .iter()
        .filter(|r| r.status == RowStatus::Pending)
        .count();

    let mut minted = 0usize;
    for i in 0..job.rows.len() {
        if job.rows[i].status != RowStatus::Pending {
            continue;
        }

        let outcome = mint_row(store, ledger, content, &issuer, &job.rows[i]);
        match outcome {
            Ok(credential_id) => {
                job.rows[i].status = RowStatus::Issued;
                job.rows[i].credential_id = Some(credential_id);
                job.success_count += 1;
            }
            Err(err) => {
                tracing::warn!(row = job.rows[i].row, error = %err, "batch row failed");
                job.rows[i].status = RowStatus::Failed;
                job.rows[i].error = Some(err.to_string());
                job.failed_count += 1;
            }
        }
        job.processed_rows += 1;
        minted += 1;
        on_row(&job.rows[i]);
        on_progress(&BatchProgress {
            processed: job.processed_rows,
            total: pending_total,
            succeeded: job.success_count,
            failed: job.failed_count,
        });

        // Pace the ledger: pause at each chunk boundary, but not after the
        // final row. A zero group size disables pacing rather than dividing
        // by zero (the fields are public, so validate() may not have run).
        if config.chunk_pause_ms > 0
            && config.txn_group_size > 0
            && minted % config.txn_group_size == 0
            && minted < pending_total
        {
            thread::sleep(Duration::from_millis(config.chunk_pause_ms));
        }
    }

    job.status = JobStatus::Completed;
    job.completed_at = Some(Timestamp::now());
    tracing::debug!(
        job = %job.id,
        succeeded = job.success_count,
        failed = job.failed_count,
        "batch job completed"
    );
    Ok(job)
}

fn mint_row(
    store: &EntityStore,
    ledger: &dyn LedgerClient,
    content: &dyn ContentStore,
    issuer: &Address,
    row: &BatchRow,
) -> EngineResult<CredentialId> {
    let recipient = Address::parse(row.wallet_address.as_str())?;
    let credential = issue::issue_credential(
        store,
        ledger,
        content,
        issuer,
        &CredentialTypeId::new(row.credential_type_id.as_str()),
        &recipient,
        row.evidence_hash.clone(),
    )?;
    Ok(credential.id)
}
