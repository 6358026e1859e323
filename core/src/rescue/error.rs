//! Rescue error taxonomy
//!
//! The orchestrator is the only layer allowed to decide retry-vs-fatal:
//! `RootDrift` (and read-phase `Timeout`) are transient and retried under a
//! bound, everything else is fatal on first occurrence. Collaborators and the
//! pool layer surface faults unchanged.

use thiserror::Error;

use lifeboat_pool::PoolError;

use crate::rescue::orchestrator::Phase;

#[derive(Debug, Error)]
pub enum RescueError {
    /// The pool root advanced between proof construction and submission.
    #[error("pool root advanced concurrently; proof is stale against the on-chain root")]
    RootDrift,

    /// Relay refused the bundle; assumed to be a real conflict, not noise.
    #[error("bundle rejected by relay: {reason}")]
    SubmissionRejected { reason: String },

    /// Relay cannot guarantee all-or-nothing landing.
    #[error("relay only offers best-effort ordering; refusing non-atomic submission")]
    NonAtomicRelay,

    /// A collaborator call exceeded its deadline.
    #[error("{phase} call timed out after {timeout_ms} ms")]
    Timeout { phase: Phase, timeout_ms: u64 },

    /// One asset's instructions alone exceed the per-batch budget.
    #[error(
        "asset {asset} needs {required} instructions but only {available} fit in a batch"
    )]
    BatchOverflow {
        asset: String,
        required: usize,
        available: usize,
    },

    /// Balance discovery failed.
    #[error("balance scan failed for {address}: {reason}")]
    Scan { address: String, reason: String },

    /// Source holds too little native balance to cover the fee reserve.
    #[error("insufficient fee reserve: balance {balance} lamports, buffer {buffer}")]
    InsufficientFeeReserve { balance: u64, buffer: u64 },

    /// Proof backend failed.
    #[error("proof generation failed: {0}")]
    Proof(String),

    /// The transient-retry bound was exhausted; the last error is preserved.
    #[error("gave up after {attempts} attempts; last error: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<RescueError>,
    },

    /// Caller cancelled at a phase boundary.
    #[error("rescue cancelled at the {phase} boundary")]
    Cancelled { phase: Phase },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("internal: {0}")]
    Internal(String),
}

impl RescueError {
    /// Whether the orchestrator's bounded retry loop applies.
    pub fn is_root_drift(&self) -> bool {
        matches!(self, RescueError::RootDrift)
    }

    /// Suggested remediation class surfaced to the operator on fatal errors.
    pub fn remediation(&self) -> &'static str {
        match self {
            RescueError::RootDrift => "retry once concurrent pool writes subside",
            RescueError::SubmissionRejected { .. } => {
                "inspect the relay response; the bundle likely conflicts with a landed transaction"
            }
            RescueError::NonAtomicRelay => "configure a relay that guarantees atomic bundles",
            RescueError::Timeout { .. } => {
                "check collaborator availability or raise the call timeout"
            }
            RescueError::BatchOverflow { .. } => {
                "raise max_instructions_per_batch or split the asset manually"
            }
            RescueError::Scan { .. } => "check RPC endpoint health and the source address",
            RescueError::InsufficientFeeReserve { .. } => {
                "fund the source above the fee buffer or lower fee_buffer_lamports"
            }
            RescueError::Proof(_) => "check the proof backend and its circuit inputs",
            RescueError::RetriesExhausted { .. } => {
                "the pool is under heavy concurrent writes; rerun the rescue later"
            }
            RescueError::Cancelled { .. } => "rerun the rescue when ready",
            RescueError::Pool(_) => "pool invariant violated; inspect before retrying",
            RescueError::Internal(_) => "report this; it indicates a bug in the engine",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_root_drift_is_retryable() {
        assert!(RescueError::RootDrift.is_root_drift());
        assert!(
            !RescueError::SubmissionRejected {
                reason: "conflict".into()
            }
            .is_root_drift()
        );
        assert!(
            !RescueError::Timeout {
                phase: Phase::Submitting,
                timeout_ms: 100
            }
            .is_root_drift()
        );
    }

    #[test]
    fn test_retries_exhausted_names_itself() {
        let err = RescueError::RetriesExhausted {
            attempts: 3,
            last: Box::new(RescueError::RootDrift),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("3 attempts"));
        assert!(rendered.contains("stale"));
    }
}
