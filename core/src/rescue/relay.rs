//! Atomic bundle relay collaborator
//!
//! The relay must land the ordered batches as a single all-or-nothing unit;
//! a relay that only offers best-effort ordering does not satisfy this
//! interface and the orchestrator refuses it outright.

use std::collections::VecDeque;
use std::sync::Mutex;

use solana_sdk::pubkey::Pubkey;

use crate::rescue::error::RescueError;
use crate::rescue::plan::TxBatch;

/// Terminal response for a confirmed bundle
#[derive(Debug, Clone)]
pub struct BundleReceipt {
    pub bundle_id: String,
    pub tx_signatures: Vec<String>,
}

pub trait BundleRelay: Send + Sync {
    /// Submit the ordered batches atomically and wait for the terminal
    /// response. A rejection is final; there is no partial landing.
    fn submit_atomic(
        &self,
        batches: &[TxBatch],
        signer: &Pubkey,
        priority_fee_micro_lamports: u64,
    ) -> Result<BundleReceipt, RescueError>;

    /// Whether this relay guarantees all-or-nothing landing.
    fn guarantees_atomicity(&self) -> bool {
        true
    }
}

/// What the mock relay should answer on the next submission
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    Confirm,
    RootDrift,
    Reject(String),
}

/// Scripted relay for tests and dry runs.
///
/// Responses are consumed front to back; once the script is exhausted every
/// further submission confirms.
pub struct MockRelay {
    script: Mutex<VecDeque<ScriptedResponse>>,
    submissions: Mutex<u32>,
    atomic: bool,
}

impl MockRelay {
    /// A relay that confirms every bundle
    pub fn confirming() -> Self {
        Self::with_script(Vec::new())
    }

    pub fn with_script(script: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            submissions: Mutex::new(0),
            atomic: true,
        }
    }

    /// A relay that admits to best-effort ordering only
    pub fn best_effort() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            submissions: Mutex::new(0),
            atomic: false,
        }
    }

    pub fn submissions(&self) -> u32 {
        *self.submissions.lock().unwrap()
    }
}

impl BundleRelay for MockRelay {
    fn submit_atomic(
        &self,
        batches: &[TxBatch],
        _signer: &Pubkey,
        _priority_fee_micro_lamports: u64,
    ) -> Result<BundleReceipt, RescueError> {
        let n = {
            let mut count = self.submissions.lock().unwrap();
            *count += 1;
            *count
        };

        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedResponse::RootDrift) => Err(RescueError::RootDrift),
            Some(ScriptedResponse::Reject(reason)) => {
                Err(RescueError::SubmissionRejected { reason })
            }
            Some(ScriptedResponse::Confirm) | None => Ok(BundleReceipt {
                bundle_id: format!("mock-bundle-{n}"),
                tx_signatures: (0..batches.len()).map(|i| format!("mock-sig-{n}-{i}")).collect(),
            }),
        }
    }

    fn guarantees_atomicity(&self) -> bool {
        self.atomic
    }
}
