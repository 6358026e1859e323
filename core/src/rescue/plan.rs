//! Rescue plan types
//!
//! The plan is an ephemeral, per-invocation aggregate. It is never part of
//! the accumulator's durable state; on a fatal failure it travels out inside
//! [`RescueOutcome::Failed`] so the operator can reconcile by hand, and it
//! may be persisted only through the encrypted audit log.

use serde::Serialize;
use solana_sdk::{instruction::Instruction, pubkey::Pubkey};

use lifeboat_pool::Commitment;

use crate::rescue::error::RescueError;

/// What kind of asset a discovered balance is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetKind {
    /// SOL, denominated in lamports
    Native,
    /// SPL token balance in its raw smallest unit
    Token { mint: Pubkey, decimals: u8 },
}

/// One rescuable balance found on the source address
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredAsset {
    pub kind: AssetKind,
    /// Raw amount in the asset's smallest unit
    pub amount: u64,
    /// USD estimate attached during valuation; informational only
    pub usd_value: Option<f64>,
    /// Valued under the configured threshold
    pub low_priority: bool,
}

impl DiscoveredAsset {
    pub fn new(kind: AssetKind, amount: u64) -> Self {
        Self {
            kind,
            amount,
            usd_value: None,
            low_priority: false,
        }
    }

    /// Short label for logs and error messages
    pub fn label(&self) -> String {
        match self.kind {
            AssetKind::Native => "SOL".to_string(),
            AssetKind::Token { mint, .. } => mint.to_string(),
        }
    }
}

/// One size-bounded transaction in the bundle
#[derive(Debug, Clone, Serialize)]
pub struct TxBatch {
    pub instructions: Vec<Instruction>,
}

impl TxBatch {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// In-flight state of one rescue invocation
#[derive(Debug, Clone, Serialize)]
pub struct RescuePlan {
    pub source: Pubkey,
    pub destination: Pubkey,
    /// Assets in discovery order
    pub assets: Vec<DiscoveredAsset>,
    /// Every commitment minted across attempts, oldest first
    pub commitments: Vec<Commitment>,
    /// Batches from the most recent build
    pub batches: Vec<TxBatch>,
}

impl RescuePlan {
    pub fn new(source: Pubkey, destination: Pubkey) -> Self {
        Self {
            source,
            destination,
            assets: Vec::new(),
            commitments: Vec::new(),
            batches: Vec::new(),
        }
    }

    /// Lamports the plan intends to move through the native leg
    pub fn native_amount(&self) -> u64 {
        self.assets
            .iter()
            .find(|a| a.kind == AssetKind::Native)
            .map(|a| a.amount)
            .unwrap_or(0)
    }
}

/// Terminal result of a rescue invocation
#[derive(Debug)]
pub enum RescueOutcome {
    Succeeded {
        bundle_id: String,
        signatures: Vec<String>,
        assets: Vec<DiscoveredAsset>,
    },
    Failed {
        cause: RescueError,
        /// Partial progress preserved for operator-driven recovery
        plan: RescuePlan,
    },
}

impl RescueOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RescueOutcome::Succeeded { .. })
    }
}
