//! Rescue orchestrator
//!
//! Drives one rescue invocation through its phases:
//!
//! ```text
//! Discovering ──► Valuing ──► ProvingAndBuilding ──► Submitting ──► Verifying
//!                                    ▲                    │
//!                                    └─── root drift ◄────┘  (bounded retry,
//!                                                             fresh material)
//! ```
//!
//! Only `RootDrift` is retried, under `max_attempts`, with freshly minted
//! spend material each time so no commitment is ever proven twice. Every
//! other error is fatal on first occurrence and travels out inside
//! [`RescueOutcome::Failed`] together with the partial plan.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::OsRng;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lifeboat_pool::{CommitmentScheme, SecretMaterial};

use crate::rescue::audit::{AuditAsset, AuditLog, RescueRecord};
use crate::rescue::error::RescueError;
use crate::rescue::oracle::PriceOracle;
use crate::rescue::plan::{AssetKind, DiscoveredAsset, RescueOutcome, RescuePlan};
use crate::rescue::planner::{BatchPlanner, NativeLeg};
use crate::rescue::proof::{CircuitInputs, ProofBackend};
use crate::rescue::relay::{BundleReceipt, BundleRelay};
use crate::rescue::roots::RootHistory;
use crate::rescue::scanner::{AssetScanner, TokenBalance};

const NATIVE_DECIMALS: u32 = 9;

/// Where a rescue invocation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovering,
    Valuing,
    ProvingAndBuilding,
    Submitting,
    Verifying,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Discovering => "discovering",
            Phase::Valuing => "valuing",
            Phase::ProvingAndBuilding => "proving-and-building",
            Phase::Submitting => "submitting",
            Phase::Verifying => "verifying",
        };
        f.write_str(name)
    }
}

/// Orchestrator tuning knobs
#[derive(Debug, Clone)]
pub struct RescueConfig {
    /// Total submission attempts under root drift
    pub max_attempts: u32,
    /// Pause between drift retries
    pub retry_delay: Duration,
    /// Lamports left on the source to cover bundle fees
    pub fee_buffer_lamports: u64,
    /// Assets valued under this are flagged low priority (still rescued)
    pub min_value_usd: f64,
    /// Per-collaborator-call deadline
    pub call_timeout: Duration,
    /// Acceptable slack when verifying destination balances
    pub verify_tolerance_lamports: u64,
    pub priority_fee_micro_lamports: u64,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            fee_buffer_lamports: 5_000_000,
            min_value_usd: 1.0,
            call_timeout: Duration::from_secs(30),
            verify_tolerance_lamports: 10_000,
            priority_fee_micro_lamports: 10_000,
        }
    }
}

/// Drives a single rescue end to end over injected collaborators
pub struct RescueOrchestrator {
    scanner: Arc<dyn AssetScanner>,
    oracle: Arc<dyn PriceOracle>,
    prover: Arc<dyn ProofBackend>,
    roots: Arc<dyn RootHistory>,
    relay: Arc<dyn BundleRelay>,
    scheme: CommitmentScheme,
    planner: BatchPlanner,
    audit: Option<AuditLog>,
    cancel: CancellationToken,
    config: RescueConfig,
}

impl RescueOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scanner: Arc<dyn AssetScanner>,
        oracle: Arc<dyn PriceOracle>,
        prover: Arc<dyn ProofBackend>,
        roots: Arc<dyn RootHistory>,
        relay: Arc<dyn BundleRelay>,
        scheme: CommitmentScheme,
        planner: BatchPlanner,
        config: RescueConfig,
    ) -> Self {
        Self {
            scanner,
            oracle,
            prover,
            roots,
            relay,
            scheme,
            planner,
            audit: None,
            cancel: CancellationToken::new(),
            config,
        }
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Token callers can trigger to stop the rescue at the next phase
    /// boundary. In-flight submissions are never interrupted.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one rescue from `source` to `destination`.
    ///
    /// Always returns a terminal [`RescueOutcome`]; errors never escape as
    /// bare `Err` so the partial plan survives for operator reconciliation.
    pub async fn run(&self, source: &Pubkey, destination: &Pubkey) -> RescueOutcome {
        info!(%source, %destination, "starting rescue");

        let mut plan = RescuePlan::new(*source, *destination);
        let mut spend_material: Option<SecretMaterial> = None;

        let outcome = match self.run_inner(&mut plan, &mut spend_material).await {
            Ok(receipt) => {
                info!(
                    bundle_id = %receipt.bundle_id,
                    signatures = receipt.tx_signatures.len(),
                    "rescue succeeded"
                );
                RescueOutcome::Succeeded {
                    bundle_id: receipt.bundle_id,
                    signatures: receipt.tx_signatures,
                    assets: plan.assets.clone(),
                }
            }
            Err(cause) => {
                warn!(error = %cause, remediation = cause.remediation(), "rescue failed");
                RescueOutcome::Failed { cause, plan }
            }
        };

        self.record_outcome(source, destination, &outcome, spend_material.as_ref());
        outcome
    }

    async fn run_inner(
        &self,
        plan: &mut RescuePlan,
        spend_material: &mut Option<SecretMaterial>,
    ) -> Result<BundleReceipt, RescueError> {
        // ── Discovering ────────────────────────────────────────────────
        self.checkpoint(Phase::Discovering)?;
        let source = plan.source;
        let destination = plan.destination;

        let native_fut = {
            let scanner = Arc::clone(&self.scanner);
            self.call_read(Phase::Discovering, move || scanner.native_balance(&source))
        };
        let tokens_fut = {
            let scanner = Arc::clone(&self.scanner);
            self.call_read(Phase::Discovering, move || scanner.token_accounts(&source))
        };
        let (native, tokens) = tokio::join!(native_fut, tokens_fut);
        let native = native?;
        let tokens = tokens?;

        if native <= self.config.fee_buffer_lamports {
            return Err(RescueError::InsufficientFeeReserve {
                balance: native,
                buffer: self.config.fee_buffer_lamports,
            });
        }
        let rescued_native = native - self.config.fee_buffer_lamports;

        plan.assets
            .push(DiscoveredAsset::new(AssetKind::Native, rescued_native));
        for token in tokens.into_iter().filter(|t| t.amount > 0) {
            plan.assets.push(DiscoveredAsset::new(
                AssetKind::Token {
                    mint: token.mint,
                    decimals: token.decimals,
                },
                token.amount,
            ));
        }
        info!(
            assets = plan.assets.len(),
            rescued_native, "discovery complete"
        );

        // destination snapshot, compared again after landing
        let destination_before = self.destination_snapshot(Phase::Discovering, destination).await?;

        // ── Valuing ────────────────────────────────────────────────────
        self.checkpoint(Phase::Valuing)?;
        for asset in &mut plan.assets {
            let kind = asset.kind;
            let oracle = Arc::clone(&self.oracle);
            let quote = self
                .call_read(Phase::Valuing, move || oracle.price_usd(&kind))
                .await;

            match quote {
                Ok(quote) => {
                    let decimals = match asset.kind {
                        AssetKind::Native => NATIVE_DECIMALS,
                        AssetKind::Token { decimals, .. } => decimals as u32,
                    };
                    let whole_units = asset.amount as f64 / 10f64.powi(decimals as i32);
                    let usd = whole_units * quote.usd;
                    asset.usd_value = Some(usd);
                    asset.low_priority = usd < self.config.min_value_usd;
                    debug!(asset = %asset.label(), usd, source = %quote.source, "valued");
                }
                Err(error) => {
                    // valuation is informational; degrade instead of failing
                    warn!(asset = %asset.label(), %error, "valuation unavailable, assuming zero");
                    asset.usd_value = None;
                    asset.low_priority = true;
                }
            }
        }

        // refuse before proving anything rather than after
        if !self.relay.guarantees_atomicity() {
            return Err(RescueError::NonAtomicRelay);
        }

        // ── ProvingAndBuilding / Submitting, under the drift bound ─────
        let receipt = self.attempt_loop(plan, spend_material).await?;

        // ── Verifying ──────────────────────────────────────────────────
        self.checkpoint(Phase::Verifying)?;
        let destination_after = self.destination_snapshot(Phase::Verifying, destination).await?;

        // advisory only: the relay already confirmed the bundle, so a
        // mismatch means the world moved after landing, not that the rescue
        // failed
        let findings = landing_discrepancies(
            &plan.assets,
            &destination_before,
            &destination_after,
            self.config.verify_tolerance_lamports,
        );
        if findings.is_empty() {
            debug!(
                native_before = destination_before.native,
                native_after = destination_after.native,
                "post-landing balances match the plan"
            );
        }
        for finding in findings {
            warn!(%finding, "post-landing balance mismatch");
        }

        Ok(receipt)
    }

    /// Native and token balances of an address, read concurrently.
    async fn destination_snapshot(
        &self,
        phase: Phase,
        destination: Pubkey,
    ) -> Result<DestinationSnapshot, RescueError> {
        let native_fut = {
            let scanner = Arc::clone(&self.scanner);
            self.call_read(phase, move || scanner.native_balance(&destination))
        };
        let tokens_fut = {
            let scanner = Arc::clone(&self.scanner);
            self.call_read(phase, move || scanner.token_accounts(&destination))
        };
        let (native, tokens) = tokio::join!(native_fut, tokens_fut);
        Ok(DestinationSnapshot::new(native?, tokens?))
    }

    async fn attempt_loop(
        &self,
        plan: &mut RescuePlan,
        spend_material: &mut Option<SecretMaterial>,
    ) -> Result<BundleReceipt, RescueError> {
        let amount = plan.native_amount();
        let source = plan.source;

        for attempt in 1..=self.config.max_attempts {
            self.checkpoint(Phase::ProvingAndBuilding)?;

            // fresh material every attempt; a commitment is proven at most
            // once even when an earlier submission died mid-flight
            let material = self.scheme.mint_secret_material(&mut OsRng)?;
            let commitment = self
                .scheme
                .commit(material.secret(), material.nullifier(), amount);
            let nullifier_hash = self.scheme.nullifier_hash(material.nullifier());
            plan.commitments.push(commitment);

            let root = {
                let roots = Arc::clone(&self.roots);
                self.call_read(Phase::ProvingAndBuilding, move || roots.current_root())
                    .await?
            };

            let inputs = CircuitInputs {
                root,
                commitment,
                nullifier_hash,
                amount,
                secret: *material.secret(),
            };
            let proof = {
                let prover = Arc::clone(&self.prover);
                self.call_read(Phase::ProvingAndBuilding, move || prover.prove(&inputs))
                    .await?
            };

            let native_leg = NativeLeg::Shielded {
                commitment,
                proof,
                amount,
            };
            plan.batches =
                self.planner
                    .plan(&plan.source, &plan.destination, &plan.assets, &native_leg)?;
            info!(
                attempt,
                batches = plan.batches.len(),
                commitment = %commitment,
                "bundle built"
            );

            // re-check the proof's root right before handing off; drift
            // caught here re-enters the loop without burning a relay round
            // trip
            let root_known = {
                let roots = Arc::clone(&self.roots);
                self.call_read(Phase::ProvingAndBuilding, move || roots.is_known_root(&root))
                    .await?
            };

            self.checkpoint(Phase::Submitting)?;
            let result = if !root_known {
                Err(RescueError::RootDrift)
            } else {
                let relay = Arc::clone(&self.relay);
                let batches = plan.batches.clone();
                let priority_fee = self.config.priority_fee_micro_lamports;
                self.call_blocking(Phase::Submitting, move || {
                    relay.submit_atomic(&batches, &source, priority_fee)
                })
                .await
            };

            match result {
                Ok(receipt) => {
                    *spend_material = Some(material);
                    return Ok(receipt);
                }
                Err(error) if error.is_root_drift() && attempt < self.config.max_attempts => {
                    warn!(attempt, "root drifted, retrying with fresh material");
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(error) if error.is_root_drift() => {
                    return Err(RescueError::RetriesExhausted {
                        attempts: self.config.max_attempts,
                        last: Box::new(error),
                    });
                }
                Err(error) => return Err(error),
            }
        }

        // max_attempts >= 1, so the loop always returns before falling out
        Err(RescueError::Internal(
            "attempt loop exited without a terminal result".to_string(),
        ))
    }

    /// Read-phase collaborator call: a timeout is transient and retried
    /// under the attempt bound before it turns fatal.
    async fn call_read<T, F>(&self, phase: Phase, call: F) -> Result<T, RescueError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, RescueError> + Clone + Send + 'static,
    {
        let mut attempt = 1;
        loop {
            match self.call_blocking(phase, call.clone()).await {
                Err(error @ RescueError::Timeout { .. })
                    if attempt < self.config.max_attempts =>
                {
                    warn!(%phase, attempt, %error, "read call timed out, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                other => return other,
            }
        }
    }

    /// Run a synchronous collaborator call off the async runtime, under the
    /// configured deadline.
    async fn call_blocking<T, F>(&self, phase: Phase, call: F) -> Result<T, RescueError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, RescueError> + Send + 'static,
    {
        let deadline = self.config.call_timeout;
        match tokio::time::timeout(deadline, tokio::task::spawn_blocking(call)).await {
            Err(_) => Err(RescueError::Timeout {
                phase,
                timeout_ms: deadline.as_millis() as u64,
            }),
            Ok(Err(join_error)) => Err(RescueError::Internal(format!(
                "collaborator task failed: {join_error}"
            ))),
            Ok(Ok(result)) => result,
        }
    }

    fn checkpoint(&self, phase: Phase) -> Result<(), RescueError> {
        if self.cancel.is_cancelled() {
            info!(%phase, "cancellation observed at phase boundary");
            return Err(RescueError::Cancelled { phase });
        }
        Ok(())
    }

    fn record_outcome(
        &self,
        source: &Pubkey,
        destination: &Pubkey,
        outcome: &RescueOutcome,
        spend_material: Option<&SecretMaterial>,
    ) {
        let Some(audit) = &self.audit else { return };

        let record = match outcome {
            RescueOutcome::Succeeded {
                bundle_id,
                signatures,
                assets,
            } => RescueRecord {
                unix_timestamp: now_unix(),
                source: source.to_string(),
                destination: destination.to_string(),
                outcome: "succeeded".to_string(),
                bundle_id: Some(bundle_id.clone()),
                signatures: signatures.clone(),
                assets: assets.iter().map(AuditAsset::from).collect(),
                commitments: Vec::new(),
                spend_secret: spend_material.map(|m| hex::encode(m.secret())),
                spend_nullifier: spend_material.map(|m| hex::encode(m.nullifier())),
            },
            RescueOutcome::Failed { cause, plan } => RescueRecord {
                unix_timestamp: now_unix(),
                source: source.to_string(),
                destination: destination.to_string(),
                outcome: format!("failed: {cause}"),
                bundle_id: None,
                signatures: Vec::new(),
                assets: plan.assets.iter().map(AuditAsset::from).collect(),
                commitments: plan.commitments.iter().map(|c| hex::encode(c.0)).collect(),
                spend_secret: None,
                spend_nullifier: None,
            },
        };

        if let Err(error) = audit.append(&record) {
            warn!(%error, "failed to append audit record");
        }
    }
}

/// Destination balances captured before submission and re-read after landing
#[derive(Debug, Clone)]
struct DestinationSnapshot {
    native: u64,
    tokens: HashMap<Pubkey, u64>,
}

impl DestinationSnapshot {
    fn new(native: u64, tokens: Vec<TokenBalance>) -> Self {
        Self {
            native,
            tokens: tokens.into_iter().map(|t| (t.mint, t.amount)).collect(),
        }
    }

    fn token_amount(&self, mint: &Pubkey) -> u64 {
        self.tokens.get(mint).copied().unwrap_or(0)
    }
}

/// Compare landed destination balances against the plan's expected amounts.
///
/// Every token leg should arrive in full on the destination. The native leg
/// goes into the shield pool, so the destination's native balance may only
/// move upward by reclaimed rent; a decrease beyond the tolerance is
/// reported. One line per mismatch.
fn landing_discrepancies(
    assets: &[DiscoveredAsset],
    before: &DestinationSnapshot,
    after: &DestinationSnapshot,
    tolerance_lamports: u64,
) -> Vec<String> {
    let mut findings = Vec::new();

    for asset in assets {
        let AssetKind::Token { mint, .. } = asset.kind else {
            continue;
        };
        let received = after
            .token_amount(&mint)
            .saturating_sub(before.token_amount(&mint));
        if received != asset.amount {
            findings.push(format!(
                "token {mint}: expected {expected}, destination gained {received}",
                expected = asset.amount
            ));
        }
    }

    if after.native + tolerance_lamports < before.native {
        findings.push(format!(
            "destination native balance decreased from {} to {}",
            before.native, after.native
        ));
    }

    findings
}

fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_asset(mint: Pubkey, amount: u64) -> DiscoveredAsset {
        DiscoveredAsset::new(AssetKind::Token { mint, decimals: 6 }, amount)
    }

    fn snapshot(native: u64, tokens: &[(Pubkey, u64)]) -> DestinationSnapshot {
        DestinationSnapshot::new(
            native,
            tokens
                .iter()
                .map(|&(mint, amount)| TokenBalance {
                    mint,
                    amount,
                    decimals: 6,
                })
                .collect(),
        )
    }

    #[test]
    fn test_matching_landing_yields_no_findings() {
        let mint = Pubkey::new_unique();
        let assets = vec![
            DiscoveredAsset::new(AssetKind::Native, 1_000_000_000),
            token_asset(mint, 500),
        ];

        // token arrives in full on a previously funded account, rent reclaim
        // bumps the native balance
        let before = snapshot(10_000, &[(mint, 40)]);
        let after = snapshot(12_000, &[(mint, 540)]);

        assert!(landing_discrepancies(&assets, &before, &after, 10_000).is_empty());
    }

    #[test]
    fn test_short_token_delivery_is_reported() {
        let mint = Pubkey::new_unique();
        let assets = vec![token_asset(mint, 500)];

        let before = snapshot(10_000, &[]);
        let after = snapshot(10_000, &[(mint, 300)]);

        let findings = landing_discrepancies(&assets, &before, &after, 10_000);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("expected 500"));
        assert!(findings[0].contains("gained 300"));
    }

    #[test]
    fn test_missing_token_account_is_reported() {
        let mint = Pubkey::new_unique();
        let assets = vec![token_asset(mint, 500)];

        let before = snapshot(10_000, &[]);
        let after = snapshot(10_000, &[]);

        let findings = landing_discrepancies(&assets, &before, &after, 10_000);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("gained 0"));
    }

    #[test]
    fn test_native_decrease_beyond_tolerance_is_reported() {
        let assets = vec![DiscoveredAsset::new(AssetKind::Native, 1_000_000_000)];

        let before = snapshot(100_000, &[]);

        // within tolerance: fee rounding, no finding
        let after = snapshot(95_000, &[]);
        assert!(landing_discrepancies(&assets, &before, &after, 10_000).is_empty());

        // beyond tolerance: reported
        let after = snapshot(80_000, &[]);
        let findings = landing_discrepancies(&assets, &before, &after, 10_000);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].contains("decreased"));
    }
}
