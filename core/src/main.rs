//! Dry-run entrypoint
//!
//! Exercises one full rescue against in-memory collaborators so an operator
//! can see the whole pipeline (discovery, valuation, proving, batching,
//! atomic submission, verification) without touching a live cluster.
//!
//! ```text
//! lifeboat-core [SOURCE_PUBKEY] [DESTINATION_PUBKEY]
//! ```

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lifeboat_config::LifeboatConfig;
use lifeboat_core::rescue::{
    AuditLog, BatchPlanner, MockOracle, MockProofBackend, MockRelay, MockScanner, PlannerConfig,
    RescueConfig, RescueOrchestrator, RescueOutcome, TokenBalance,
};
use lifeboat_pool::{CommitmentScheme, MerkleAccumulator, PoseidonHasher};

const DEMO_NATIVE_LAMPORTS: u64 = 2_500_000_000;
const DEMO_TOKEN_AMOUNT: u64 = 750_000_000;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = LifeboatConfig::load().context("loading configuration")?;
    info!(?config, "configuration loaded");

    let mut args = std::env::args().skip(1);
    let source = parse_or_random(args.next(), "source")?;
    let destination = parse_or_random(args.next(), "destination")?;

    let hasher = Arc::new(PoseidonHasher::new());

    // seed an accumulator with a few leaves so the root history holds a real
    // root, then register it as the current one
    let scheme = CommitmentScheme::new(hasher.clone());
    let mut accumulator = MerkleAccumulator::new(config.pool.levels, hasher.clone());
    let mut rng = rand::rngs::OsRng;
    for amount in [5u64, 9, 2] {
        let material = scheme.mint_secret_material(&mut rng)?;
        let commitment = scheme.commit(material.secret(), material.nullifier(), amount);
        accumulator.insert(commitment)?;
    }
    let roots = Arc::new(lifeboat_core::rescue::InMemoryRootHistory::new(16));
    roots.push(accumulator.root());

    let scanner = Arc::new(MockScanner::new());
    scanner.set_balances(
        source,
        DEMO_NATIVE_LAMPORTS,
        vec![TokenBalance {
            mint: Pubkey::new_unique(),
            amount: DEMO_TOKEN_AMOUNT,
            decimals: 6,
        }],
    );

    let oracle = Arc::new(MockOracle::new(150.0));
    let prover = Arc::new(MockProofBackend::new());
    let relay = Arc::new(MockRelay::confirming());

    let planner = BatchPlanner::new(PlannerConfig {
        max_instructions_per_batch: config.planner.max_instructions_per_batch,
        compute_unit_limit: config.planner.compute_unit_limit,
        compute_unit_price_micro_lamports: config.planner.compute_unit_price_micro_lamports,
        close_source_accounts: config.planner.close_source_accounts,
        shield_program_id: Pubkey::from_str(&config.planner.shield_program_id)
            .context("parsing planner.shield_program_id")?,
    });

    let rescue_config = RescueConfig {
        max_attempts: config.rescue.max_attempts,
        retry_delay: Duration::from_millis(config.rescue.retry_delay_ms),
        fee_buffer_lamports: config.rescue.fee_buffer_lamports,
        min_value_usd: config.rescue.min_value_usd,
        call_timeout: Duration::from_millis(config.rescue.call_timeout_ms),
        verify_tolerance_lamports: config.rescue.verify_tolerance_lamports,
        priority_fee_micro_lamports: config.rescue.priority_fee_micro_lamports,
    };

    let mut orchestrator = RescueOrchestrator::new(
        scanner, oracle, prover, roots, relay, scheme, planner, rescue_config,
    );

    match (&config.audit.path, LifeboatConfig::audit_passphrase()) {
        (Some(path), Some(passphrase)) => {
            orchestrator = orchestrator.with_audit_log(AuditLog::new(path, passphrase));
            info!(path = %path, "audit log enabled");
        }
        (Some(_), None) => {
            warn!("audit.path set but LB_AUDIT_PASSPHRASE missing; audit log disabled");
        }
        _ => {}
    }

    match orchestrator.run(&source, &destination).await {
        RescueOutcome::Succeeded {
            bundle_id,
            signatures,
            assets,
        } => {
            info!(bundle_id = %bundle_id, batches = signatures.len(), "dry run landed");
            for asset in assets {
                info!(
                    asset = %asset.label(),
                    amount = asset.amount,
                    usd = asset.usd_value.unwrap_or(0.0),
                    low_priority = asset.low_priority,
                    "rescued"
                );
            }
            Ok(())
        }
        RescueOutcome::Failed { cause, plan } => {
            warn!(
                error = %cause,
                remediation = cause.remediation(),
                attempts = plan.commitments.len(),
                "dry run failed"
            );
            Err(cause.into())
        }
    }
}

fn parse_or_random(arg: Option<String>, role: &str) -> Result<Pubkey> {
    match arg {
        Some(raw) => {
            Pubkey::from_str(&raw).with_context(|| format!("parsing {role} pubkey {raw:?}"))
        }
        None => {
            let key = Pubkey::new_unique();
            warn!(%key, "no {role} pubkey given, using a generated one");
            Ok(key)
        }
    }
}
