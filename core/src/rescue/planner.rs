//! Batch Transaction Planner
//!
//! Partitions the discovered assets into size-bounded transaction batches.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Batch 1            │ Batch 2            │ Batch N (final)    │
//! │ ┌────────────────┐ │ ┌────────────────┐ │ ┌────────────────┐ │
//! │ │ compute budget │ │ │ compute budget │ │ │ compute budget │ │
//! │ │ token legs ... │ │ │ token legs ... │ │ │ token legs ... │ │
//! │ └────────────────┘ │ └────────────────┘ │ │ native leg     │ │
//! │                    │                    │ └────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every batch carries the compute-budget overhead exactly once; the single
//! native leg (privacy deposit or public transfer) always lands in the final
//! batch, after every token leg has been placed.

use solana_compute_budget_interface::ComputeBudgetInstruction;
use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};

use lifeboat_pool::Commitment;

use crate::rescue::error::RescueError;
use crate::rescue::plan::{AssetKind, DiscoveredAsset, TxBatch};
use crate::rescue::proof::Proof;

pub const TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
pub const SYSTEM_PROGRAM_ID: Pubkey =
    Pubkey::from_str_const("11111111111111111111111111111111");

/// SPL Token instruction discriminators
const TOKEN_IX_TRANSFER_CHECKED: u8 = 12;
const TOKEN_IX_CLOSE_ACCOUNT: u8 = 9;

/// Associated-token-program CreateIdempotent discriminator
const ATA_IX_CREATE_IDEMPOTENT: u8 = 1;

/// System program Transfer enum index (bincode u32)
const SYSTEM_IX_TRANSFER: u32 = 2;

/// Shield pool Deposit discriminator
const SHIELD_IX_DEPOSIT: u8 = 0;

/// Planner configuration
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Hard ceiling on instructions per batch, overhead included
    pub max_instructions_per_batch: usize,
    pub compute_unit_limit: u32,
    pub compute_unit_price_micro_lamports: u64,
    /// Close emptied source token accounts and reclaim rent to the
    /// destination
    pub close_source_accounts: bool,
    /// Shield pool program receiving the privacy deposit
    pub shield_program_id: Pubkey,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_instructions_per_batch: 12,
            compute_unit_limit: 400_000,
            compute_unit_price_micro_lamports: 10_000,
            close_source_accounts: true,
            shield_program_id: Pubkey::from_str_const(
                "LifeB8p1Xb1d4a4P3gq6WQkzFkkkXY7FkVfuGArKjbd",
            ),
        }
    }
}

/// The native-asset leg attached to the final batch
#[derive(Debug, Clone)]
pub enum NativeLeg {
    /// Deposit into the shield pool, referencing the minted commitment
    Shielded {
        commitment: Commitment,
        proof: Proof,
        amount: u64,
    },
    /// Plain transfer to the destination (no privacy)
    Public { amount: u64 },
}

/// Partitions asset movements into size-bounded batches
pub struct BatchPlanner {
    config: PlannerConfig,
}

impl BatchPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// The fixed per-batch overhead (compute budget directives).
    pub fn overhead_instructions(&self) -> Vec<Instruction> {
        vec![
            ComputeBudgetInstruction::set_compute_unit_limit(self.config.compute_unit_limit),
            ComputeBudgetInstruction::set_compute_unit_price(
                self.config.compute_unit_price_micro_lamports,
            ),
        ]
    }

    /// Build the ordered batch list for a rescue.
    ///
    /// Token assets are placed in discovery order; the native leg is appended
    /// last, to the final batch. Fails with `BatchOverflow` when one asset's
    /// own instruction set cannot fit in any batch.
    pub fn plan(
        &self,
        source: &Pubkey,
        destination: &Pubkey,
        assets: &[DiscoveredAsset],
        native_leg: &NativeLeg,
    ) -> Result<Vec<TxBatch>, RescueError> {
        let overhead = self.overhead_instructions();
        let budget = self.config.max_instructions_per_batch;

        if budget <= overhead.len() {
            return Err(RescueError::BatchOverflow {
                asset: "(any)".to_string(),
                required: 1,
                available: 0,
            });
        }

        let mut batches: Vec<TxBatch> = Vec::new();
        let mut current = overhead.clone();

        for asset in assets {
            let AssetKind::Token { mint, decimals } = asset.kind else {
                continue; // the native leg is attached after all token legs
            };

            let leg = self.token_leg(source, destination, &mint, asset.amount, decimals);
            if overhead.len() + leg.len() > budget {
                return Err(RescueError::BatchOverflow {
                    asset: asset.label(),
                    required: leg.len(),
                    available: budget - overhead.len(),
                });
            }

            if current.len() + leg.len() > budget {
                batches.push(TxBatch {
                    instructions: std::mem::replace(&mut current, overhead.clone()),
                });
            }
            current.extend(leg);
        }

        let native_ix = self.native_instruction(source, destination, native_leg);
        if current.len() + 1 > budget {
            batches.push(TxBatch {
                instructions: std::mem::replace(&mut current, overhead.clone()),
            });
        }
        current.push(native_ix);
        batches.push(TxBatch {
            instructions: current,
        });

        // an overhead-only batch is empty and dropped
        batches.retain(|b| b.instructions.len() > overhead.len());

        Ok(batches)
    }

    /// Instructions moving one token balance: create the destination ATA if
    /// absent, transfer, optionally close the drained source account.
    fn token_leg(
        &self,
        source: &Pubkey,
        destination: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        decimals: u8,
    ) -> Vec<Instruction> {
        let source_ata = associated_token_address(source, mint);
        let destination_ata = associated_token_address(destination, mint);

        let mut instructions = vec![
            // ATA CreateIdempotent: no-op when the account already exists
            Instruction {
                program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
                accounts: vec![
                    AccountMeta::new(*source, true),                   // payer/signer
                    AccountMeta::new(destination_ata, false),          // ata
                    AccountMeta::new_readonly(*destination, false),    // wallet
                    AccountMeta::new_readonly(*mint, false),           // mint
                    AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
                    AccountMeta::new_readonly(TOKEN_PROGRAM_ID, false),
                ],
                data: vec![ATA_IX_CREATE_IDEMPOTENT],
            },
            // TransferChecked
            Instruction {
                program_id: TOKEN_PROGRAM_ID,
                accounts: vec![
                    AccountMeta::new(source_ata, false),
                    AccountMeta::new_readonly(*mint, false),
                    AccountMeta::new(destination_ata, false),
                    AccountMeta::new_readonly(*source, true), // owner/signer
                ],
                data: {
                    let mut data = vec![TOKEN_IX_TRANSFER_CHECKED];
                    data.extend_from_slice(&amount.to_le_bytes());
                    data.push(decimals);
                    data
                },
            },
        ];

        if self.close_source_accounts() {
            // CloseAccount: rent lamports go to the destination, not back to
            // the compromised source
            instructions.push(Instruction {
                program_id: TOKEN_PROGRAM_ID,
                accounts: vec![
                    AccountMeta::new(source_ata, false),
                    AccountMeta::new(*destination, false),
                    AccountMeta::new_readonly(*source, true), // owner/signer
                ],
                data: vec![TOKEN_IX_CLOSE_ACCOUNT],
            });
        }

        instructions
    }

    /// The single native-asset instruction
    fn native_instruction(
        &self,
        source: &Pubkey,
        destination: &Pubkey,
        leg: &NativeLeg,
    ) -> Instruction {
        match leg {
            NativeLeg::Shielded {
                commitment,
                proof,
                amount,
            } => {
                let (pool_state, _) =
                    Pubkey::find_program_address(&[b"pool"], &self.config.shield_program_id);

                let mut data = vec![SHIELD_IX_DEPOSIT];
                data.extend_from_slice(commitment.as_bytes());
                data.extend_from_slice(&amount.to_le_bytes());
                let proof_len = proof.bytes.len() as u32;
                data.extend_from_slice(&proof_len.to_le_bytes());
                data.extend_from_slice(&proof.bytes);

                Instruction {
                    program_id: self.config.shield_program_id,
                    accounts: vec![
                        AccountMeta::new(*source, true), // depositor/signer
                        AccountMeta::new(pool_state, false),
                        AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
                    ],
                    data,
                }
            }
            NativeLeg::Public { amount } => {
                let mut data = SYSTEM_IX_TRANSFER.to_le_bytes().to_vec();
                data.extend_from_slice(&amount.to_le_bytes());

                Instruction {
                    program_id: SYSTEM_PROGRAM_ID,
                    accounts: vec![
                        AccountMeta::new(*source, true),
                        AccountMeta::new(*destination, false),
                    ],
                    data,
                }
            }
        }
    }

    pub fn close_source_accounts(&self) -> bool {
        self.config.close_source_accounts
    }

    /// Whether an instruction is per-batch overhead
    pub fn is_overhead(instruction: &Instruction) -> bool {
        instruction.program_id == solana_compute_budget_interface::id()
    }
}

/// Canonical associated-token-account derivation
pub fn associated_token_address(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(
        &[wallet.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rescue::plan::AssetKind;

    fn token_asset(seed: u8, amount: u64) -> DiscoveredAsset {
        DiscoveredAsset::new(
            AssetKind::Token {
                mint: Pubkey::new_from_array([seed; 32]),
                decimals: 6,
            },
            amount,
        )
    }

    fn shielded_leg(amount: u64) -> NativeLeg {
        NativeLeg::Shielded {
            commitment: Commitment([7u8; 32]),
            proof: Proof {
                bytes: vec![0xaa; 64],
            },
            amount,
        }
    }

    fn planner(budget: usize) -> BatchPlanner {
        BatchPlanner::new(PlannerConfig {
            max_instructions_per_batch: budget,
            ..PlannerConfig::default()
        })
    }

    fn non_overhead(batches: &[TxBatch]) -> Vec<&Instruction> {
        batches
            .iter()
            .flat_map(|b| b.instructions.iter())
            .filter(|ix| !BatchPlanner::is_overhead(ix))
            .collect()
    }

    #[test]
    fn test_scenario_two_assets_budget_six() {
        // native 2 SOL after fee reservation plus one token under a budget of
        // 6: everything fits in exactly one batch
        let planner = planner(6);
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let assets = vec![
            DiscoveredAsset::new(AssetKind::Native, 2_000_000_000),
            token_asset(1, 500),
        ];

        let batches = planner
            .plan(&source, &destination, &assets, &shielded_leg(2_000_000_000))
            .unwrap();

        assert_eq!(batches.len(), 1, "both legs must fit in a single batch");
        assert_eq!(batches[0].len(), 6);

        // overhead exactly once, then token leg, native leg last
        let overhead: Vec<_> = batches[0]
            .instructions
            .iter()
            .filter(|ix| BatchPlanner::is_overhead(ix))
            .collect();
        assert_eq!(overhead.len(), 2);

        let last = batches[0].instructions.last().unwrap();
        assert_eq!(last.program_id, planner.config.shield_program_id);
    }

    #[test]
    fn test_conservation_across_batches() {
        // enough tokens to force several batches; every leg must appear
        // exactly once, in discovery order, with the native leg last
        let planner = planner(8);
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let assets: Vec<_> = (1..=5).map(|i| token_asset(i, i as u64 * 100)).collect();

        let batches = planner
            .plan(&source, &destination, &assets, &shielded_leg(1_000_000))
            .unwrap();

        assert!(batches.len() > 1, "five 3-instruction legs cannot fit one batch");

        for batch in &batches {
            assert!(batch.len() <= 8, "no batch may exceed the budget");
            assert_eq!(
                batch
                    .instructions
                    .iter()
                    .filter(|ix| BatchPlanner::is_overhead(ix))
                    .count(),
                2,
                "overhead exactly once per batch"
            );
        }

        // 5 token legs x 3 instructions + 1 native leg, no dupes, no omissions
        let payload = non_overhead(&batches);
        assert_eq!(payload.len(), 5 * 3 + 1);

        let transfers: Vec<_> = payload
            .iter()
            .filter(|ix| {
                ix.program_id == TOKEN_PROGRAM_ID && ix.data.first() == Some(&TOKEN_IX_TRANSFER_CHECKED)
            })
            .collect();
        assert_eq!(transfers.len(), 5);
        for (i, ix) in transfers.iter().enumerate() {
            let amount = u64::from_le_bytes(ix.data[1..9].try_into().unwrap());
            assert_eq!(amount, (i as u64 + 1) * 100, "discovery order preserved");
        }

        // exactly one native leg, and it is the last instruction overall
        let deposits: Vec<_> = payload
            .iter()
            .filter(|ix| ix.program_id == planner.config.shield_program_id)
            .collect();
        assert_eq!(deposits.len(), 1);
        let final_ix = batches.last().unwrap().instructions.last().unwrap();
        assert_eq!(final_ix.program_id, planner.config.shield_program_id);
    }

    #[test]
    fn test_single_asset_overflow_is_error() {
        // budget 4 leaves room for 2 payload instructions; a token leg needs 3
        let planner = planner(4);
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let assets = vec![token_asset(1, 100)];

        let err = planner
            .plan(&source, &destination, &assets, &shielded_leg(1))
            .unwrap_err();

        match err {
            RescueError::BatchOverflow {
                required,
                available,
                ..
            } => {
                assert_eq!(required, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected BatchOverflow, got {other:?}"),
        }
    }

    #[test]
    fn test_native_leg_opens_new_batch_when_full() {
        // one token leg fills the batch to the brim; the native leg must open
        // a fresh final batch instead of overflowing
        let planner = planner(5);
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let assets = vec![token_asset(1, 100)];

        let batches = planner
            .plan(&source, &destination, &assets, &shielded_leg(1))
            .unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].len(), 3); // overhead + native leg
        let last = batches[1].instructions.last().unwrap();
        assert_eq!(last.program_id, planner.config.shield_program_id);
    }

    #[test]
    fn test_public_native_leg() {
        let planner = planner(6);
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();

        let batches = planner
            .plan(
                &source,
                &destination,
                &[],
                &NativeLeg::Public { amount: 42 },
            )
            .unwrap();

        assert_eq!(batches.len(), 1);
        let transfer = batches[0].instructions.last().unwrap();
        assert_eq!(transfer.program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(&transfer.data[..4], &SYSTEM_IX_TRANSFER.to_le_bytes());
        assert_eq!(u64::from_le_bytes(transfer.data[4..12].try_into().unwrap()), 42);
    }

    #[test]
    fn test_close_accounts_optional() {
        let planner = BatchPlanner::new(PlannerConfig {
            close_source_accounts: false,
            ..PlannerConfig::default()
        });
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let assets = vec![token_asset(1, 100)];

        let batches = planner
            .plan(&source, &destination, &assets, &shielded_leg(1))
            .unwrap();

        let closes = non_overhead(&batches)
            .iter()
            .filter(|ix| {
                ix.program_id == TOKEN_PROGRAM_ID && ix.data.first() == Some(&TOKEN_IX_CLOSE_ACCOUNT)
            })
            .count();
        assert_eq!(closes, 0);
    }

    #[test]
    fn test_deposit_embeds_commitment_and_proof() {
        let planner = planner(6);
        let source = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let leg = shielded_leg(9_000);

        let batches = planner.plan(&source, &destination, &[], &leg).unwrap();
        let deposit = batches[0].instructions.last().unwrap();

        assert_eq!(deposit.data[0], SHIELD_IX_DEPOSIT);
        assert_eq!(&deposit.data[1..33], &[7u8; 32]);
        assert_eq!(
            u64::from_le_bytes(deposit.data[33..41].try_into().unwrap()),
            9_000
        );
        let proof_len = u32::from_le_bytes(deposit.data[41..45].try_into().unwrap()) as usize;
        assert_eq!(proof_len, 64);
        assert_eq!(&deposit.data[45..45 + proof_len], &[0xaa; 64][..]);
    }
}
