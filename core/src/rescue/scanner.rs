//! Asset discovery collaborator
//!
//! Native balance and token-account scan are separate calls so the
//! orchestrator can run them concurrently; they are independent reads.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use solana_sdk::pubkey::Pubkey;

use crate::rescue::error::RescueError;

/// One SPL token balance on an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBalance {
    pub mint: Pubkey,
    pub amount: u64,
    pub decimals: u8,
}

/// Balance discovery over some RPC backend
pub trait AssetScanner: Send + Sync {
    fn native_balance(&self, address: &Pubkey) -> Result<u64, RescueError>;

    fn token_accounts(&self, address: &Pubkey) -> Result<Vec<TokenBalance>, RescueError>;
}

/// In-memory scanner for tests and dry runs
#[derive(Default)]
pub struct MockScanner {
    accounts: Mutex<HashMap<Pubkey, (u64, Vec<TokenBalance>)>>,
    /// Artificial latency applied to every call
    delay: Option<Duration>,
}

impl MockScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_balances(&self, address: Pubkey, native: u64, tokens: Vec<TokenBalance>) {
        self.accounts
            .lock()
            .unwrap()
            .insert(address, (native, tokens));
    }

    fn simulate_latency(&self) {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
    }
}

impl AssetScanner for MockScanner {
    fn native_balance(&self, address: &Pubkey) -> Result<u64, RescueError> {
        self.simulate_latency();
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(address)
            .map(|(native, _)| *native)
            .unwrap_or(0))
    }

    fn token_accounts(&self, address: &Pubkey) -> Result<Vec<TokenBalance>, RescueError> {
        self.simulate_latency();
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .get(address)
            .map(|(_, tokens)| tokens.clone())
            .unwrap_or_default())
    }
}
