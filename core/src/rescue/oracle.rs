//! Price oracle collaborator
//!
//! Valuation is informational only. On total oracle failure the orchestrator
//! falls back to a zero valuation rather than blocking the rescue.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::rescue::error::RescueError;
use crate::rescue::plan::AssetKind;

/// A USD quote for one whole unit of an asset
#[derive(Debug, Clone)]
pub struct PriceQuote {
    pub usd: f64,
    pub source: String,
    pub unix_timestamp: u64,
}

pub trait PriceOracle: Send + Sync {
    /// Price per whole unit (per SOL, per whole token).
    fn price_usd(&self, asset: &AssetKind) -> Result<PriceQuote, RescueError>;
}

/// Static price table for tests and dry runs
#[derive(Default)]
pub struct MockOracle {
    native_usd: f64,
    token_usd: HashMap<String, f64>,
}

impl MockOracle {
    pub fn new(native_usd: f64) -> Self {
        Self {
            native_usd,
            token_usd: HashMap::new(),
        }
    }

    pub fn with_token(mut self, mint: &str, usd: f64) -> Self {
        self.token_usd.insert(mint.to_string(), usd);
        self
    }
}

impl PriceOracle for MockOracle {
    fn price_usd(&self, asset: &AssetKind) -> Result<PriceQuote, RescueError> {
        let usd = match asset {
            AssetKind::Native => self.native_usd,
            AssetKind::Token { mint, .. } => self
                .token_usd
                .get(&mint.to_string())
                .copied()
                .unwrap_or(0.0),
        };

        Ok(PriceQuote {
            usd,
            source: "mock".to_string(),
            unix_timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        })
    }
}
