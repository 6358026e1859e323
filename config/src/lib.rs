//! Lifeboat Configuration
//!
//! Shared configuration crate for all Lifeboat components.
//!
//! Handles loading configuration from:
//! 1. LB_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.lifeboat/config.toml (user home)
//!
//! Environment variables take precedence over TOML config. The audit-log
//! passphrase is only ever read from the environment (LB_AUDIT_PASSPHRASE),
//! never from a config file on disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<LifeboatConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".lifeboat";

// ============================================================================
// Default Constants (avoid repeated allocations)
// ============================================================================

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_FEE_BUFFER_LAMPORTS: u64 = 5_000_000;
const DEFAULT_MIN_VALUE_USD: f64 = 1.0;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_VERIFY_TOLERANCE_LAMPORTS: u64 = 10_000;
const DEFAULT_PRIORITY_FEE: u64 = 10_000;

const DEFAULT_BATCH_BUDGET: usize = 12;
const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 400_000;
const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 10_000;
const DEFAULT_SHIELD_PROGRAM: &str = "LifeB8p1Xb1d4a4P3gq6WQkzFkkkXY7FkVfuGArKjbd";

const DEFAULT_TREE_LEVELS: u8 = 20;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifeboatConfig {
    #[serde(default)]
    pub rescue: RescueTomlConfig,
    #[serde(default)]
    pub planner: PlannerTomlConfig,
    #[serde(default)]
    pub pool: PoolTomlConfig,
    #[serde(default)]
    pub audit: AuditTomlConfig,
}

/// Rescue orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescueTomlConfig {
    /// Maximum attempts through the prove/submit loop
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed backoff between root-drift retries (ms)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Lamports held back from the native balance to cover fees
    #[serde(default = "default_fee_buffer")]
    pub fee_buffer_lamports: u64,
    /// Assets valued below this are flagged low priority (informational)
    #[serde(default = "default_min_value_usd")]
    pub min_value_usd: f64,
    /// Per-call timeout applied to every collaborator call (ms)
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Tolerance when re-verifying destination balances (lamports)
    #[serde(default = "default_verify_tolerance")]
    pub verify_tolerance_lamports: u64,
    /// Priority fee forwarded to the bundle relay (micro-lamports per CU)
    #[serde(default = "default_priority_fee")]
    pub priority_fee_micro_lamports: u64,
}

impl Default for RescueTomlConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            fee_buffer_lamports: DEFAULT_FEE_BUFFER_LAMPORTS,
            min_value_usd: DEFAULT_MIN_VALUE_USD,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            verify_tolerance_lamports: DEFAULT_VERIFY_TOLERANCE_LAMPORTS,
            priority_fee_micro_lamports: DEFAULT_PRIORITY_FEE,
        }
    }
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_retry_delay_ms() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}
fn default_fee_buffer() -> u64 {
    DEFAULT_FEE_BUFFER_LAMPORTS
}
fn default_min_value_usd() -> f64 {
    DEFAULT_MIN_VALUE_USD
}
fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT_MS
}
fn default_verify_tolerance() -> u64 {
    DEFAULT_VERIFY_TOLERANCE_LAMPORTS
}
fn default_priority_fee() -> u64 {
    DEFAULT_PRIORITY_FEE
}

/// Batch planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerTomlConfig {
    /// Hard ceiling on instructions per batch, overhead included
    #[serde(default = "default_batch_budget")]
    pub max_instructions_per_batch: usize,
    #[serde(default = "default_compute_unit_limit")]
    pub compute_unit_limit: u32,
    #[serde(default = "default_compute_unit_price")]
    pub compute_unit_price_micro_lamports: u64,
    /// Close emptied source token accounts and reclaim rent
    #[serde(default = "default_true")]
    pub close_source_accounts: bool,
    /// Shield pool program receiving the privacy deposit
    #[serde(default = "default_shield_program")]
    pub shield_program_id: String,
}

impl Default for PlannerTomlConfig {
    fn default() -> Self {
        Self {
            max_instructions_per_batch: DEFAULT_BATCH_BUDGET,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
            compute_unit_price_micro_lamports: DEFAULT_COMPUTE_UNIT_PRICE,
            close_source_accounts: true,
            shield_program_id: DEFAULT_SHIELD_PROGRAM.into(),
        }
    }
}

fn default_batch_budget() -> usize {
    DEFAULT_BATCH_BUDGET
}
fn default_compute_unit_limit() -> u32 {
    DEFAULT_COMPUTE_UNIT_LIMIT
}
fn default_compute_unit_price() -> u64 {
    DEFAULT_COMPUTE_UNIT_PRICE
}
fn default_true() -> bool {
    true
}
fn default_shield_program() -> String {
    DEFAULT_SHIELD_PROGRAM.into()
}

/// Shielded pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolTomlConfig {
    /// Commitment tree depth (capacity 2^levels leaves)
    #[serde(default = "default_tree_levels")]
    pub levels: u8,
}

impl Default for PoolTomlConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_TREE_LEVELS,
        }
    }
}

fn default_tree_levels() -> u8 {
    DEFAULT_TREE_LEVELS
}

/// Encrypted audit log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditTomlConfig {
    /// Path to the append-only audit log; disabled when unset
    #[serde(default)]
    pub path: Option<String>,
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(key: &str, field: &mut Option<String>) {
    if let Ok(v) = env::var(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl LifeboatConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                let contents = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check LB_CONFIG env var
        if let Ok(path) = env::var("LB_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.lifeboat/config.toml
        dirs::home_dir()
            .map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Rescue
        env_parse("LB_MAX_ATTEMPTS", &mut self.rescue.max_attempts);
        env_parse("LB_RETRY_DELAY_MS", &mut self.rescue.retry_delay_ms);
        env_parse("LB_FEE_BUFFER_LAMPORTS", &mut self.rescue.fee_buffer_lamports);
        env_parse("LB_MIN_VALUE_USD", &mut self.rescue.min_value_usd);
        env_parse("LB_CALL_TIMEOUT_MS", &mut self.rescue.call_timeout_ms);
        env_parse(
            "LB_VERIFY_TOLERANCE_LAMPORTS",
            &mut self.rescue.verify_tolerance_lamports,
        );
        env_parse(
            "LB_PRIORITY_FEE",
            &mut self.rescue.priority_fee_micro_lamports,
        );

        // Planner
        env_parse(
            "LB_BATCH_BUDGET",
            &mut self.planner.max_instructions_per_batch,
        );
        env_string("LB_SHIELD_PROGRAM", &mut self.planner.shield_program_id);
        if let Some(v) = env_bool("LB_CLOSE_SOURCE_ACCOUNTS") {
            self.planner.close_source_accounts = v;
        }

        // Pool
        env_parse("LB_TREE_LEVELS", &mut self.pool.levels);

        // Audit
        env_option_string("LB_AUDIT_LOG", &mut self.audit.path);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Audit-log passphrase, environment-only by design
    pub fn audit_passphrase() -> Option<String> {
        env::var("LB_AUDIT_PASSPHRASE").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = LifeboatConfig::default();
        assert_eq!(cfg.rescue.max_attempts, 3);
        assert_eq!(cfg.planner.max_instructions_per_batch, 12);
        assert_eq!(cfg.pool.levels, 20);
        assert!(cfg.audit.path.is_none());
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: LifeboatConfig = toml::from_str(
            r#"
            [rescue]
            max_attempts = 5

            [planner]
            max_instructions_per_batch = 8
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rescue.max_attempts, 5);
        assert_eq!(cfg.planner.max_instructions_per_batch, 8);
        // untouched sections fall back to defaults
        assert_eq!(cfg.rescue.retry_delay_ms, 500);
        assert!(cfg.planner.close_source_accounts);
    }

    #[test]
    fn rescue_env_overrides_apply() {
        unsafe {
            env::set_var("LB_VERIFY_TOLERANCE_LAMPORTS", "25000");
            env::set_var("LB_MAX_ATTEMPTS", "7");
        }

        let mut cfg = LifeboatConfig::default();
        cfg.apply_env_overrides();

        unsafe {
            env::remove_var("LB_VERIFY_TOLERANCE_LAMPORTS");
            env::remove_var("LB_MAX_ATTEMPTS");
        }

        assert_eq!(cfg.rescue.verify_tolerance_lamports, 25_000);
        assert_eq!(cfg.rescue.max_attempts, 7);
    }
}
