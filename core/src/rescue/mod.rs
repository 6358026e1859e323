pub mod audit;
pub mod error;
pub mod oracle;
pub mod orchestrator;
pub mod plan;
pub mod planner;
pub mod proof;
pub mod relay;
pub mod roots;
pub mod scanner;

pub use audit::{AuditLog, RescueRecord};
pub use error::RescueError;
pub use oracle::{MockOracle, PriceOracle, PriceQuote};
pub use orchestrator::{Phase, RescueConfig, RescueOrchestrator};
pub use plan::{AssetKind, DiscoveredAsset, RescueOutcome, RescuePlan, TxBatch};
pub use planner::{BatchPlanner, NativeLeg, PlannerConfig};
pub use proof::{CircuitInputs, MockProofBackend, Proof, ProofBackend};
pub use relay::{BundleReceipt, BundleRelay, MockRelay, ScriptedResponse};
pub use roots::{InMemoryRootHistory, RootHistory};
pub use scanner::{AssetScanner, MockScanner, TokenBalance};
