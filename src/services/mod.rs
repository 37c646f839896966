pub mod alert;
pub mod batch_planner;
pub mod block_detector;
pub mod delay;
pub mod export;
pub mod fetcher;
pub mod fingerprint;
pub mod ledger;
pub mod recovery;

pub use alert::WebhookAlerter;
pub use batch_planner::{BatchPlan, BatchPlanner};
pub use block_detector::{BlockDetector, BlockVerdict, DetectorConfig};
pub use delay::DelayRange;
pub use fetcher::{with_timeout, PageFetcher};
pub use fingerprint::{FingerprintRotator, IdentityPool};
pub use ledger::ProgressLedger;
pub use recovery::{RecoveryConfig, RecoveryStrategy};
