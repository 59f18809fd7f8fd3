pub mod claim;
pub mod fetcher;
pub mod partitioner;
pub mod runner;
pub mod service;

pub use claim::{ClaimExecutor, RecordOutcome, SkipReason};
pub use fetcher::Fetcher;
pub use partitioner::partition;
pub use runner::ScanRunner;
pub use service::ScanService;
