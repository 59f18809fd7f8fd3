pub mod error;
pub mod field_path;
pub mod job;
pub mod record;
pub mod scan;
pub mod statistics;

pub use field_path::FieldPath;
pub use job::{JobState, ScanJob};
pub use record::{Record, Revision};
pub use scan::{ActionRef, ClaimRetryPolicy, LaunchMode, ScanConfig};
pub use statistics::{Progress, RunStatistics, StatisticsSnapshot};
