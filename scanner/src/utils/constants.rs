pub const DEFAULT_STARTED_FIELD: &str = "/taskState/started";
pub const DEFAULT_COMPLETED_FIELD: &str = "/taskState/completed";
pub const DEFAULT_RECOVERY_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_CLAIM_MAX_ATTEMPTS: u32 = 16;
pub const DEFAULT_CLAIM_BASE_DELAY_MS: u64 = 10;
pub const DEFAULT_CLAIM_MAX_DELAY_MS: u64 = 1_000;

/// Filter keys with this prefix are query parameters rather than field predicates
pub const QUERY_PARAMETER_PREFIX: char = '_';
