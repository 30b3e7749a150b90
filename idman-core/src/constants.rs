/// Toolkit version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// On-disk backup format version written into metadata.
pub const BACKUP_FORMAT_VERSION: &str = "1.0";

/// Default number of records dispatched per executor batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Smallest accepted executor batch size.
pub const MIN_BATCH_SIZE: usize = 1;

/// Largest accepted executor batch size.
pub const MAX_BATCH_SIZE: usize = 50;

/// Per-item operation timeout in seconds.
pub const DEFAULT_ITEM_TIMEOUT_SECS: u64 = 60;

/// Inspection window for completed operation state before eviction.
pub const DEFAULT_OPERATION_STATE_TTL_SECS: u64 = 300;

/// Validity window for the orphaned-assignment detection cache.
pub const DEFAULT_ORPHAN_CACHE_TTL_SECS: u64 = 3_600;

/// Cardinality at which compatibility validation warns about user count.
pub const USER_COUNT_WARNING: usize = 40_000;

/// Cardinality at which compatibility validation warns about group count.
pub const GROUP_COUNT_WARNING: usize = 8_000;

/// Cardinality at which compatibility validation warns about permission set count.
pub const PERMISSION_SET_COUNT_WARNING: usize = 400;
