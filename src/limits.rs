use std::time::Duration;

/// Upper bound for a single gateway exchange (query, claim, profile lookup).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Gaps longer than this are slept through coarsely, re-sampling the clock at
/// least every `MAX_COARSE_SLEEP`.
pub const COARSE_THRESHOLD: Duration = Duration::from_secs(10);
pub const MAX_COARSE_SLEEP: Duration = Duration::from_secs(30);

/// Last N seconds before the release instant are announced one by one.
pub const COUNTDOWN_SECS: u64 = 5;

/// Platform `actionState` meaning "action succeeded" for orders and profile lookups.
pub const ACTION_OK_STATE: i64 = 1;

/// Platform `actionState` meaning "login succeeded". Login disagrees with every
/// other endpoint.
pub const LOGIN_OK_STATE: i64 = 0;

/// Lock flag value the catalog treats as "unlocked". Anything else is locked.
pub const UNLOCKED_FLAG: i64 = 0;

/// Broadcast buffer per run for progress subscribers.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 256;
