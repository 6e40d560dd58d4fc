//! Quota and offering constants.

/// Project annotation that turns quota enforcement on when set to `"true"`.
pub const ENFORCED_QUOTA_ANNOTATION: &str = "allot.io/enforced-quota";

/// Condition slot on an app instance that gates deployment on quota.
pub const APP_CONDITION_QUOTA: &str = "quota";

/// Condition slot written by the quota authority on a quota request.
pub const QUOTA_REQUEST_CONDITION: &str = "quota-request";

/// Message reported while the authority has not caught up.
pub const WAITING_FOR_ALLOCATION: &str = "waiting for quota allocation";

/// Default resync interval of the app controller, in seconds.
pub const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 15;
