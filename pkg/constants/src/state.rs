//! State store key layout.

/// Prefix under which projects (tenants) are stored: `/registry/projects/{name}`.
pub const PROJECTS_PREFIX: &str = "/registry/projects/";

/// Prefix for app instances: `/registry/appinstances/{ns}/{name}`.
pub const APP_INSTANCES_PREFIX: &str = "/registry/appinstances/";

/// Prefix for quota requests: `/registry/quotarequests/{ns}/{name}`.
pub const QUOTA_REQUESTS_PREFIX: &str = "/registry/quotarequests/";

/// Prefix for project-scoped compute classes: `/registry/projectcomputeclasses/{ns}/{name}`.
pub const PROJECT_COMPUTE_CLASSES_PREFIX: &str = "/registry/projectcomputeclasses/";

/// Prefix for cluster-scoped compute classes: `/registry/clustercomputeclasses/{name}`.
pub const CLUSTER_COMPUTE_CLASSES_PREFIX: &str = "/registry/clustercomputeclasses/";
