use pkg_constants::state::{CLUSTER_COMPUTE_CLASSES_PREFIX, PROJECT_COMPUTE_CLASSES_PREFIX};
use pkg_state::object::{get_object, list_objects};
use pkg_state::store::KvStore;
use pkg_types::computeclass::{
    ComputeClass, cluster_compute_class_key, project_compute_class_key,
};
use pkg_types::project::{Project, project_key};
use pkg_types::workload::WorkloadMap;
use tracing::{debug, warn};

/// Find a compute class visible from `ns`. Project-scoped classes shadow
/// cluster-scoped ones of the same name. `Ok(None)` when neither exists.
pub async fn lookup<S: KvStore + ?Sized>(
    store: &S,
    ns: &str,
    name: &str,
) -> anyhow::Result<Option<ComputeClass>> {
    if name.is_empty() {
        return Ok(None);
    }
    if let Some(cc) = get_object(store, &project_compute_class_key(ns, name)).await? {
        return Ok(Some(cc));
    }
    get_object(store, &cluster_compute_class_key(name)).await
}

/// Name of the default compute class for a project, if one is configured.
///
/// The project's own setting wins, then a project-scoped class marked
/// default, then a cluster-scoped one. Among several marked classes the
/// lexically first is used.
pub async fn default_class_name<S: KvStore + ?Sized>(
    store: &S,
    ns: &str,
) -> anyhow::Result<Option<String>> {
    let project: Option<Project> = get_object(store, &project_key(ns)).await?;
    if let Some(name) = project.and_then(|p| p.default_compute_class)
        && !name.is_empty()
    {
        return Ok(Some(name));
    }

    let project_prefix = format!("{}{}/", PROJECT_COMPUTE_CLASSES_PREFIX, ns);
    if let Some(name) = first_default(store, &project_prefix).await? {
        return Ok(Some(name));
    }
    first_default(store, CLUSTER_COMPUTE_CLASSES_PREFIX).await
}

async fn first_default<S: KvStore + ?Sized>(
    store: &S,
    prefix: &str,
) -> anyhow::Result<Option<String>> {
    let defaults: Vec<String> = list_objects::<ComputeClass, _>(store, prefix)
        .await?
        .into_iter()
        .filter(|(_, cc)| cc.default)
        .map(|(_, cc)| cc.name)
        .collect();
    if defaults.len() > 1 {
        warn!(
            "Multiple default compute classes under {}: {:?}, using {}",
            prefix, defaults, defaults[0]
        );
    }
    Ok(defaults.into_iter().next())
}

/// Compute class an operator picked for `workload`: its own override first,
/// then the app-wide one. `Ok(None)` when no override names an existing class.
pub async fn class_for_workload<S: KvStore + ?Sized>(
    store: &S,
    overrides: &WorkloadMap<String>,
    workload: &str,
    ns: &str,
) -> anyhow::Result<Option<ComputeClass>> {
    let Some(name) = overrides.get(workload) else {
        return Ok(None);
    };
    let cc = lookup(store, ns, name).await?;
    if cc.is_none() {
        debug!("Compute class {} for workload {} not found in {}", name, workload, ns);
    }
    Ok(cc)
}
