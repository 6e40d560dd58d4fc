//! Quota accounting for app instances.
//!
//! `ensure_quota_request` writes the footprint an app needs as a
//! [`QuotaRequest`]; the quota authority answers by filling in the request's
//! status. `wait_for_allocation` reads that answer back and gates the app on
//! it through the `quota` condition.

use chrono::Utc;
use pkg_constants::quota::{APP_CONDITION_QUOTA, WAITING_FOR_ALLOCATION};
use pkg_state::object::{get_object, update_object};
use pkg_state::store::KvStore;
use pkg_types::app::{AppInstance, Container, SecretBinding, VolumeBinding};
use pkg_types::project::{Project, project_key};
use pkg_types::quantity::{Quantity, QuantityError};
use pkg_types::quota::{
    QuotaRequest, QuotaRequestSpec, QuotaRequestStatus, QuotaResources, quota_request_key,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::condition::ConditionSetter;

/// Where an app stands with respect to quota on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaState {
    /// The project does not enforce quota.
    Disabled,
    /// No answer from the authority yet, or the grant lags the request.
    Pending,
    /// The authority refused; carries its message.
    Failed(String),
    /// Requested and allocated resources match and the authority agrees.
    Allocated,
}

impl QuotaState {
    /// Whether dependent deployment steps may proceed.
    pub fn is_ready(&self) -> bool {
        matches!(self, QuotaState::Disabled | QuotaState::Allocated)
    }
}

/// Derive the quota state from what is currently stored. Pure, so every tick
/// reaches the same answer for the same inputs.
pub fn allocation_state(enforced: bool, request: Option<&QuotaRequest>) -> QuotaState {
    if !enforced {
        return QuotaState::Disabled;
    }
    let Some(request) = request else {
        return QuotaState::Pending;
    };
    match request.condition() {
        Some(cond) if cond.is_error() => QuotaState::Failed(cond.message.clone()),
        _ if !request.is_allocated() => QuotaState::Pending,
        Some(cond) if cond.is_success() => QuotaState::Allocated,
        _ => QuotaState::Pending,
    }
}

/// Whether the project owning `ns` enforces quota. A missing project is an error.
pub async fn is_enforced<S: KvStore + ?Sized>(store: &S, ns: &str) -> anyhow::Result<bool> {
    let project: Option<Project> = get_object(store, &project_key(ns)).await?;
    match project {
        Some(p) => Ok(p.quota_enforced()),
        None => anyhow::bail!("project {} not found", ns),
    }
}

/// Gate `app` on its quota request. Sets the `quota` condition and returns the
/// state it was derived from.
pub async fn wait_for_allocation<S: KvStore + ?Sized>(
    store: &S,
    app: &mut AppInstance,
) -> anyhow::Result<QuotaState> {
    let enforced = match is_enforced(store, &app.namespace).await {
        Ok(enforced) => enforced,
        Err(e) => {
            ConditionSetter::new(&mut app.status.conditions, APP_CONDITION_QUOTA).error(&e);
            return Err(e);
        }
    };

    let request: Option<QuotaRequest> = if enforced {
        get_object(store, &quota_request_key(&app.namespace, &app.name)).await?
    } else {
        None
    };

    let state = allocation_state(enforced, request.as_ref());
    let mut status = ConditionSetter::new(&mut app.status.conditions, APP_CONDITION_QUOTA);
    match &state {
        QuotaState::Disabled | QuotaState::Allocated => status.success(),
        QuotaState::Pending => status.unknown(WAITING_FOR_ALLOCATION),
        QuotaState::Failed(message) => {
            status.error(format!("quota allocation failed: {}", message))
        }
    }
    Ok(state)
}

/// Create or update the quota request for `app` when its project enforces
/// quota. The authority-owned status of an existing request is preserved.
pub async fn ensure_quota_request<S: KvStore + ?Sized>(
    store: &S,
    app: &mut AppInstance,
) -> anyhow::Result<()> {
    if !is_enforced(store, &app.namespace).await? {
        return Ok(());
    }

    let resources = match aggregate(app) {
        Ok(resources) => resources,
        Err(e) => {
            ConditionSetter::new(&mut app.status.conditions, APP_CONDITION_QUOTA).error(&e);
            return Err(e.into());
        }
    };

    let key = quota_request_key(&app.namespace, &app.name);
    let (ns, name) = (app.namespace.clone(), app.name.clone());
    let mut created = false;
    // Only spec.resources is ours; status belongs to the quota authority.
    let written = update_object(store, &key, |existing: Option<QuotaRequest>| {
        match existing {
            Some(existing) if existing.spec.resources == resources => None,
            Some(mut existing) => {
                created = false;
                existing.spec.resources = resources.clone();
                Some(existing)
            }
            None => {
                created = true;
                Some(QuotaRequest {
                    name: name.clone(),
                    namespace: ns.clone(),
                    spec: QuotaRequestSpec {
                        resources: resources.clone(),
                    },
                    status: QuotaRequestStatus::default(),
                    created_at: Utc::now(),
                })
            }
        }
    })
    .await?;

    match written {
        None => debug!("QuotaRequest {}/{} up to date", ns, name),
        Some(_) if created => info!("Created QuotaRequest {}/{}", ns, name),
        Some(_) => info!("Updated QuotaRequest {}/{}", ns, name),
    }
    Ok(())
}

/// Footprint of `app`: container replicas, counts, storage and the compute
/// requests of every container and sidecar. Jobs are counted but their
/// compute is not, since they do not run continuously.
pub fn aggregate(app: &AppInstance) -> Result<QuotaResources, QuantityError> {
    let spec = &app.status.app_spec;
    let mut resources = QuotaResources {
        jobs: count(spec.jobs.len()),
        images: count(spec.images.len()),
        volumes: count(spec.volumes.len()),
        ..Default::default()
    };

    add_containers(&spec.containers, &mut resources);
    add_compute(app, &spec.containers, &mut resources);
    add_storage(app, &mut resources)?;
    Ok(resources)
}

fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

fn add_containers(containers: &BTreeMap<String, Container>, resources: &mut QuotaResources) {
    for container in containers.values() {
        resources.containers = resources.containers.saturating_add(container.replicas());
    }
}

fn add_compute(
    app: &AppInstance,
    containers: &BTreeMap<String, Container>,
    resources: &mut QuotaResources,
) {
    for (name, container) in containers {
        let replicas = container.replicas();
        add_requests(app, name, replicas, resources);
        // Sidecars cannot own sidecars, so one level is all there is.
        for sidecar in container.sidecars.keys() {
            add_requests(app, sidecar, replicas, resources);
        }
    }
}

fn add_requests(
    app: &AppInstance,
    workload: &str,
    replicas: u32,
    resources: &mut QuotaResources,
) {
    let Some(scheduling) = app.status.scheduling.get(workload) else {
        return;
    };
    let requests = &scheduling.requirements.requests;
    resources
        .cpu
        .add(requests.cpu.unwrap_or(Quantity::ZERO).times(replicas));
    resources
        .memory
        .add(requests.memory.unwrap_or(Quantity::ZERO).times(replicas));
}

fn add_storage(app: &AppInstance, resources: &mut QuotaResources) -> Result<(), QuantityError> {
    // Only volumes and secrets the app creates count; bound ones already exist.
    for (name, volume) in &app.status.app_spec.volumes {
        let size = bound_volume_size(name, &app.spec.volumes).unwrap_or(volume.size.as_str());
        if size.is_empty() || size == "0" {
            continue;
        }
        resources.volume_storage.add(Quantity::parse(size)?);
    }

    for name in app.status.app_spec.secrets.keys() {
        if bound_secret(name, &app.spec.secrets) {
            continue;
        }
        resources.secrets = resources.secrets.saturating_add(1);
    }
    Ok(())
}

/// Size from a binding that targets `name` without naming a source volume.
fn bound_volume_size<'a>(name: &str, bindings: &'a [VolumeBinding]) -> Option<&'a str> {
    bindings
        .iter()
        .find(|b| b.target == name && b.volume.is_empty())
        .map(|b| b.size.as_str())
}

fn bound_secret(name: &str, bindings: &[SecretBinding]) -> bool {
    bindings
        .iter()
        .any(|b| b.target == name && b.secret.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_constants::quota::{ENFORCED_QUOTA_ANNOTATION, QUOTA_REQUEST_CONDITION};
    use pkg_state::memory::MemoryStore;
    use crate::testing::{FailingStore, InterleavedStore};
    use pkg_constants::state::{PROJECTS_PREFIX, QUOTA_REQUESTS_PREFIX};
    use pkg_state::object::put_object;
    use pkg_types::app::{
        Image, ResourceList, ResourceRequirements, Scheduling, SecretRequest, Sidecar,
        VolumeRequest,
    };
    use pkg_types::condition::ConditionStatus;

    fn q(s: &str) -> Quantity {
        Quantity::parse(s).unwrap()
    }

    fn scheduling(cpu: &str, memory: &str) -> Scheduling {
        Scheduling {
            requirements: ResourceRequirements {
                requests: ResourceList {
                    cpu: Some(q(cpu)),
                    memory: Some(q(memory)),
                },
                limits: ResourceList::default(),
            },
        }
    }

    fn container(scale: Option<u32>, sidecars: &[&str]) -> Container {
        Container {
            image: "img".to_string(),
            scale,
            memory: None,
            sidecars: sidecars
                .iter()
                .map(|s| (s.to_string(), Sidecar::default()))
                .collect(),
        }
    }

    fn sample_app() -> AppInstance {
        let mut app = AppInstance::new("acme", "shop");
        let spec = &mut app.status.app_spec;
        spec.containers.insert("web".to_string(), container(Some(3), &["proxy"]));
        spec.containers.insert("worker".to_string(), container(None, &[]));
        spec.jobs.insert("migrate".to_string(), container(None, &[]));
        spec.images.insert("web".to_string(), Image::default());
        spec.images.insert("worker".to_string(), Image::default());

        app.status.scheduling = Default::default();
        app.status.scheduling.all = Some(scheduling("100m", "128Mi"));
        app.status.scheduling.insert("web", scheduling("500m", "512Mi"));
        app.status.scheduling.insert("proxy", scheduling("50m", "64Mi"));
        app.status.scheduling.insert("migrate", scheduling("4", "8Gi"));
        app
    }

    fn project(enforced: bool) -> Project {
        let mut p = Project::new("acme");
        if enforced {
            p.annotations
                .insert(ENFORCED_QUOTA_ANNOTATION.to_string(), "true".to_string());
        }
        p
    }

    async fn store_with_project(enforced: bool) -> MemoryStore {
        let store = MemoryStore::new();
        let p = project(enforced);
        put_object(&store, &p.key(), &p).await.unwrap();
        store
    }

    fn request_with(
        spec: QuotaResources,
        allocated: QuotaResources,
        authority: Option<(ConditionStatus, &str)>,
    ) -> QuotaRequest {
        let mut req = QuotaRequest {
            name: "shop".to_string(),
            namespace: "acme".to_string(),
            spec: QuotaRequestSpec { resources: spec },
            status: QuotaRequestStatus {
                allocated_resources: allocated,
                ..Default::default()
            },
            created_at: Utc::now(),
        };
        if let Some((status, message)) = authority {
            req.status
                .conditions
                .set(QUOTA_REQUEST_CONDITION, status, message);
        }
        req
    }

    fn quota_condition(app: &AppInstance) -> (ConditionStatus, String) {
        let c = app.status.conditions.get(APP_CONDITION_QUOTA).unwrap();
        (c.status, c.message.clone())
    }

    // --- aggregation ---

    #[test]
    fn aggregates_counts_and_compute() {
        let r = aggregate(&sample_app()).unwrap();

        assert_eq!(r.containers, 4);
        assert_eq!(r.jobs, 1);
        assert_eq!(r.images, 2);
        // web: 3 x (500m + proxy 50m), worker falls back to 100m; job excluded
        assert_eq!(r.cpu, q("1750m"));
        assert_eq!(r.memory, q("1856Mi"));
    }

    #[test]
    fn workloads_without_scheduling_add_nothing() {
        let mut app = sample_app();
        app.status.scheduling = Default::default();
        let r = aggregate(&app).unwrap();
        assert_eq!(r.cpu, Quantity::ZERO);
        assert_eq!(r.memory, Quantity::ZERO);
        assert_eq!(r.containers, 4);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let app = sample_app();
        assert_eq!(aggregate(&app).unwrap(), aggregate(&app).unwrap());
    }

    #[test]
    fn huge_scales_saturate_instead_of_overflowing() {
        let scale = u32::MAX / 2 + 1;
        let mut app = AppInstance::new("acme", "shop");
        let spec = &mut app.status.app_spec;
        spec.containers.insert("a".to_string(), container(Some(scale), &[]));
        spec.containers.insert("b".to_string(), container(Some(scale), &[]));
        app.status.scheduling.all = Some(scheduling("500m", "1Mi"));

        let r = aggregate(&app).unwrap();
        assert_eq!(r.containers, u32::MAX);
        assert_eq!(r.cpu, Quantity::from_millis(500 * 2 * u64::from(scale)));
    }

    #[test]
    fn storage_skips_bound_and_unsized_volumes() {
        let mut app = AppInstance::new("acme", "shop");
        let volumes = &mut app.status.app_spec.volumes;
        let sizes = [
            ("data", "10Gi"),
            ("cache", "1Gi"),
            ("scratch", "0"),
            ("logs", ""),
            ("db", "2Gi"),
        ];
        for (name, size) in sizes {
            volumes.insert(
                name.to_string(),
                VolumeRequest {
                    size: size.to_string(),
                    class: String::new(),
                },
            );
        }
        app.spec.volumes = vec![
            // bound without a new size: excluded
            VolumeBinding {
                target: "cache".to_string(),
                volume: String::new(),
                size: String::new(),
            },
            // bound with an explicit size: that size counts
            VolumeBinding {
                target: "db".to_string(),
                volume: String::new(),
                size: "5Gi".to_string(),
            },
            // names a source volume: the requested size still counts
            VolumeBinding {
                target: "data".to_string(),
                volume: "existing-data".to_string(),
                size: String::new(),
            },
        ];

        let r = aggregate(&app).unwrap();
        assert_eq!(r.volume_storage, q("15Gi"));
        assert_eq!(r.volumes, 5);
    }

    #[test]
    fn unparseable_volume_size_fails() {
        let mut app = AppInstance::new("acme", "shop");
        app.status.app_spec.volumes.insert(
            "data".to_string(),
            VolumeRequest {
                size: "ten gigs".to_string(),
                class: String::new(),
            },
        );
        assert!(aggregate(&app).is_err());
    }

    #[test]
    fn bound_secrets_are_not_counted() {
        let mut app = AppInstance::new("acme", "shop");
        for name in ["tls", "db-password", "api-key"] {
            app.status
                .app_spec
                .secrets
                .insert(name.to_string(), SecretRequest::default());
        }
        app.spec.secrets = vec![
            SecretBinding {
                target: "tls".to_string(),
                secret: String::new(),
            },
            SecretBinding {
                target: "api-key".to_string(),
                secret: "shared-key".to_string(),
            },
        ];
        assert_eq!(aggregate(&app).unwrap().secrets, 2);
    }

    // --- state derivation ---

    #[test]
    fn state_is_disabled_when_not_enforced() {
        let req = request_with(QuotaResources::default(), QuotaResources::default(), None);
        assert_eq!(allocation_state(false, Some(&req)), QuotaState::Disabled);
        assert!(QuotaState::Disabled.is_ready());
    }

    #[test]
    fn state_is_pending_without_request() {
        assert_eq!(allocation_state(true, None), QuotaState::Pending);
    }

    #[test]
    fn state_is_allocated_when_matching_and_successful() {
        let r = aggregate(&sample_app()).unwrap();
        let req = request_with(r.clone(), r, Some((ConditionStatus::Success, "")));
        assert_eq!(allocation_state(true, Some(&req)), QuotaState::Allocated);
    }

    #[test]
    fn cpu_mismatch_keeps_state_pending() {
        let spec = QuotaResources {
            cpu: q("500m"),
            ..Default::default()
        };
        let allocated = QuotaResources {
            cpu: q("250m"),
            ..Default::default()
        };
        let req = request_with(spec, allocated, Some((ConditionStatus::Success, "")));
        assert_eq!(allocation_state(true, Some(&req)), QuotaState::Pending);
    }

    #[test]
    fn authority_error_wins_over_matching_resources() {
        let r = QuotaResources::default();
        let req = request_with(r.clone(), r, Some((ConditionStatus::Error, "over limit")));
        assert_eq!(
            allocation_state(true, Some(&req)),
            QuotaState::Failed("over limit".to_string())
        );
    }

    #[test]
    fn matching_without_authority_verdict_is_pending() {
        let r = QuotaResources::default();
        let req = request_with(r.clone(), r, None);
        assert_eq!(allocation_state(true, Some(&req)), QuotaState::Pending);
    }

    // --- store-backed flows ---

    #[tokio::test]
    async fn disabled_tenant_succeeds_without_request() {
        let store = store_with_project(false).await;
        let mut app = sample_app();

        ensure_quota_request(&store, &mut app).await.unwrap();
        let state = wait_for_allocation(&store, &mut app).await.unwrap();

        assert_eq!(state, QuotaState::Disabled);
        assert_eq!(quota_condition(&app).0, ConditionStatus::Success);
        let req: Option<QuotaRequest> = get_object(&store, &quota_request_key("acme", "shop"))
            .await
            .unwrap();
        assert!(req.is_none());
    }

    #[tokio::test]
    async fn missing_project_is_an_error() {
        let store = MemoryStore::new();
        let mut app = sample_app();

        assert!(ensure_quota_request(&store, &mut app).await.is_err());
        assert!(wait_for_allocation(&store, &mut app).await.is_err());
        let (status, message) = quota_condition(&app);
        assert_eq!(status, ConditionStatus::Error);
        assert!(message.contains("acme"));
    }

    #[tokio::test]
    async fn request_lifecycle() {
        let store = store_with_project(true).await;
        let mut app = sample_app();
        let key = quota_request_key("acme", "shop");

        // First tick: request created, nothing allocated yet.
        ensure_quota_request(&store, &mut app).await.unwrap();
        let state = wait_for_allocation(&store, &mut app).await.unwrap();
        assert_eq!(state, QuotaState::Pending);
        assert_eq!(
            quota_condition(&app),
            (ConditionStatus::Unknown, WAITING_FOR_ALLOCATION.to_string())
        );

        // Authority grants the request.
        let mut req: QuotaRequest = get_object(&store, &key).await.unwrap().unwrap();
        assert_eq!(req.spec.resources, aggregate(&app).unwrap());
        req.status.allocated_resources = req.spec.resources.clone();
        req.status
            .conditions
            .set(QUOTA_REQUEST_CONDITION, ConditionStatus::Success, "");
        put_object(&store, &key, &req).await.unwrap();

        ensure_quota_request(&store, &mut app).await.unwrap();
        let state = wait_for_allocation(&store, &mut app).await.unwrap();
        assert_eq!(state, QuotaState::Allocated);
        assert_eq!(quota_condition(&app).0, ConditionStatus::Success);

        // App scales up: spec moves ahead of the grant, status is kept.
        app.status
            .app_spec
            .containers
            .get_mut("worker")
            .unwrap()
            .scale = Some(2);
        ensure_quota_request(&store, &mut app).await.unwrap();
        let updated: QuotaRequest = get_object(&store, &key).await.unwrap().unwrap();
        assert_eq!(updated.spec.resources.containers, 5);
        assert_eq!(updated.status.allocated_resources.containers, 4);
        assert_eq!(updated.created_at, req.created_at);

        let state = wait_for_allocation(&store, &mut app).await.unwrap();
        assert_eq!(state, QuotaState::Pending);
    }

    #[tokio::test]
    async fn authority_error_is_surfaced_verbatim() {
        let store = store_with_project(true).await;
        let mut app = sample_app();
        let r = aggregate(&app).unwrap();
        let req = request_with(
            r,
            QuotaResources::default(),
            Some((ConditionStatus::Error, "cpu limit of 2 exceeded")),
        );
        put_object(&store, &req.key(), &req).await.unwrap();

        let state = wait_for_allocation(&store, &mut app).await.unwrap();
        assert!(!state.is_ready());
        assert_eq!(
            quota_condition(&app),
            (
                ConditionStatus::Error,
                "quota allocation failed: cpu limit of 2 exceeded".to_string()
            )
        );
    }

    #[tokio::test]
    async fn resize_keeps_allocation_written_concurrently() {
        let store = store_with_project(true).await;
        let mut app = sample_app();
        let key = quota_request_key("acme", "shop");
        ensure_quota_request(&store, &mut app).await.unwrap();

        // The authority grants the original request while we are resizing.
        let mut granted: QuotaRequest = get_object(&store, &key).await.unwrap().unwrap();
        granted.status.allocated_resources = granted.spec.resources.clone();
        granted
            .status
            .conditions
            .set(QUOTA_REQUEST_CONDITION, ConditionStatus::Success, "");
        let racing = InterleavedStore::new(store.clone());
        racing.queue_write(&key, &granted);

        app.status
            .app_spec
            .containers
            .get_mut("worker")
            .unwrap()
            .scale = Some(2);
        ensure_quota_request(&racing, &mut app).await.unwrap();

        let stored: QuotaRequest = get_object(&store, &key).await.unwrap().unwrap();
        assert_eq!(stored.spec.resources.containers, 5);
        assert_eq!(stored.status.allocated_resources.containers, 4);
        assert!(stored.condition().unwrap().is_success());
    }

    #[tokio::test]
    async fn store_errors_propagate_instead_of_pending() {
        let store = store_with_project(true).await;
        let failing = FailingStore::new(store, QUOTA_REQUESTS_PREFIX);
        let mut app = sample_app();

        assert!(ensure_quota_request(&failing, &mut app).await.is_err());
        assert!(wait_for_allocation(&failing, &mut app).await.is_err());
        assert!(app.status.conditions.get(APP_CONDITION_QUOTA).is_none());
    }

    #[tokio::test]
    async fn project_lookup_errors_propagate() {
        let store = store_with_project(false).await;
        let failing = FailingStore::new(store, PROJECTS_PREFIX);
        let mut app = sample_app();

        assert!(ensure_quota_request(&failing, &mut app).await.is_err());
        let err = wait_for_allocation(&failing, &mut app).await.unwrap_err();
        assert!(err.to_string().contains("backend unavailable"));
        assert_eq!(quota_condition(&app).0, ConditionStatus::Error);
    }

    #[tokio::test]
    async fn bad_volume_size_sets_error_condition() {
        let store = store_with_project(true).await;
        let mut app = sample_app();
        app.status.app_spec.volumes.insert(
            "data".to_string(),
            VolumeRequest {
                size: "lots".to_string(),
                class: String::new(),
            },
        );

        assert!(ensure_quota_request(&store, &mut app).await.is_err());
        assert_eq!(quota_condition(&app).0, ConditionStatus::Error);
        let req: Option<QuotaRequest> = get_object(&store, &quota_request_key("acme", "shop"))
            .await
            .unwrap();
        assert!(req.is_none());
    }
}
