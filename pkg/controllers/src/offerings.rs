//! Offering resolution: settles the compute class, memory and CPU scaler of
//! every container, job and sidecar of an app instance.
//!
//! Memory is chosen by the first source that is set, in this order:
//! 1. operator override for the workload
//! 2. operator override for all workloads
//! 3. memory declared by the image
//! 4. default memory of the selected compute class
//! 5. the cluster-wide default from config

use anyhow::Context;
use pkg_state::store::KvStore;
use pkg_types::app::{AppInstance, Container, ResolvedOffering};
use pkg_types::computeclass::ComputeClass;
use pkg_types::config::OfferingDefaults;
use pkg_types::workload::WorkloadMap;
use std::collections::HashMap;
use tracing::debug;

use crate::computeclass;

/// A looked-up compute class with its memory already parsed.
#[derive(Debug, Clone)]
struct SelectedClass {
    name: String,
    cpu_scaler: f64,
    default_memory: Option<u64>,
}

impl SelectedClass {
    fn from_class(cc: ComputeClass) -> anyhow::Result<Self> {
        let parsed = cc
            .memory
            .parse()
            .with_context(|| format!("compute class {} has invalid memory", cc.name))?;
        Ok(Self {
            default_memory: parsed.default_bytes(),
            cpu_scaler: cc.cpu_scaler,
            name: cc.name,
        })
    }
}

/// Resolve offerings for `app` and store them in its status.
///
/// Missing compute classes are not errors; store failures and malformed
/// compute-class memory are.
pub async fn resolve_offerings<S: KvStore + ?Sized>(
    store: &S,
    defaults: &OfferingDefaults,
    app: &mut AppInstance,
) -> anyhow::Result<()> {
    let ns = app.namespace.clone();

    // App-wide default
    let default_name = match &app.spec.compute_classes.all {
        Some(name) => Some(name.clone()),
        None => computeclass::default_class_name(store, &ns).await?,
    };
    let default_class = match &default_name {
        Some(name) => computeclass::lookup(store, &ns, name)
            .await?
            .map(SelectedClass::from_class)
            .transpose()?,
        None => None,
    };
    let default_name = default_name.unwrap_or_default();

    let mut all = ResolvedOffering {
        class: default_name.clone(),
        memory: defaults.workload_memory_default,
        cpu_scaler: None,
    };
    if let Some(cc) = &default_class {
        if cc.default_memory.is_some() {
            all.memory = cc.default_memory;
        }
        all.cpu_scaler = Some(cc.cpu_scaler);
    }
    if let Some(memory) = app.spec.memory.all {
        all.memory = Some(memory);
    }

    let mut resolved = WorkloadMap::default().with_all(all);

    // Workloads sharing an override only look it up once per pass.
    let mut cache: HashMap<String, Option<SelectedClass>> = HashMap::new();

    let workloads: Vec<(&String, &Container)> = app
        .status
        .app_spec
        .containers
        .iter()
        .chain(app.status.app_spec.jobs.iter())
        .collect();

    for (name, container) in workloads {
        let class = match app.spec.compute_classes.get(name) {
            Some(cc_name) => {
                if !cache.contains_key(cc_name) {
                    let cc = computeclass::class_for_workload(
                        store,
                        &app.spec.compute_classes,
                        name,
                        &ns,
                    )
                    .await?
                    .map(SelectedClass::from_class)
                    .transpose()?;
                    cache.insert(cc_name.clone(), cc);
                }
                cache.get(cc_name).cloned().flatten()
            }
            None => None,
        };
        let class = class.or_else(|| default_class.clone());

        let offering = resolve_workload(
            name,
            container,
            &app.spec.memory,
            class.as_ref(),
            &default_name,
            defaults,
        );
        debug!(
            "App {}/{}: workload {} -> class={:?} memory={:?}",
            ns, app.name, name, offering.class, offering.memory
        );

        for sidecar in container.sidecars.keys() {
            resolved.insert(sidecar.clone(), offering.clone());
        }
        resolved.insert(name.clone(), offering);
    }

    app.status.resolved_offerings.containers = resolved;
    Ok(())
}

fn resolve_workload(
    name: &str,
    container: &Container,
    memory_overrides: &WorkloadMap<u64>,
    class: Option<&SelectedClass>,
    default_name: &str,
    defaults: &OfferingDefaults,
) -> ResolvedOffering {
    let memory = memory_overrides
        .get(name)
        .copied()
        .or(container.memory)
        .or_else(|| class.and_then(|cc| cc.default_memory))
        .or(defaults.workload_memory_default);

    ResolvedOffering {
        class: class
            .map(|cc| cc.name.clone())
            .unwrap_or_else(|| default_name.to_string()),
        memory,
        cpu_scaler: class.map(|cc| cc.cpu_scaler),
    }
}
