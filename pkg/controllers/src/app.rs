use pkg_constants::quota::{APP_CONDITION_QUOTA, DEFAULT_RESYNC_INTERVAL_SECS};
use pkg_constants::state::{APP_INSTANCES_PREFIX, PROJECTS_PREFIX};
use pkg_state::object::{list_objects, update_object};
use pkg_state::store::KvStore;
use pkg_types::app::AppInstance;
use pkg_types::config::OfferingDefaults;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::offerings::resolve_offerings;
use crate::quota::{QuotaState, ensure_quota_request, wait_for_allocation};

/// Controller that keeps every app instance's offerings and quota up to date.
///
/// Each tick re-derives everything from the store, so a missed or failed tick
/// is repaired by the next one.
pub struct AppController<S> {
    store: S,
    defaults: OfferingDefaults,
    check_interval: Duration,
}

impl<S> AppController<S>
where
    S: KvStore + 'static,
{
    pub fn new(store: S, defaults: OfferingDefaults) -> Self {
        Self {
            store,
            defaults,
            check_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
        }
    }

    pub fn with_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "AppController started (interval={}s)",
                self.check_interval.as_secs()
            );
            let mut interval = tokio::time::interval(self.check_interval);
            loop {
                interval.tick().await;
                if let Err(e) = self.reconcile().await {
                    warn!("AppController reconcile error: {}", e);
                }
            }
        })
    }

    pub async fn reconcile(&self) -> anyhow::Result<()> {
        let project_entries = self.store.list_prefix(PROJECTS_PREFIX).await?;
        for (project_key, _) in project_entries {
            let ns = project_key
                .strip_prefix(PROJECTS_PREFIX)
                .unwrap_or_default()
                .to_string();
            if ns.is_empty() {
                continue;
            }
            self.reconcile_namespace(&ns).await?;
        }
        Ok(())
    }

    async fn reconcile_namespace(&self, ns: &str) -> anyhow::Result<()> {
        let prefix = format!("{}{}/", APP_INSTANCES_PREFIX, ns);
        let apps: Vec<(String, AppInstance)> = list_objects(&self.store, &prefix).await?;

        for (_, mut app) in apps {
            // One app failing must not hold back the rest of the project.
            match self.reconcile_app(&mut app).await {
                Ok(state) => debug!("App {}/{}: quota {:?}", ns, app.name, state),
                Err(e) => warn!("App {}/{}: reconcile failed: {:#}", ns, app.name, e),
            }
        }
        Ok(())
    }

    /// Run one tick for `app`: resolve offerings, submit its quota request
    /// and read back the allocation. Status changes are persisted even when a
    /// step fails, so conditions reflect the failure.
    pub async fn reconcile_app(&self, app: &mut AppInstance) -> anyhow::Result<QuotaState> {
        let before = app.status.clone();
        let result = self.sync(app).await;

        if app.status != before {
            self.write_status(app).await?;
        }
        let quota_before = before.conditions.get(APP_CONDITION_QUOTA).map(|c| c.status);
        let quota_after = app.status.conditions.get(APP_CONDITION_QUOTA).map(|c| c.status);
        if quota_before != quota_after
            && let Some(status) = quota_after
        {
            info!("App {}/{}: quota condition {}", app.namespace, app.name, status);
        }
        result
    }

    /// Store `app.status` onto the latest copy of the app. Anything else on
    /// the object may have been edited since it was listed and is kept.
    async fn write_status(&self, app: &AppInstance) -> anyhow::Result<()> {
        let written = update_object(&self.store, &app.key(), |latest: Option<AppInstance>| {
            latest.map(|mut latest| {
                latest.status = app.status.clone();
                latest
            })
        })
        .await?;
        if written.is_none() {
            debug!("App {}/{} deleted during reconcile", app.namespace, app.name);
        }
        Ok(())
    }

    async fn sync(&self, app: &mut AppInstance) -> anyhow::Result<QuotaState> {
        resolve_offerings(&self.store, &self.defaults, app).await?;
        ensure_quota_request(&self.store, app).await?;
        wait_for_allocation(&self.store, app).await
    }
}
