// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Workload reconciler - watches one workload kind plus the ConfigMaps and
//! Secrets it owns, and runs a reconcile pass per changed workload.

use crate::config::Config;
use crate::error::{Result, RolloutError};
use crate::kubernetes::KubeStore;
use crate::rollout::reconcile_workload;
use crate::types::{ObjectKey, Workload};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    runtime::{
        controller::{self, Action},
        reflector::{Lookup, ObjectRef},
        Controller,
    },
    Api, Client, Resource, ResourceExt,
};
use kube_runtime::watcher::Config as WatcherConfig;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub struct WorkloadReconciler<W> {
    client: Client,
    store: KubeStore,
    config: Config,
    /// Consecutive failures per workload, drives the error backoff
    failures: Mutex<HashMap<ObjectKey, u32>>,
    _kind: PhantomData<fn() -> W>,
}

impl<W: Workload> WorkloadReconciler<W> {
    pub fn new(client: Client, config: Config) -> Self {
        Self {
            store: KubeStore::new(client.clone()),
            client,
            config,
            failures: Mutex::new(HashMap::new()),
            _kind: PhantomData,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = k8s_openapi::NamespaceResourceScope>,
    {
        match &self.config.watch_namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let workloads: Api<W> = self.api();
        let config_maps: Api<ConfigMap> = self.api();
        let secrets: Api<Secret> = self.api();
        let context = Arc::new(self);
        let results = context.clone();

        info!("Starting {} reconciler", W::kind(&()));

        Controller::new(workloads, WatcherConfig::default())
            .watches(config_maps, WatcherConfig::default(), owners_of::<W, ConfigMap>)
            .watches(secrets, WatcherConfig::default(), owners_of::<W, Secret>)
            .shutdown_on_signal()
            .run(reconcile::<W>, error_policy::<W>, context)
            .for_each(|res| {
                let ctx = results.clone();
                async move {
                    match res {
                        Ok(o) => debug!("Reconciled {}: {:?}", W::kind(&()), o),
                        Err(controller::Error::ObjectNotFound(object)) => {
                            debug!("{} is gone, dropping its backoff", object);
                            ctx.forget(&object);
                        }
                        Err(e) => warn!("Reconciliation error: {:?}", e),
                    }
                }
            })
            .await;

        Ok(())
    }

    fn reset_backoff(&self, key: &ObjectKey) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.remove(key);
        }
    }

    /// Drop the failure count of a workload that no longer exists
    fn forget<K: Lookup + ?Sized>(&self, object: &ObjectRef<K>) {
        let key = ObjectKey::new(object.namespace.as_deref().unwrap_or_default(), &object.name);
        self.reset_backoff(&key);
    }

    fn next_backoff(&self, key: &ObjectKey) -> Duration {
        let attempts = match self.failures.lock() {
            Ok(mut failures) => {
                let count = failures.entry(key.clone()).or_insert(0);
                *count += 1;
                *count
            }
            Err(_) => 1,
        };
        backoff_delay(
            self.config.error_backoff_base,
            self.config.error_backoff_max,
            attempts,
        )
    }
}

/// Map a ConfigMap or Secret to every workload of kind `W` holding an owner
/// reference on it
fn owners_of<W: Workload, K: Resource>(object: K) -> Vec<ObjectRef<W>> {
    let namespace = ResourceExt::namespace(&object);
    object
        .owner_references()
        .iter()
        .filter(|o| o.kind == W::kind(&()) && o.api_version == W::api_version(&()))
        .map(|o| {
            let owner = ObjectRef::new(&o.name);
            match &namespace {
                Some(ns) => owner.within(ns),
                None => owner,
            }
        })
        .collect()
}

/// Exponential backoff: `base * 2^(attempts - 1)`, capped at `max`
pub fn backoff_delay(base: Duration, max: Duration, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent).min(max)
}

async fn reconcile<W: Workload>(workload: Arc<W>, ctx: Arc<WorkloadReconciler<W>>) -> Result<Action> {
    let key = ObjectKey::of(workload.as_ref());

    let outcome = reconcile_workload::<W, _>(&ctx.store, &key).await?;
    ctx.reset_backoff(&key);

    if !outcome.is_noop() {
        debug!("Reconciled {} {}: {:?}", W::kind(&()), key, outcome);
    }

    // Periodic resync keeps the loop level-triggered even if a watch event is lost
    Ok(Action::requeue(ctx.config.resync_interval))
}

fn error_policy<W: Workload>(
    workload: Arc<W>,
    error: &RolloutError,
    ctx: Arc<WorkloadReconciler<W>>,
) -> Action {
    let key = ObjectKey::of(workload.as_ref());

    if error.is_conflict() {
        debug!("Conflict reconciling {}, requeueing: {}", key, error);
        return Action::requeue(ctx.config.conflict_requeue);
    }

    let delay = ctx.next_backoff(&key);
    error!(
        "Reconciliation error for {} {}: {}, retrying in {:?}",
        W::kind(&()),
        key,
        error,
        delay
    );
    Action::requeue(delay)
}
