// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Single level-triggered pass over one workload.

use crate::error::{Result, RolloutError};
use crate::kubernetes::{ClusterStore, EventSink};
use crate::rollout::finalizer::{next_action, wants_children, FinalizerAction, FinalizerState};
use crate::rollout::hash::compute_hash;
use crate::rollout::owner_refs::{apply_owner_refs, plan_owner_refs, OwnerRefChange};
use crate::rollout::references::{extract_references, ReferenceSet};
use crate::types::{ChildKey, ConfigObject, ObjectKey, Workload};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument, warn};

/// What a single pass changed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Hash written to the pod template during this pass
    pub hash_updated: Option<String>,
    pub owner_ref_changes: Vec<OwnerRefChange>,
    pub finalizer: FinalizerAction,
    /// Required references that do not exist, holding back the hash update
    pub missing_required: Vec<ChildKey>,
}

impl ReconcileOutcome {
    pub fn is_noop(&self) -> bool {
        self.hash_updated.is_none()
            && self.owner_ref_changes.is_empty()
            && self.finalizer == FinalizerAction::Unchanged
    }
}

/// Referenced objects as found in the cluster
#[derive(Debug, Default)]
pub struct Resolution {
    pub objects: BTreeMap<ChildKey, ConfigObject>,
    pub missing_required: Vec<ChildKey>,
    pub missing_optional: Vec<ChildKey>,
}

/// Fetch every referenced object, sorting out the ones that do not exist
pub async fn resolve<S: ClusterStore>(
    store: &S,
    namespace: &str,
    references: &ReferenceSet,
) -> Result<Resolution> {
    let mut resolution = Resolution::default();
    for (key, reference) in references {
        match store.get_config(namespace, key).await? {
            Some(object) => {
                resolution.objects.insert(key.clone(), object);
            }
            None if reference.required => resolution.missing_required.push(key.clone()),
            None => resolution.missing_optional.push(key.clone()),
        }
    }
    Ok(resolution)
}

/// Reconcile the workload behind `key`.
///
/// A missing finalizer is added first, then the hash and owner references
/// are reconciled, and the finalizer is released last. A missing required
/// reference only withholds the hash update. Conflicts are returned
/// as [`RolloutError::Conflict`] for the caller to requeue.
#[instrument(skip(store, key), fields(kind = %W::kind(&()), key = %key))]
pub async fn reconcile_workload<W, S>(store: &S, key: &ObjectKey) -> Result<ReconcileOutcome>
where
    W: Workload,
    S: ClusterStore + EventSink,
{
    let mut outcome = ReconcileOutcome::default();

    let Some(mut workload) = store.get_workload::<W>(key).await? else {
        debug!("Workload not found, nothing to do");
        return Ok(outcome);
    };
    let owner = workload
        .owner_reference()
        .ok_or_else(|| RolloutError::InvalidObject(format!("{} {} has no uid", W::kind(&()), key)))?;

    let enabled = workload.is_enabled();
    let state = FinalizerState::observe(&workload);

    if !enabled && state == FinalizerState::Absent {
        debug!("Workload is not enabled, clearing stale owner references");
        outcome.owner_ref_changes =
            reconcile_owner_refs(store, &key.namespace, &owner, &BTreeSet::new(), BTreeMap::new())
                .await?;
        return Ok(outcome);
    }

    // The finalizer must be in place before any owner reference is added,
    // otherwise a deletion in between leaves the references behind.
    outcome.finalizer = next_action(state, enabled);
    if outcome.finalizer == FinalizerAction::Add {
        workload.add_finalizer();
        let Some(updated) = write_workload(store, &workload).await? else {
            return Ok(outcome);
        };
        info!("Added finalizer");
        workload = updated;
    }

    let managed = wants_children(state, enabled);
    let references = match workload.pod_template() {
        Some(template) if managed => extract_references(template),
        _ => ReferenceSet::new(),
    };
    let resolution = resolve(store, &key.namespace, &references).await?;
    if !resolution.missing_optional.is_empty() {
        debug!("Skipping missing optional references: {:?}", resolution.missing_optional);
    }

    if managed {
        if resolution.missing_required.is_empty() {
            let desired_hash =
                (!resolution.objects.is_empty()).then(|| compute_hash(resolution.objects.values()));

            if workload.config_hash() != desired_hash.as_deref() {
                if let Some(hash) = &desired_hash {
                    workload.set_config_hash(hash);
                } else {
                    workload.clear_config_hash();
                }
                let Some(updated) = write_workload(store, &workload).await? else {
                    return Ok(outcome);
                };
                workload = updated;

                if let Some(hash) = desired_hash {
                    info!("Configuration hash updated to {}", hash);
                    store.hash_updated(&workload, &hash).await;
                    outcome.hash_updated = Some(hash);
                }
            }
        } else {
            warn!(
                "Required references missing, keeping current config hash: {:?}",
                resolution.missing_required
            );
            outcome.missing_required = resolution.missing_required.clone();
        }
    }

    let desired: BTreeSet<ChildKey> = references.into_keys().collect();
    outcome.owner_ref_changes =
        reconcile_owner_refs(store, &key.namespace, &owner, &desired, resolution.objects).await?;

    if outcome.finalizer == FinalizerAction::Release {
        workload.remove_finalizer();
        if !workload.is_deleting() {
            workload.clear_config_hash();
        }
        if write_workload(store, &workload).await?.is_some() {
            info!("Removed finalizer after orphaning all configuration");
        }
    }

    Ok(outcome)
}

/// Bring owner references on every related object in line with `desired`.
/// `resolved` are the desired objects already fetched this pass; objects the
/// owner currently holds a reference on are listed and merged in.
async fn reconcile_owner_refs<S: ClusterStore>(
    store: &S,
    namespace: &str,
    owner: &OwnerReference,
    desired: &BTreeSet<ChildKey>,
    resolved: BTreeMap<ChildKey, ConfigObject>,
) -> Result<Vec<OwnerRefChange>> {
    let mut related = resolved;
    for object in store.list_owned_configs(namespace, &owner.uid).await? {
        related.entry(object.key()).or_insert(object);
    }

    let changes = plan_owner_refs(&owner.uid, desired, &related);
    apply_owner_refs(store, namespace, owner, &changes).await?;
    Ok(changes)
}

/// Replace the workload, `None` when it was deleted in the meantime
async fn write_workload<W: Workload, S: ClusterStore>(store: &S, workload: &W) -> Result<Option<W>> {
    match store.update_workload(workload).await {
        Ok(updated) => Ok(Some(updated)),
        Err(e) if e.is_not_found() => {
            debug!("Workload disappeared while updating");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
