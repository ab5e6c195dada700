// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Keeps the owner references a workload holds on configuration objects in
//! line with the set of objects its pod template references.

use crate::constants::MAX_UPDATE_ATTEMPTS;
use crate::error::{Result, RolloutError};
use crate::kubernetes::ClusterStore;
use crate::types::{ChildKey, ConfigObject};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, instrument};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OwnerRefChange {
    Add(ChildKey),
    Remove(ChildKey),
}

impl OwnerRefChange {
    pub fn key(&self) -> &ChildKey {
        match self {
            OwnerRefChange::Add(key) | OwnerRefChange::Remove(key) => key,
        }
    }
}

/// Work out which related objects need this owner's reference added or removed.
///
/// `related` holds every object that is either desired or already carries a
/// reference to the owner. Desired objects missing from it no longer exist and
/// are skipped.
pub fn plan_owner_refs(
    owner_uid: &str,
    desired: &BTreeSet<ChildKey>,
    related: &BTreeMap<ChildKey, ConfigObject>,
) -> Vec<OwnerRefChange> {
    related
        .iter()
        .filter_map(|(key, object)| {
            match (desired.contains(key), object.has_owner(owner_uid)) {
                (true, false) => Some(OwnerRefChange::Add(key.clone())),
                (false, true) => Some(OwnerRefChange::Remove(key.clone())),
                _ => None,
            }
        })
        .collect()
}

/// Apply planned changes one object at a time. Each change re-reads its
/// object, so a conflict on one is retried from fresh state.
pub async fn apply_owner_refs<S: ClusterStore>(
    store: &S,
    namespace: &str,
    owner: &OwnerReference,
    changes: &[OwnerRefChange],
) -> Result<()> {
    for change in changes {
        apply_change(store, namespace, owner, change).await?;
    }
    Ok(())
}

#[instrument(skip(store, owner), fields(owner = %owner.name))]
async fn apply_change<S: ClusterStore>(
    store: &S,
    namespace: &str,
    owner: &OwnerReference,
    change: &OwnerRefChange,
) -> Result<()> {
    let key = change.key();

    for attempt in 1..=MAX_UPDATE_ATTEMPTS {
        let Some(mut object) = store.get_config(namespace, key).await? else {
            debug!("{} in {} no longer exists, skipping", key, namespace);
            return Ok(());
        };

        let changed = match change {
            OwnerRefChange::Add(_) => object.add_owner_reference(owner.clone()),
            OwnerRefChange::Remove(_) => object.remove_owner_reference(&owner.uid),
        };
        if !changed {
            return Ok(());
        }

        match store.update_config(namespace, &object).await {
            Ok(()) => {
                match change {
                    OwnerRefChange::Add(_) => info!("Added owner reference to {}/{}", namespace, key),
                    OwnerRefChange::Remove(_) => {
                        info!("Removed owner reference from {}/{}", namespace, key)
                    }
                }
                return Ok(());
            }
            Err(e) if e.is_not_found() => {
                debug!("{} in {} deleted while updating, skipping", key, namespace);
                return Ok(());
            }
            Err(e) if e.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => {
                debug!("Conflict updating {} (attempt {}), retrying", key, attempt);
            }
            Err(e) => return Err(e),
        }
    }

    Err(RolloutError::Conflict(format!("{}/{}", namespace, key)))
}
