// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::{annotations, FINALIZER};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// A namespaced object that owns a pod template and rolls it out on change.
///
/// Everything the reconciler needs beyond the pod template itself is
/// derived from object metadata, so implementors only expose the template.
pub trait Workload:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    fn pod_template(&self) -> Option<&PodTemplateSpec>;

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec>;

    /// Check if the workload opted in to config-driven rollouts
    fn is_enabled(&self) -> bool {
        self.annotations()
            .get(annotations::REQUIRED)
            .is_some_and(|v| v == "true")
    }

    fn is_deleting(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == FINALIZER)
    }

    fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.finalizers_mut().push(FINALIZER.to_string());
        true
    }

    fn remove_finalizer(&mut self) -> bool {
        let finalizers = self.finalizers_mut();
        let before = finalizers.len();
        finalizers.retain(|f| f != FINALIZER);
        finalizers.len() != before
    }

    /// The hash currently stored on the pod template
    fn config_hash(&self) -> Option<&str> {
        self.pod_template()?
            .metadata
            .as_ref()?
            .annotations
            .as_ref()?
            .get(annotations::CONFIG_HASH)
            .map(String::as_str)
    }

    fn set_config_hash(&mut self, hash: &str) -> bool {
        let Some(template) = self.pod_template_mut() else {
            return false;
        };
        template
            .metadata
            .get_or_insert_with(Default::default)
            .annotations
            .get_or_insert_with(Default::default)
            .insert(annotations::CONFIG_HASH.to_string(), hash.to_string());
        true
    }

    fn clear_config_hash(&mut self) -> bool {
        self.pod_template_mut()
            .and_then(|t| t.metadata.as_mut())
            .and_then(|m| m.annotations.as_mut())
            .and_then(|a| a.remove(annotations::CONFIG_HASH))
            .is_some()
    }

    /// Owner reference pointing back at this workload, written onto
    /// configuration objects. Never marked as the controlling owner.
    fn owner_reference(&self) -> Option<OwnerReference> {
        Some(OwnerReference {
            api_version: Self::api_version(&()).into_owned(),
            kind: Self::kind(&()).into_owned(),
            name: self.name_any(),
            uid: self.uid()?,
            controller: Some(false),
            block_owner_deletion: Some(true),
        })
    }
}

impl Workload for Deployment {
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}

impl Workload for StatefulSet {
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}

impl Workload for DaemonSet {
    fn pod_template(&self) -> Option<&PodTemplateSpec> {
        self.spec.as_ref().map(|s| &s.template)
    }

    fn pod_template_mut(&mut self) -> Option<&mut PodTemplateSpec> {
        self.spec.as_mut().map(|s| &mut s.template)
    }
}
