// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::fmt;

/// The two kinds of configuration a pod template can depend on
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKind {
    ConfigMap,
    Secret,
}

impl ConfigKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::ConfigMap => "ConfigMap",
            ConfigKind::Secret => "Secret",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a configuration object within the workload's namespace
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChildKey {
    pub kind: ConfigKind,
    pub name: String,
}

impl ChildKey {
    pub fn new(kind: ConfigKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn config_map(name: impl Into<String>) -> Self {
        Self::new(ConfigKind::ConfigMap, name)
    }

    pub fn secret(name: impl Into<String>) -> Self {
        Self::new(ConfigKind::Secret, name)
    }
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

/// A ConfigMap or Secret as fetched from the cluster
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigObject {
    ConfigMap(ConfigMap),
    Secret(Secret),
}

impl ConfigObject {
    pub fn kind(&self) -> ConfigKind {
        match self {
            ConfigObject::ConfigMap(_) => ConfigKind::ConfigMap,
            ConfigObject::Secret(_) => ConfigKind::Secret,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            ConfigObject::ConfigMap(cm) => &cm.metadata,
            ConfigObject::Secret(secret) => &secret.metadata,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            ConfigObject::ConfigMap(cm) => &mut cm.metadata,
            ConfigObject::Secret(secret) => &mut secret.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }

    pub fn key(&self) -> ChildKey {
        ChildKey::new(self.kind(), self.name())
    }

    /// Canonical key to bytes view of the payload, sorted by key.
    ///
    /// ConfigMaps merge `data` and `binaryData`. Secrets overlay the
    /// write-only `stringData` on top of `data`, the same way the API server
    /// folds it in on write.
    pub fn data(&self) -> BTreeMap<String, Vec<u8>> {
        let mut out = BTreeMap::new();
        match self {
            ConfigObject::ConfigMap(cm) => {
                for (k, v) in cm.data.iter().flatten() {
                    out.insert(k.clone(), v.as_bytes().to_vec());
                }
                for (k, v) in cm.binary_data.iter().flatten() {
                    out.insert(k.clone(), v.0.clone());
                }
            }
            ConfigObject::Secret(secret) => {
                for (k, v) in secret.data.iter().flatten() {
                    out.insert(k.clone(), v.0.clone());
                }
                for (k, v) in secret.string_data.iter().flatten() {
                    out.insert(k.clone(), v.as_bytes().to_vec());
                }
            }
        }
        out
    }

    pub fn owner_references(&self) -> &[OwnerReference] {
        self.meta().owner_references.as_deref().unwrap_or_default()
    }

    pub fn has_owner(&self, uid: &str) -> bool {
        self.owner_references().iter().any(|o| o.uid == uid)
    }

    /// Add an owner reference unless one with the same uid is present.
    /// Returns whether the object changed.
    pub fn add_owner_reference(&mut self, owner: OwnerReference) -> bool {
        if self.has_owner(&owner.uid) {
            return false;
        }
        self.meta_mut()
            .owner_references
            .get_or_insert_with(Vec::new)
            .push(owner);
        true
    }

    /// Remove the owner reference with the given uid, leaving all others.
    /// Returns whether the object changed.
    pub fn remove_owner_reference(&mut self, uid: &str) -> bool {
        let meta = self.meta_mut();
        let Some(refs) = meta.owner_references.as_mut() else {
            return false;
        };
        let before = refs.len();
        refs.retain(|o| o.uid != uid);
        let changed = refs.len() != before;
        if refs.is_empty() {
            meta.owner_references = None;
        }
        changed
    }
}
