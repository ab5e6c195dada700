// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Discovery of the ConfigMaps and Secrets a pod template depends on.

use crate::types::{ChildKey, ConfigKind};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use std::collections::{BTreeMap, BTreeSet};

/// How a pod template consumes a configuration object
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Usage {
    Volume,
    VolumeProjection,
    EnvFrom,
    EnvKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub key: ChildKey,
    pub usages: BTreeSet<Usage>,
    /// True when at least one sighting is not marked optional
    pub required: bool,
}

/// References keyed and ordered by (kind, name)
pub type ReferenceSet = BTreeMap<ChildKey, Reference>;

/// Collect every ConfigMap and Secret referenced by the template's volumes,
/// projected volumes, `envFrom` sources and `env[].valueFrom` selectors,
/// across init and regular containers. Entries with an empty name are skipped.
pub fn extract_references(template: &PodTemplateSpec) -> ReferenceSet {
    let mut refs = ReferenceSet::new();
    let Some(spec) = template.spec.as_ref() else {
        return refs;
    };

    for volume in spec.volumes.iter().flatten() {
        if let Some(cm) = &volume.config_map {
            record(&mut refs, ConfigKind::ConfigMap, &cm.name, Usage::Volume, cm.optional);
        }
        if let Some(secret) = &volume.secret {
            if let Some(name) = &secret.secret_name {
                record(&mut refs, ConfigKind::Secret, name, Usage::Volume, secret.optional);
            }
        }
        let sources = volume.projected.as_ref().and_then(|p| p.sources.as_ref());
        for source in sources.into_iter().flatten() {
            if let Some(cm) = &source.config_map {
                record(&mut refs, ConfigKind::ConfigMap, &cm.name, Usage::VolumeProjection, cm.optional);
            }
            if let Some(secret) = &source.secret {
                record(&mut refs, ConfigKind::Secret, &secret.name, Usage::VolumeProjection, secret.optional);
            }
        }
    }

    let containers = spec.init_containers.iter().flatten().chain(spec.containers.iter());
    for container in containers {
        for source in container.env_from.iter().flatten() {
            if let Some(cm) = &source.config_map_ref {
                record(&mut refs, ConfigKind::ConfigMap, &cm.name, Usage::EnvFrom, cm.optional);
            }
            if let Some(secret) = &source.secret_ref {
                record(&mut refs, ConfigKind::Secret, &secret.name, Usage::EnvFrom, secret.optional);
            }
        }
        for var in container.env.iter().flatten() {
            let Some(value_from) = &var.value_from else {
                continue;
            };
            if let Some(selector) = &value_from.config_map_key_ref {
                record(&mut refs, ConfigKind::ConfigMap, &selector.name, Usage::EnvKey, selector.optional);
            }
            if let Some(selector) = &value_from.secret_key_ref {
                record(&mut refs, ConfigKind::Secret, &selector.name, Usage::EnvKey, selector.optional);
            }
        }
    }

    refs
}

fn record(refs: &mut ReferenceSet, kind: ConfigKind, name: &str, usage: Usage, optional: Option<bool>) {
    if name.is_empty() {
        return;
    }
    let required = !optional.unwrap_or(false);
    let key = ChildKey::new(kind, name);
    refs.entry(key.clone())
        .and_modify(|r| {
            r.usages.insert(usage);
            r.required |= required;
        })
        .or_insert_with(|| Reference {
            key,
            usages: BTreeSet::from([usage]),
            required,
        });
}
