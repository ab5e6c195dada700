// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Deterministic digest over the content of resolved configuration objects.

use crate::types::ConfigObject;
use sha2::{Digest, Sha256};

/// Compute the hex encoded SHA-256 over kind, name and payload of every
/// object. Objects are ordered by (kind, name) and payload keys are sorted,
/// so neither discovery order nor map iteration order affects the result.
pub fn compute_hash<'a>(objects: impl IntoIterator<Item = &'a ConfigObject>) -> String {
    let mut sorted: Vec<&ConfigObject> = objects.into_iter().collect();
    sorted.sort_by_key(|o| o.key());

    let mut hasher = Sha256::new();
    for object in sorted {
        hasher.update(object.kind().as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(object.name().as_bytes());
        hasher.update([0u8]);
        for (key, value) in object.data() {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update((value.len() as u64).to_be_bytes());
            hasher.update(&value);
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Message of the event emitted against a workload whose hash changed
pub fn hash_update_message(hash: &str) -> String {
    format!("Configuration hash updated to {}", hash)
}
