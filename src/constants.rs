// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Kubernetes annotation keys used by config-rollout
pub mod annotations {
    /// When set to "true" on a workload, enables config-driven rollouts for it
    pub const REQUIRED: &str = "config-rollout.io/update-on-config-change";
    /// Pod template annotation holding the hash of all referenced config
    pub const CONFIG_HASH: &str = "config-rollout.io/config-hash";
}

/// Finalizer guarding owner reference cleanup before a workload is deleted
pub const FINALIZER: &str = "config-rollout.io/finalizer";

/// The operator name used as field manager and event reporter
pub const OPERATOR_NAME: &str = "config-rollout";

/// Reason attached to the event emitted on every hash change
pub const HASH_UPDATED_REASON: &str = "ConfigHashUpdated";

/// How often a single owner reference mutation is retried on a conflict
pub const MAX_UPDATE_ATTEMPTS: u32 = 3;
