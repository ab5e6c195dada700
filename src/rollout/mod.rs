// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reconciliation engine: reference discovery, hashing, owner references
//! and the finalizer lifecycle.

pub mod finalizer;
pub mod hash;
pub mod owner_refs;
pub mod reconcile;
pub mod references;

pub use finalizer::{FinalizerAction, FinalizerState};
pub use hash::{compute_hash, hash_update_message};
pub use owner_refs::{plan_owner_refs, OwnerRefChange};
pub use reconcile::{reconcile_workload, ReconcileOutcome};
pub use references::{extract_references, Reference, ReferenceSet, Usage};
