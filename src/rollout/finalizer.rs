// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Finalizer lifecycle of a managed workload.
//!
//! The state is recomputed from the live object on every pass and never
//! stored, so replayed or reordered watch events cannot desynchronize it.

use crate::types::Workload;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinalizerState {
    /// No finalizer, workload live
    Absent,
    /// Finalizer present, workload live
    Active,
    /// Deletion requested, finalizer still blocking it
    Deleting,
    /// Deletion requested and our finalizer is gone
    Cleaned,
}

impl FinalizerState {
    pub fn observe<W: Workload>(workload: &W) -> Self {
        match (workload.has_finalizer(), workload.is_deleting()) {
            (false, false) => FinalizerState::Absent,
            (true, false) => FinalizerState::Active,
            (true, true) => FinalizerState::Deleting,
            (false, true) => FinalizerState::Cleaned,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FinalizerAction {
    #[default]
    Unchanged,
    Add,
    /// Remove the finalizer once every owner reference has been orphaned
    Release,
}

/// Decide the finalizer transition for the observed state
pub fn next_action(state: FinalizerState, enabled: bool) -> FinalizerAction {
    match state {
        FinalizerState::Absent if enabled => FinalizerAction::Add,
        FinalizerState::Active if !enabled => FinalizerAction::Release,
        FinalizerState::Deleting => FinalizerAction::Release,
        _ => FinalizerAction::Unchanged,
    }
}

/// Whether the workload should currently hold owner references at all
pub fn wants_children(state: FinalizerState, enabled: bool) -> bool {
    enabled && matches!(state, FinalizerState::Absent | FinalizerState::Active)
}
