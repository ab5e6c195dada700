// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes event publication for workloads

use crate::constants::{HASH_UPDATED_REASON, OPERATOR_NAME};
use crate::kubernetes::store::{EventSink, KubeStore};
use crate::rollout::hash_update_message;
use crate::types::{ObjectKey, Workload};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Resource;
use tracing::warn;

impl KubeStore {
    fn recorder(&self) -> Recorder {
        let reporter = Reporter {
            controller: OPERATOR_NAME.to_string(),
            instance: None,
        };
        Recorder::new(self.client().clone(), reporter)
    }
}

impl EventSink for KubeStore {
    async fn hash_updated<W: Workload>(&self, workload: &W, hash: &str) {
        let event = Event {
            type_: EventType::Normal,
            reason: HASH_UPDATED_REASON.to_string(),
            note: Some(hash_update_message(hash)),
            action: "UpdateConfigHash".to_string(),
            secondary: None,
        };

        // Events are informational, a failure here must not fail the reconcile
        if let Err(e) = self.recorder().publish(&event, &workload.object_ref(&())).await {
            warn!(
                "Failed to publish hash update event for {}: {}",
                ObjectKey::of(workload),
                e
            );
        }
    }
}
