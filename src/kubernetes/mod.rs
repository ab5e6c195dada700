// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes API access: object reads/writes and event publication.

pub mod events;
pub mod store;

pub use store::{ClusterStore, EventSink, KubeStore};
