// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config_rollout::config::Config;
use config_rollout::reconcilers::WorkloadReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting config-rollout operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: watch_namespace={}, resync_interval={:?}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.resync_interval
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let deployments = WorkloadReconciler::<Deployment>::new(client.clone(), config.clone());
    let stateful_sets = WorkloadReconciler::<StatefulSet>::new(client.clone(), config.clone());
    let daemon_sets = WorkloadReconciler::<DaemonSet>::new(client, config);

    info!("Starting reconcilers...");

    tokio::try_join!(deployments.run(), stateful_sets.run(), daemon_sets.run())?;

    warn!("All reconcilers stopped");
    Ok(())
}
