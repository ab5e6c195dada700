// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Reads and writes against the cluster API.
//!
//! Writes use `replace`, which carries the object's resourceVersion, so a
//! concurrent modification surfaces as [`RolloutError::Conflict`].

use crate::constants::OPERATOR_NAME;
use crate::error::{Result, RolloutError};
use crate::types::{ChildKey, ConfigKind, ConfigObject, ObjectKey, Workload};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    api::{ListParams, PostParams},
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use tracing::{debug, instrument};

/// Object access the reconciler needs from the cluster
pub trait ClusterStore: Send + Sync {
    /// Fetch a workload, `None` when it does not exist
    fn get_workload<W: Workload>(
        &self,
        key: &ObjectKey,
    ) -> impl Future<Output = Result<Option<W>>> + Send;

    /// Replace a workload, returning the stored version
    fn update_workload<W: Workload>(&self, workload: &W) -> impl Future<Output = Result<W>> + Send;

    fn get_config(
        &self,
        namespace: &str,
        key: &ChildKey,
    ) -> impl Future<Output = Result<Option<ConfigObject>>> + Send;

    fn update_config(
        &self,
        namespace: &str,
        object: &ConfigObject,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All ConfigMaps and Secrets in the namespace carrying an owner
    /// reference with the given uid
    fn list_owned_configs(
        &self,
        namespace: &str,
        owner_uid: &str,
    ) -> impl Future<Output = Result<Vec<ConfigObject>>> + Send;
}

/// Receiver of user-visible notifications about a workload
pub trait EventSink: Send + Sync {
    fn hash_updated<W: Workload>(&self, workload: &W, hash: &str) -> impl Future<Output = ()> + Send;
}

/// [`ClusterStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(OPERATOR_NAME.to_string()),
            ..Default::default()
        }
    }
}

impl ClusterStore for KubeStore {
    #[instrument(skip(self, key), fields(key = %key))]
    async fn get_workload<W: Workload>(&self, key: &ObjectKey) -> Result<Option<W>> {
        let api: Api<W> = Api::namespaced(self.client.clone(), &key.namespace);
        Ok(api.get_opt(&key.name).await?)
    }

    #[instrument(skip(self, workload), fields(key = %ObjectKey::of(workload)))]
    async fn update_workload<W: Workload>(&self, workload: &W) -> Result<W> {
        let key = ObjectKey::of(workload);
        let api: Api<W> = Api::namespaced(self.client.clone(), &key.namespace);
        api.replace(&key.name, &Self::post_params(), workload)
            .await
            .map_err(|e| RolloutError::from_write(e, &format!("{} {}", W::kind(&()), key)))
    }

    #[instrument(skip(self))]
    async fn get_config(&self, namespace: &str, key: &ChildKey) -> Result<Option<ConfigObject>> {
        let object = match key.kind {
            ConfigKind::ConfigMap => {
                let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
                api.get_opt(&key.name).await?.map(ConfigObject::ConfigMap)
            }
            ConfigKind::Secret => {
                let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
                api.get_opt(&key.name).await?.map(ConfigObject::Secret)
            }
        };
        if object.is_none() {
            debug!("{} not found in {}", key, namespace);
        }
        Ok(object)
    }

    #[instrument(skip(self, object), fields(object = %object.key()))]
    async fn update_config(&self, namespace: &str, object: &ConfigObject) -> Result<()> {
        let target = format!("{} {}/{}", object.kind(), namespace, object.name());
        let pp = Self::post_params();
        let result = match object {
            ConfigObject::ConfigMap(cm) => {
                let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
                api.replace(&cm.name_any(), &pp, cm).await.map(|_| ())
            }
            ConfigObject::Secret(secret) => {
                let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
                api.replace(&secret.name_any(), &pp, secret).await.map(|_| ())
            }
        };
        result.map_err(|e| RolloutError::from_write(e, &target))
    }

    #[instrument(skip(self))]
    async fn list_owned_configs(&self, namespace: &str, owner_uid: &str) -> Result<Vec<ConfigObject>> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), namespace);

        let mut owned = Vec::new();
        for name in owned_names(&config_maps, owner_uid).await? {
            if let Some(cm) = config_maps.get_opt(&name).await? {
                owned.push(ConfigObject::ConfigMap(cm));
            }
        }
        for name in owned_names(&secrets, owner_uid).await? {
            if let Some(secret) = secrets.get_opt(&name).await? {
                owned.push(ConfigObject::Secret(secret));
            }
        }

        debug!("{} objects in {} owned by {}", owned.len(), namespace, owner_uid);
        Ok(owned)
    }
}

/// Names of objects carrying an owner reference with the given uid. Only
/// metadata is listed, so Secret payloads are fetched just for owned objects.
async fn owned_names<K>(api: &Api<K>, owner_uid: &str) -> Result<Vec<String>>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let names = api
        .list_metadata(&ListParams::default())
        .await?
        .items
        .into_iter()
        .filter(|item| item.owner_references().iter().any(|o| o.uid == owner_uid))
        .map(|item| item.name_any())
        .collect();
    Ok(names)
}
