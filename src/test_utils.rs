// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities: a mocked Kubernetes API server, an in-memory cluster
//! store and example objects.

use crate::constants::annotations;
use crate::error::{Result, RolloutError};
use crate::kubernetes::{ClusterStore, EventSink};
use crate::rollout::hash_update_message;
use crate::types::{ChildKey, ConfigObject, ObjectKey, Workload};
use http::{Request, Response};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapEnvSource, ConfigMapVolumeSource, Container, EnvFromSource, PodSpec,
    PodTemplateSpec, Secret, SecretEnvSource, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, Time};
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::client::Body;
use kube::core::ErrorResponse;
use kube::{Client, Resource, ResourceExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use tower::Service;

/// A mock HTTP service that returns predefined responses based on request paths.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<HashMap<(String, String), (u16, String)>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Add a response for GET requests matching the exact path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for PUT requests matching the exact path
    pub fn on_put(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PUT", path, status, body)
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method.to_string(), path.to_string()), (status, body.to_string()));
        self
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        self.responses
            .lock()
            .unwrap()
            .get(&(method.to_string(), path.to_string()))
            .cloned()
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let (status, body) = self
            .find_response(&method, &path)
            .unwrap_or_else(|| (404, not_found_json("resource", &path)));

        Box::pin(async move {
            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(body.into_bytes()))
                .unwrap())
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a mock ConfigMap JSON response owned by the given uids
pub fn config_map_json(name: &str, namespace: &str, owner_uids: &[&str]) -> String {
    let owners: Vec<serde_json::Value> = owner_uids
        .iter()
        .map(|uid| {
            serde_json::json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "name": "web",
                "uid": uid
            })
        })
        .collect();
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "ConfigMap",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "resourceVersion": "1",
            "ownerReferences": owners
        },
        "data": { "key1": "value1" }
    })
    .to_string()
}

/// Create a mock Deployment JSON response
pub fn deployment_json(name: &str, namespace: &str) -> String {
    serde_json::json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{}", name),
            "resourceVersion": "1"
        },
        "spec": {
            "selector": { "matchLabels": { "app": name } },
            "template": { "spec": { "containers": [] } }
        }
    })
    .to_string()
}

fn api_error(code: u16, reason: &str, message: String) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    })
}

/// In-memory cluster with resourceVersion checks on every write.
///
/// Deleting a workload with finalizers only sets its deletion timestamp;
/// it disappears once an update leaves it without finalizers.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    workloads: BTreeMap<(String, ObjectKey), serde_json::Value>,
    configs: BTreeMap<(String, ChildKey), ConfigObject>,
    events: Vec<(ObjectKey, String)>,
    version: u64,
    workload_conflicts: u32,
    config_conflicts: u32,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

fn workload_id<W: Workload>(key: &ObjectKey) -> (String, ObjectKey) {
    (W::kind(&()).into_owned(), key.clone())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Store a workload as created by a user, assigning uid and version
    pub fn insert_workload<W: Workload>(&self, mut workload: W) -> W {
        let mut state = self.lock();
        let key = ObjectKey::of(&workload);
        if workload.meta().uid.is_none() {
            workload.meta_mut().uid = Some(format!("uid-{}", key.name));
        }
        workload.meta_mut().resource_version = Some(state.next_version());
        state
            .workloads
            .insert(workload_id::<W>(&key), serde_json::to_value(&workload).unwrap());
        workload
    }

    pub fn workload<W: Workload>(&self, key: &ObjectKey) -> Option<W> {
        self.lock()
            .workloads
            .get(&workload_id::<W>(key))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    /// Modify a stored workload the way a user edit would
    pub fn edit_workload<W: Workload>(&self, key: &ObjectKey, edit: impl FnOnce(&mut W)) {
        let mut workload: W = self.workload(key).expect("workload exists");
        edit(&mut workload);
        let mut state = self.lock();
        workload.meta_mut().resource_version = Some(state.next_version());
        state
            .workloads
            .insert(workload_id::<W>(key), serde_json::to_value(&workload).unwrap());
    }

    /// Request deletion; finalizers keep the object around until released
    pub fn delete_workload<W: Workload>(&self, key: &ObjectKey) {
        let mut workload: W = self.workload(key).expect("workload exists");
        let mut state = self.lock();
        if workload.finalizers().is_empty() {
            state.workloads.remove(&workload_id::<W>(key));
            return;
        }
        workload.meta_mut().deletion_timestamp = Some(Time(Default::default()));
        workload.meta_mut().resource_version = Some(state.next_version());
        state
            .workloads
            .insert(workload_id::<W>(key), serde_json::to_value(&workload).unwrap());
    }

    pub fn insert_config(&self, namespace: &str, mut object: ConfigObject) {
        let mut state = self.lock();
        object.meta_mut().namespace = Some(namespace.to_string());
        object.meta_mut().resource_version = Some(state.next_version());
        state
            .configs
            .insert((namespace.to_string(), object.key()), object);
    }

    pub fn config(&self, namespace: &str, key: &ChildKey) -> Option<ConfigObject> {
        self.lock()
            .configs
            .get(&(namespace.to_string(), key.clone()))
            .cloned()
    }

    pub fn edit_config(&self, namespace: &str, key: &ChildKey, edit: impl FnOnce(&mut ConfigObject)) {
        let mut state = self.lock();
        let version = state.next_version();
        let object = state
            .configs
            .get_mut(&(namespace.to_string(), key.clone()))
            .expect("config exists");
        edit(object);
        object.meta_mut().resource_version = Some(version);
    }

    pub fn remove_config(&self, namespace: &str, key: &ChildKey) {
        self.lock().configs.remove(&(namespace.to_string(), key.clone()));
    }

    /// Reject the next `n` workload updates with a conflict
    pub fn fail_next_workload_updates(&self, n: u32) {
        self.lock().workload_conflicts = n;
    }

    /// Reject the next `n` config updates with a conflict
    pub fn fail_next_config_updates(&self, n: u32) {
        self.lock().config_conflicts = n;
    }

    /// Messages of all recorded events, oldest first
    pub fn events(&self) -> Vec<String> {
        self.lock().events.iter().map(|(_, m)| m.clone()).collect()
    }
}

impl ClusterStore for MemoryStore {
    async fn get_workload<W: Workload>(&self, key: &ObjectKey) -> Result<Option<W>> {
        Ok(self.workload(key))
    }

    async fn update_workload<W: Workload>(&self, workload: &W) -> Result<W> {
        let key = ObjectKey::of(workload);
        let id = workload_id::<W>(&key);
        let mut state = self.lock();

        if state.workload_conflicts > 0 {
            state.workload_conflicts -= 1;
            return Err(RolloutError::Conflict(key.to_string()));
        }
        let Some(current) = state.workloads.get(&id) else {
            return Err(api_error(404, "NotFound", format!("{} not found", key)).into());
        };
        let current_version = current["metadata"]["resourceVersion"].as_str().map(str::to_string);
        if workload.resource_version() != current_version {
            return Err(RolloutError::Conflict(key.to_string()));
        }

        let mut updated = workload.clone();
        updated.meta_mut().resource_version = Some(state.next_version());
        if updated.is_deleting() && updated.finalizers().is_empty() {
            state.workloads.remove(&id);
        } else {
            state.workloads.insert(id, serde_json::to_value(&updated).unwrap());
        }
        Ok(updated)
    }

    async fn get_config(&self, namespace: &str, key: &ChildKey) -> Result<Option<ConfigObject>> {
        Ok(self.config(namespace, key))
    }

    async fn update_config(&self, namespace: &str, object: &ConfigObject) -> Result<()> {
        let id = (namespace.to_string(), object.key());
        let mut state = self.lock();

        if state.config_conflicts > 0 {
            state.config_conflicts -= 1;
            return Err(RolloutError::Conflict(object.key().to_string()));
        }
        let Some(current) = state.configs.get(&id) else {
            return Err(api_error(404, "NotFound", format!("{} not found", object.key())).into());
        };
        if current.meta().resource_version != object.meta().resource_version {
            return Err(RolloutError::Conflict(object.key().to_string()));
        }

        let mut updated = object.clone();
        updated.meta_mut().resource_version = Some(state.next_version());
        state.configs.insert(id, updated);
        Ok(())
    }

    async fn list_owned_configs(&self, namespace: &str, owner_uid: &str) -> Result<Vec<ConfigObject>> {
        Ok(self
            .lock()
            .configs
            .iter()
            .filter(|((ns, _), object)| ns == namespace && object.has_owner(owner_uid))
            .map(|(_, object)| object.clone())
            .collect())
    }
}

impl EventSink for MemoryStore {
    async fn hash_updated<W: Workload>(&self, workload: &W, hash: &str) {
        self.lock()
            .events
            .push((ObjectKey::of(workload), hash_update_message(hash)));
    }
}

pub fn example_config_map(name: &str, data: &[(&str, &str)]) -> ConfigObject {
    ConfigObject::ConfigMap(ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ),
        ..Default::default()
    })
}

pub fn example_secret(name: &str, data: &[(&str, &str)]) -> ConfigObject {
    ConfigObject::Secret(Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Default::default()
    })
}

/// Deployment mounting ConfigMap `example1` and Secret `example1` as volumes
/// in `container1`, and loading ConfigMap `example2` and Secret `example2`
/// through `envFrom` in `container2`.
pub fn example_deployment(enabled: bool) -> Deployment {
    let annotations = enabled.then(|| {
        BTreeMap::from([(annotations::REQUIRED.to_string(), "true".to_string())])
    });
    let labels = BTreeMap::from([("app".to_string(), "example".to_string())]);

    Deployment {
        metadata: ObjectMeta {
            name: Some("example".to_string()),
            namespace: Some("default".to_string()),
            annotations,
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    volumes: Some(vec![
                        Volume {
                            name: "configmap1".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: "example1".to_string(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        Volume {
                            name: "secret1".to_string(),
                            secret: Some(SecretVolumeSource {
                                secret_name: Some("example1".to_string()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                    ]),
                    containers: vec![
                        Container {
                            name: "container1".to_string(),
                            image: Some("nginx".to_string()),
                            volume_mounts: Some(vec![
                                VolumeMount {
                                    name: "configmap1".to_string(),
                                    mount_path: "/etc/config".to_string(),
                                    ..Default::default()
                                },
                                VolumeMount {
                                    name: "secret1".to_string(),
                                    mount_path: "/etc/secret".to_string(),
                                    ..Default::default()
                                },
                            ]),
                            ..Default::default()
                        },
                        Container {
                            name: "container2".to_string(),
                            image: Some("nginx".to_string()),
                            env_from: Some(vec![
                                EnvFromSource {
                                    config_map_ref: Some(ConfigMapEnvSource {
                                        name: "example2".to_string(),
                                        ..Default::default()
                                    }),
                                    ..Default::default()
                                },
                                EnvFromSource {
                                    secret_ref: Some(SecretEnvSource {
                                        name: "example2".to_string(),
                                        ..Default::default()
                                    }),
                                    ..Default::default()
                                },
                            ]),
                            ..Default::default()
                        },
                    ],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A store holding the example ConfigMaps and Secrets in `default`
pub fn example_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.insert_config("default", example_config_map("example1", &[("key1", "example1:key1"), ("key2", "example1:key2")]));
    store.insert_config("default", example_config_map("example2", &[("key1", "example2:key1")]));
    store.insert_config("default", example_secret("example1", &[("key1", "example1:key1")]));
    store.insert_config("default", example_secret("example2", &[("key1", "example2:key1")]));
    store
}
