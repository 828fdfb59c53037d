//! Cluster access used by the reconciler
//!
//! The reconciler only needs get/create/replace on namespaced objects, a list
//! of gateway classes and a status write. Keeping that behind a trait lets the
//! loop run against the API server or an in-memory store.

use async_trait::async_trait;
use gateway_api::{AiGateway, AiGatewayClass, AiGatewayStatus};
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use k8s_openapi::NamespaceResourceScope;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::fmt::Debug;
use tracing::debug;

#[cfg(test)]
pub(crate) mod memory;

/// A namespaced object the reconciler reads or writes
pub trait ManagedObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
}

impl<K> ManagedObject for K where
    K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static
{
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object, `None` when it does not exist
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> kube::Result<Option<K>>;

    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> kube::Result<K>;

    /// Full update of an existing object
    async fn replace<K: ManagedObject>(&self, namespace: &str, object: &K) -> kube::Result<K>;

    async fn list_classes(&self) -> kube::Result<Vec<AiGatewayClass>>;

    /// Write the status subresource of a gateway
    async fn replace_status(&self, gateway: &AiGateway, status: &AiGatewayStatus) -> kube::Result<()>;
}

/// ObjectStore backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K: ManagedObject>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> kube::Result<Option<K>> {
        self.api::<K>(namespace).get_opt(name).await
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> kube::Result<K> {
        debug!("Creating {} {}/{}", K::kind(&()), namespace, object.name_any());
        self.api::<K>(namespace).create(&PostParams::default(), object).await
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, object: &K) -> kube::Result<K> {
        let name = object.name_any();
        debug!("Replacing {} {}/{}", K::kind(&()), namespace, name);
        self.api::<K>(namespace).replace(&name, &PostParams::default(), object).await
    }

    async fn list_classes(&self) -> kube::Result<Vec<AiGatewayClass>> {
        let classes: Api<AiGatewayClass> = Api::all(self.client.clone());
        Ok(classes.list(&ListParams::default()).await?.items)
    }

    async fn replace_status(&self, gateway: &AiGateway, status: &AiGatewayStatus) -> kube::Result<()> {
        let namespace = gateway.namespace().unwrap_or_default();
        let patch = json!({ "status": status });
        self.api::<AiGateway>(&namespace)
            .patch_status(&gateway.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
