//! In-memory ObjectStore for exercising the reconciler without a cluster

use super::{ManagedObject, ObjectStore};
use async_trait::async_trait;
use gateway_api::{AiGateway, AiGatewayClass, AiGatewayStatus};
use kube::error::ErrorResponse;
use kube::ResourceExt;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

type Key = (String, String, String);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Write {
    pub kind: String,
    pub op: &'static str,
    pub name: String,
}

#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<Key, serde_json::Value>>,
    classes: RwLock<Vec<AiGatewayClass>>,
    statuses: RwLock<Vec<AiGatewayStatus>>,
    writes: RwLock<Vec<Write>>,
    failures: RwLock<HashSet<(String, &'static str)>>,
}

fn key<K: ManagedObject>(namespace: &str, name: &str) -> Key {
    (K::kind(&()).to_string(), namespace.to_string(), name.to_string())
}

fn injected(kind: &str, op: &str) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("injected {} failure for {}", op, kind),
        reason: "InternalError".to_string(),
        code: 500,
    })
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert<K: ManagedObject>(&self, object: &K) {
        let k = key::<K>(&object.namespace().unwrap_or_default(), &object.name_any());
        let value = serde_json::to_value(object).unwrap();
        self.objects.write().await.insert(k, value);
    }

    pub async fn add_class(&self, class: AiGatewayClass) {
        self.classes.write().await.push(class);
    }

    pub async fn object<K: ManagedObject>(&self, namespace: &str, name: &str) -> Option<K> {
        self.objects
            .read()
            .await
            .get(&key::<K>(namespace, name))
            .map(|v| serde_json::from_value(v.clone()).unwrap())
    }

    /// Apply a change outside the reconciler, as another controller would
    pub async fn modify<K: ManagedObject>(&self, namespace: &str, name: &str, f: impl FnOnce(&mut K)) {
        let mut object: K = self.object(namespace, name).await.unwrap();
        f(&mut object);
        self.insert(&object).await;
    }

    pub async fn fail<K: ManagedObject>(&self, op: &'static str) {
        self.failures.write().await.insert((K::kind(&()).to_string(), op));
    }

    pub async fn writes(&self) -> Vec<Write> {
        self.writes.read().await.clone()
    }

    /// Child object writes, excluding status updates
    pub async fn child_writes(&self) -> usize {
        self.writes.read().await.iter().filter(|w| w.op != "status").count()
    }

    pub async fn status_writes(&self) -> usize {
        self.statuses.read().await.len()
    }

    async fn check<K: ManagedObject>(&self, op: &'static str) -> kube::Result<()> {
        let kind = K::kind(&()).to_string();
        if self.failures.read().await.contains(&(kind.clone(), op)) {
            return Err(injected(&kind, op));
        }
        Ok(())
    }

    async fn record(&self, kind: &str, op: &'static str, name: &str) {
        self.writes.write().await.push(Write {
            kind: kind.to_string(),
            op,
            name: name.to_string(),
        });
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get<K: ManagedObject>(&self, namespace: &str, name: &str) -> kube::Result<Option<K>> {
        self.check::<K>("get").await?;
        Ok(self.object(namespace, name).await)
    }

    async fn create<K: ManagedObject>(&self, namespace: &str, object: &K) -> kube::Result<K> {
        self.check::<K>("create").await?;
        let name = object.name_any();
        let k = key::<K>(namespace, &name);
        let mut objects = self.objects.write().await;
        if objects.contains_key(&k) {
            return Err(kube::Error::Api(ErrorResponse {
                status: "Failure".to_string(),
                message: format!("{} already exists", name),
                reason: "AlreadyExists".to_string(),
                code: 409,
            }));
        }
        objects.insert(k, serde_json::to_value(object).unwrap());
        drop(objects);
        self.record(&K::kind(&()), "create", &name).await;
        Ok(object.clone())
    }

    async fn replace<K: ManagedObject>(&self, namespace: &str, object: &K) -> kube::Result<K> {
        self.check::<K>("replace").await?;
        let name = object.name_any();
        self.objects
            .write()
            .await
            .insert(key::<K>(namespace, &name), serde_json::to_value(object).unwrap());
        self.record(&K::kind(&()), "replace", &name).await;
        Ok(object.clone())
    }

    async fn list_classes(&self) -> kube::Result<Vec<AiGatewayClass>> {
        Ok(self.classes.read().await.clone())
    }

    async fn replace_status(&self, gateway: &AiGateway, status: &AiGatewayStatus) -> kube::Result<()> {
        self.check::<AiGateway>("status").await?;
        let namespace = gateway.namespace().unwrap_or_default();
        self.modify::<AiGateway>(&namespace, &gateway.name_any(), |gw| gw.status = Some(status.clone()))
            .await;
        self.statuses.write().await.push(status.clone());
        self.record("AiGateway", "status", &gateway.name_any()).await;
        Ok(())
    }
}
