//! Reconciliation core for the LiteLLM AI gateway operator
//!
//! This library provides:
//! - Proxy configuration rendering and hashing
//! - Order-insensitive equality checks for child objects
//! - Synthesis of the ConfigMap, Deployment and Service a gateway owns
//! - Status condition bookkeeping
//! - The reconcile loop itself, over a pluggable object store

pub mod conditions;
pub mod equality;
pub mod error;
pub mod reconciler;
pub mod render;
pub mod resources;
pub mod store;

pub use error::{GatewayError, Result, ValidationError};
pub use reconciler::{ApplyResult, ReconcileOutcome, ReconcileReport, Reconciler, CONTROLLER_NAME};
pub use render::{ProxyKind, RenderedConfig};
pub use resources::ProxySettings;
pub use store::{KubeStore, ObjectStore};
