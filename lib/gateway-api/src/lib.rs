//! Custom resource types for the LiteLLM AI gateway operator
//!
//! This library defines the custom resources watched by the gateway controller:
//! - AiGateway: a desired multi-provider model gateway
//! - AiGatewayClass: selects which controller is responsible for a gateway

pub mod v1alpha1;

pub use v1alpha1::{AiGateway, AiGatewayClass, AiGatewaySpec, AiGatewayStatus, AiModel};
