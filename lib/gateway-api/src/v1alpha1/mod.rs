/// API version v1alpha1 for the AI gateway CRDs

pub mod ai_gateway;
pub mod ai_gateway_class;

pub use ai_gateway::{AiGateway, AiGatewaySpec, AiGatewayStatus, AiModel};
pub use ai_gateway_class::{AiGatewayClass, AiGatewayClassSpec, DEFAULT_CLASS_ANNOTATION};
