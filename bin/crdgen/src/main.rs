//! Prints the CustomResourceDefinitions served by the gateway controller

use anyhow::Result;
use gateway_api::{AiGateway, AiGatewayClass};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crds = [AiGatewayClass::crd(), AiGateway::crd()];
    for crd in &crds {
        print!("---\n{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
