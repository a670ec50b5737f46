use std::collections::HashMap;
use std::sync::Arc;

use super::adapter::PaymentGateway;

pub const GATEWAY_A: &str = "gatewayA";
pub const GATEWAY_B: &str = "gatewayB";

/// Gateways keyed by the id callers put in `gatewayDetails.id`. Fixed once built.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: Arc<HashMap<String, Arc<dyn PaymentGateway>>>,
}

impl GatewayRegistry {
    pub fn builder() -> GatewayRegistryBuilder {
        GatewayRegistryBuilder::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn PaymentGateway>> {
        self.gateways.get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.gateways.contains_key(id)
    }
}

#[derive(Default)]
pub struct GatewayRegistryBuilder {
    gateways: HashMap<String, Arc<dyn PaymentGateway>>,
}

impl GatewayRegistryBuilder {
    pub fn register(mut self, id: impl Into<String>, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(id.into(), gateway);
        self
    }

    pub fn build(self) -> GatewayRegistry {
        GatewayRegistry {
            gateways: Arc::new(self.gateways),
        }
    }
}
