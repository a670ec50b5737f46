pub mod adapter;
pub mod registry;

pub use adapter::{GatewayAdapter, GatewayError, PaymentGateway, StatusPolicy};
pub use registry::{GatewayRegistry, GatewayRegistryBuilder, GATEWAY_A, GATEWAY_B};
