pub mod breaker;
pub mod resilient;
pub mod transport;

pub use breaker::{BreakerSettings, CircuitBreaker, CircuitState};
pub use resilient::{ClientError, ResilientClient, RetryPolicy};
pub use transport::{OutboundRequest, OutboundResponse, ReqwestTransport, Transport, TransportError};
