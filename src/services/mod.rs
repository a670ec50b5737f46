pub mod callback;
pub mod in_flight;
pub mod transaction_processor;

pub use callback::{CallbackError, CallbackIngestor};
pub use in_flight::{InFlight, InFlightGuard};
pub use transaction_processor::{ProcessorError, ProcessorSettings, TransactionProcessor};
