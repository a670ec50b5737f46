pub mod messages;
pub mod transaction;

pub use messages::{
    BaseRequest, DepositRequest, ErrorResponse, GatewayRequest, GatewayResponse,
    TransactionResponse, TransactionStatusUpdate, WithdrawalRequest,
};
pub use transaction::{
    CardDetails, GatewayDetails, Money, Transaction, TransactionStatus, TransactionType,
};
