mod data_objects;
mod dispatch_management;
mod payment_management;
mod settlement_management;

pub use data_objects::{
    InsertPaymentResult,
    InsertPayoutResult,
    PayoutAdjustment,
    RefundOutcome,
    RefundUpdate,
    SettlementBatch,
};
pub use dispatch_management::DispatchManagement;
pub use payment_management::PaymentManagement;
pub use settlement_management::SettlementManagement;
