//! Shared vocabulary for the commerce core: typed identifiers, money, and the
//! status enums persisted by the store and driven by the domain.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, ParseStatusError, PaymentMethod, PaymentStatus, TransactionType};
pub use types::{OrderId, ProductId, TransactionId, UserId};
