pub mod account;
pub mod action;
pub mod enums;
pub mod error;
pub mod payload;
pub mod sizing;

// Re-export the core types to provide a clean public API.
pub use account::{Account, Credentials, RateLimitState, DEFAULT_HOST};
pub use action::{Action, AmendRequest, OrderRequest, RelativeOrder, HISTORY_COUNT};
pub use enums::{ActionKind, OrderSide, OrderType, TimeInForce, TriggerPrice};
pub use error::CoreError;
pub use payload::{MarginSnapshot, OrderSnapshot, Payload, PositionSnapshot};
pub use sizing::{satoshis, ContractSpec};
