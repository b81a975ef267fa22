use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side of the order
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Order types supported by the exchange. Names match the wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
    MarketIfTouched,
    LimitIfTouched,
}

impl OrderType {
    /// Whether the order rests at a limit price.
    pub fn needs_limit_price(&self) -> bool {
        matches!(
            self,
            OrderType::Limit | OrderType::StopLimit | OrderType::LimitIfTouched
        )
    }

    /// Whether the order is triggered by a stop/trigger price.
    pub fn needs_stop_price(&self) -> bool {
        !matches!(self, OrderType::Market | OrderType::Limit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    #[default]
    GoodTillCancel,
    ImmediateOrCancel,
    FillOrKill,
}

/// Which price stream triggers a stop or take-profit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerPrice {
    Mark,
    #[default]
    Last,
    Index,
}

impl TriggerPrice {
    /// The exchange's execution-instruction token, e.g. `LastPrice`.
    pub fn exec_inst(&self) -> &'static str {
        match self {
            TriggerPrice::Mark => "MarkPrice",
            TriggerPrice::Last => "LastPrice",
            TriggerPrice::Index => "IndexPrice",
        }
    }
}

/// The tag of an `Action`, used for logging and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    PlaceOrder,
    PlaceRelativeOrder,
    CancelOrder,
    CancelAllOrders,
    AmendOrder,
    QueryPositions,
    QueryOrders,
    QueryStops,
    QueryHistory,
    QueryMargin,
    SetLeverage,
    SetRiskLimit,
    TransferMargin,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::PlaceOrder => "place-order",
            ActionKind::PlaceRelativeOrder => "place-relative-order",
            ActionKind::CancelOrder => "cancel-order",
            ActionKind::CancelAllOrders => "cancel-all-orders",
            ActionKind::AmendOrder => "amend-order",
            ActionKind::QueryPositions => "query-positions",
            ActionKind::QueryOrders => "query-orders",
            ActionKind::QueryStops => "query-stops",
            ActionKind::QueryHistory => "query-history",
            ActionKind::QueryMargin => "query-margin",
            ActionKind::SetLeverage => "set-leverage",
            ActionKind::SetRiskLimit => "set-risk-limit",
            ActionKind::TransferMargin => "transfer-margin",
        };
        f.write_str(name)
    }
}
