use crate::enums::{OrderSide, OrderType};
use crate::sizing::SATOSHIS_PER_BTC;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The typed success result of executing one action against one account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// A single placed, amended or cancelled order.
    Order(OrderSnapshot),
    Orders(Vec<OrderSnapshot>),
    Position(PositionSnapshot),
    Positions(Vec<PositionSnapshot>),
    Margin(MarginSnapshot),
    /// The exchange accepted a request that returns nothing of interest.
    Acknowledged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub display_quantity: Option<Decimal>,
    pub remaining: Decimal,
    pub average_fill_price: Option<Decimal>,
    pub status: String,
    pub exec_inst: String,
    pub transacted_at: Option<DateTime<Utc>>,
}

impl OrderSnapshot {
    pub fn filled(&self) -> Decimal {
        self.quantity - self.remaining
    }

    /// Quantity with sign by side: negative for sells.
    pub fn signed_quantity(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => self.quantity,
            OrderSide::Sell => -self.quantity,
        }
    }

    /// Stop and take-profit orders, as opposed to plain Market/Limit ones.
    pub fn is_conditional(&self) -> bool {
        self.order_type.needs_stop_price()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub symbol: String,
    /// Signed contract count; negative is short.
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
    pub mark_price: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
    pub leverage: Decimal,
    pub unrealised_pnl: Decimal,
    pub realised_pnl: Decimal,
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginSnapshot {
    pub currency: String,
    /// All amounts below are in satoshis.
    pub wallet_balance: i64,
    pub margin_balance: i64,
    pub available_margin: i64,
    pub unrealised_pnl: i64,
}

impl MarginSnapshot {
    pub fn available_btc(&self) -> Decimal {
        Decimal::new(self.available_margin, 0) / Decimal::new(SATOSHIS_PER_BTC, 0)
    }

    pub fn unrealised_pnl_btc(&self) -> Decimal {
        Decimal::new(self.unrealised_pnl, 0) / Decimal::new(SATOSHIS_PER_BTC, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(side: OrderSide, order_type: OrderType) -> OrderSnapshot {
        OrderSnapshot {
            order_id: "id".into(),
            client_order_id: None,
            symbol: "XBTUSD".into(),
            side,
            order_type,
            quantity: dec!(100),
            price: Some(dec!(30000)),
            stop_price: None,
            display_quantity: None,
            remaining: dec!(40),
            average_fill_price: None,
            status: "PartiallyFilled".into(),
            exec_inst: String::new(),
            transacted_at: None,
        }
    }

    #[test]
    fn sell_quantity_is_negative() {
        let sell = order(OrderSide::Sell, OrderType::Limit);
        assert_eq!(sell.signed_quantity(), dec!(-100));
        assert_eq!(sell.filled(), dec!(60));
        assert!(!sell.is_conditional());
        assert!(order(OrderSide::Buy, OrderType::MarketIfTouched).is_conditional());
    }

    #[test]
    fn margin_converts_satoshis() {
        let margin = MarginSnapshot {
            currency: "XBt".into(),
            wallet_balance: 150_000_000,
            margin_balance: 150_000_000,
            available_margin: 50_000_000,
            unrealised_pnl: -2_500_000,
        };
        assert_eq!(margin.available_btc(), dec!(0.5));
        assert_eq!(margin.unrealised_pnl_btc(), dec!(-0.025));
    }
}
