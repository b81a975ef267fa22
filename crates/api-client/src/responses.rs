use chrono::{DateTime, Utc};
use core_types::{
    ContractSpec, MarginSnapshot, OrderSide, OrderSnapshot, OrderType, PositionSnapshot,
};
use rust_decimal::Decimal;
use serde::Deserialize;

// BitMEX uses camelCase with a few upper-case acronyms (orderID, clOrdID).

/// An order as returned by `GET/POST/PUT/DELETE /order`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    #[serde(rename = "orderID")]
    pub order_id: String,
    #[serde(rename = "clOrdID", default)]
    pub cl_ord_id: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub ord_type: OrderType,
    #[serde(default)]
    pub order_qty: Option<Decimal>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub stop_px: Option<Decimal>,
    #[serde(default)]
    pub display_qty: Option<Decimal>,
    #[serde(default)]
    pub leaves_qty: Option<Decimal>,
    #[serde(default)]
    pub avg_px: Option<Decimal>,
    #[serde(default)]
    pub ord_status: String,
    #[serde(default)]
    pub exec_inst: String,
    #[serde(default)]
    pub transact_time: Option<DateTime<Utc>>,
    /// Set by cancel endpoints when an individual order could not be cancelled.
    #[serde(default)]
    pub error: Option<String>,
}

impl From<OrderResponse> for OrderSnapshot {
    fn from(order: OrderResponse) -> Self {
        OrderSnapshot {
            order_id: order.order_id,
            client_order_id: order.cl_ord_id.filter(|id| !id.is_empty()),
            symbol: order.symbol,
            side: order.side,
            order_type: order.ord_type,
            quantity: order.order_qty.unwrap_or_default(),
            price: order.price,
            stop_price: order.stop_px,
            display_quantity: order.display_qty,
            remaining: order.leaves_qty.unwrap_or_default(),
            average_fill_price: order.avg_px,
            status: order.ord_status,
            exec_inst: order.exec_inst,
            transacted_at: order.transact_time,
        }
    }
}

/// A position from `GET /position` or `POST /position/leverage`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub symbol: String,
    #[serde(default)]
    pub current_qty: Decimal,
    #[serde(default)]
    pub avg_entry_price: Option<Decimal>,
    #[serde(default)]
    pub mark_price: Option<Decimal>,
    #[serde(default)]
    pub liquidation_price: Option<Decimal>,
    #[serde(default)]
    pub leverage: Decimal,
    #[serde(default)]
    pub unrealised_pnl: Decimal,
    #[serde(default)]
    pub realised_pnl: Decimal,
    #[serde(default)]
    pub is_open: bool,
}

impl From<PositionResponse> for PositionSnapshot {
    fn from(p: PositionResponse) -> Self {
        PositionSnapshot {
            symbol: p.symbol,
            size: p.current_qty,
            entry_price: p.avg_entry_price,
            mark_price: p.mark_price,
            liquidation_price: p.liquidation_price,
            leverage: p.leverage,
            unrealised_pnl: p.unrealised_pnl,
            realised_pnl: p.realised_pnl,
            is_open: p.is_open,
        }
    }
}

/// The account margin summary from `GET /user/margin`. Amounts in satoshis.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginResponse {
    pub currency: String,
    #[serde(default)]
    pub wallet_balance: i64,
    #[serde(default)]
    pub margin_balance: i64,
    #[serde(default)]
    pub available_margin: i64,
    #[serde(default)]
    pub unrealised_pnl: i64,
}

impl From<MarginResponse> for MarginSnapshot {
    fn from(m: MarginResponse) -> Self {
        MarginSnapshot {
            currency: m.currency,
            wallet_balance: m.wallet_balance,
            margin_balance: m.margin_balance,
            available_margin: m.available_margin,
            unrealised_pnl: m.unrealised_pnl,
        }
    }
}

/// An instrument from `GET /instrument`. Only the fields that value a
/// contract are read.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentResponse {
    pub symbol: String,
    /// Satoshis per contract per unit of price; negative for inverse
    /// instruments.
    #[serde(default)]
    pub multiplier: Option<i64>,
    #[serde(default)]
    pub is_inverse: bool,
    #[serde(default)]
    pub lot_size: Option<Decimal>,
}

impl InstrumentResponse {
    pub fn contract(&self) -> ContractSpec {
        ContractSpec::from_multiplier(
            self.multiplier.unwrap_or_default(),
            self.is_inverse,
            self.lot_size.unwrap_or(Decimal::ONE),
        )
    }
}

/// Represents an error response from the BitMEX API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub message: String,
}

impl ApiErrorResponse {
    /// Renders an error body as `name: message`, falling back to the raw text.
    pub fn describe(text: &str) -> String {
        match serde_json::from_str::<ApiErrorResponse>(text) {
            Ok(parsed) if parsed.error.name.is_empty() => parsed.error.message,
            Ok(parsed) => format!("{}: {}", parsed.error.name, parsed.error.message),
            Err(_) => text.trim().to_string(),
        }
    }
}
