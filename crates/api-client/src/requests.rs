use core_types::{AmendRequest, OrderRequest, OrderSide, OrderType, TimeInForce};
use rust_decimal::Decimal;
use serde::Serialize;

/// Body of `POST /order`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrderBody {
    pub symbol: String,
    pub side: OrderSide,
    pub ord_type: OrderType,
    #[serde(with = "rust_decimal::serde::float")]
    pub order_qty: Decimal,
    #[serde(rename = "clOrdID")]
    pub cl_ord_id: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub stop_px: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub display_qty: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_in_force: Option<TimeInForce>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub exec_inst: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peg_price_type: Option<&'static str>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub peg_offset_value: Option<Decimal>,
}

impl From<&OrderRequest> for NewOrderBody {
    fn from(order: &OrderRequest) -> Self {
        NewOrderBody {
            symbol: order.symbol.clone(),
            side: order.side,
            ord_type: order.order_type,
            order_qty: order.quantity,
            cl_ord_id: order.client_order_id.to_string(),
            price: order.price.filter(|_| order.order_type.needs_limit_price()),
            stop_px: order.stop_price.filter(|_| order.order_type.needs_stop_price()),
            display_qty: order.display_quantity,
            // Time in force only means something for orders resting at a price.
            time_in_force: order
                .order_type
                .needs_limit_price()
                .then_some(order.time_in_force),
            exec_inst: exec_inst(order),
            peg_price_type: order.peg_offset.map(|_| "TrailingStopPeg"),
            peg_offset_value: order.peg_offset,
        }
    }
}

/// Builds the comma-separated `execInst` flags of an order.
pub fn exec_inst(order: &OrderRequest) -> String {
    let mut flags = Vec::new();
    if order.post_only {
        flags.push("ParticipateDoNotInitiate");
    }
    if order.reduce_only {
        flags.push("ReduceOnly");
    }
    if order.close_on_trigger {
        flags.push("Close");
    }
    if order.order_type.needs_stop_price() {
        flags.push(order.trigger.exec_inst());
    }
    flags.join(",")
}

/// Body of `DELETE /order`.
#[derive(Debug, Serialize)]
pub struct CancelOrderBody<'a> {
    #[serde(rename = "orderID")]
    pub order_id: &'a str,
}

/// Body of `DELETE /order/all`.
#[derive(Debug, Serialize)]
pub struct CancelAllBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<&'a str>,
}

/// Body of `PUT /order`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmendOrderBody<'a> {
    #[serde(rename = "orderID")]
    pub order_id: &'a str,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub order_qty: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price: Option<Decimal>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub stop_px: Option<Decimal>,
}

impl<'a> From<&'a AmendRequest> for AmendOrderBody<'a> {
    fn from(amend: &'a AmendRequest) -> Self {
        AmendOrderBody {
            order_id: &amend.order_id,
            order_qty: amend.quantity,
            price: amend.price,
            stop_px: amend.stop_price,
        }
    }
}

/// Body of `POST /position/leverage`.
#[derive(Debug, Serialize)]
pub struct LeverageBody<'a> {
    pub symbol: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    pub leverage: Decimal,
}

/// Body of `POST /position/riskLimit`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLimitBody<'a> {
    pub symbol: &'a str,
    /// In satoshis.
    pub risk_limit: i64,
}

/// Body of `POST /position/transferMargin`.
#[derive(Debug, Serialize)]
pub struct TransferMarginBody<'a> {
    pub symbol: &'a str,
    /// In satoshis; negative withdraws from the position.
    pub amount: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::TriggerPrice;
    use rust_decimal_macros::dec;

    #[test]
    fn limit_order_body_uses_numbers_and_flags() {
        let order = OrderRequest::limit("XBTUSD", OrderSide::Buy, dec!(100), dec!(30000.5))
            .post_only()
            .reduce_only();
        let body = serde_json::to_value(NewOrderBody::from(&order)).unwrap();
        assert_eq!(body["ordType"], "Limit");
        assert_eq!(body["side"], "Buy");
        assert_eq!(body["orderQty"], 100.0);
        assert_eq!(body["price"], 30000.5);
        assert_eq!(body["timeInForce"], "GoodTillCancel");
        assert_eq!(body["execInst"], "ParticipateDoNotInitiate,ReduceOnly");
        assert_eq!(body["clOrdID"], order.client_order_id.to_string());
        assert!(body.get("stopPx").is_none());
    }

    #[test]
    fn stop_order_body_carries_trigger() {
        let order = OrderRequest::stop_market("XBTUSD", OrderSide::Sell, dec!(10), dec!(29000))
            .with_trigger(TriggerPrice::Mark)
            .close_on_trigger();
        let body = serde_json::to_value(NewOrderBody::from(&order)).unwrap();
        assert_eq!(body["ordType"], "Stop");
        assert_eq!(body["stopPx"], 29000.0);
        assert_eq!(body["execInst"], "Close,MarkPrice");
        assert!(body.get("price").is_none());
        assert!(body.get("timeInForce").is_none());
    }

    #[test]
    fn trailing_stop_body_pegs_to_the_price() {
        let order = OrderRequest::trailing_stop("XBTUSD", OrderSide::Sell, dec!(100), dec!(-50.5));
        let body = serde_json::to_value(NewOrderBody::from(&order)).unwrap();
        assert_eq!(body["ordType"], "Stop");
        assert_eq!(body["pegPriceType"], "TrailingStopPeg");
        assert_eq!(body["pegOffsetValue"], -50.5);
        assert_eq!(body["execInst"], "LastPrice");
        assert!(body.get("stopPx").is_none());
    }

    #[test]
    fn amend_body_only_sends_changed_fields() {
        let amend = AmendRequest {
            order_id: "abc".into(),
            quantity: None,
            price: Some(dec!(101)),
            stop_price: None,
        };
        let body = serde_json::to_string(&AmendOrderBody::from(&amend)).unwrap();
        assert_eq!(body, r#"{"orderID":"abc","price":101.0}"#);
    }
}
