use crate::enums::{ActionKind, OrderSide, OrderType, TimeInForce, TriggerPrice};
use crate::error::CoreError;
use crate::sizing::{satoshis, tick_round, ContractSpec};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of orders fetched for order history.
pub const HISTORY_COUNT: u32 = 20;

/// An immutable description of one logical trading operation to be
/// replicated across accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    PlaceOrder(OrderRequest),
    /// An order sized per account from that account's available margin.
    PlaceRelativeOrder(RelativeOrder),
    CancelOrder { order_id: String },
    /// Cancels every open order, optionally only for one symbol.
    CancelAllOrders { symbol: Option<String> },
    AmendOrder(AmendRequest),
    QueryPositions,
    /// Open Market and Limit orders.
    QueryOrders,
    /// Open stop and take-profit orders.
    QueryStops,
    QueryHistory { count: u32 },
    QueryMargin,
    SetLeverage { symbol: String, leverage: Decimal },
    /// New risk limit of a position, in XBT.
    SetRiskLimit { symbol: String, risk_limit: Decimal },
    /// Moves margin into (positive) or out of (negative) an isolated
    /// position, in XBT.
    TransferMargin { symbol: String, amount: Decimal },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::PlaceOrder(_) => ActionKind::PlaceOrder,
            Action::PlaceRelativeOrder(_) => ActionKind::PlaceRelativeOrder,
            Action::CancelOrder { .. } => ActionKind::CancelOrder,
            Action::CancelAllOrders { .. } => ActionKind::CancelAllOrders,
            Action::AmendOrder(_) => ActionKind::AmendOrder,
            Action::QueryPositions => ActionKind::QueryPositions,
            Action::QueryOrders => ActionKind::QueryOrders,
            Action::QueryStops => ActionKind::QueryStops,
            Action::QueryHistory { .. } => ActionKind::QueryHistory,
            Action::QueryMargin => ActionKind::QueryMargin,
            Action::SetLeverage { .. } => ActionKind::SetLeverage,
            Action::SetRiskLimit { .. } => ActionKind::SetRiskLimit,
            Action::TransferMargin { .. } => ActionKind::TransferMargin,
        }
    }

    /// Exchange requests one execution spends from the account's budget.
    /// Sizing a relative order reads the margin and the instrument first.
    pub fn request_cost(&self) -> u32 {
        match self {
            Action::PlaceRelativeOrder(_) => 3,
            _ => 1,
        }
    }

    /// Checks business parameters. Callers run this before dispatching; the
    /// dispatch engine itself does not validate.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Action::PlaceOrder(order) => order.validate(),
            Action::PlaceRelativeOrder(relative) => relative.validate(),
            Action::CancelOrder { order_id } if order_id.trim().is_empty() => Err(
                CoreError::InvalidInput("order_id".into(), "must not be empty".into()),
            ),
            Action::AmendOrder(amend) => amend.validate(),
            Action::QueryHistory { count: 0 } => Err(CoreError::InvalidInput(
                "count".into(),
                "must be at least 1".into(),
            )),
            Action::SetLeverage { leverage, .. }
                if *leverage < Decimal::ZERO || *leverage > Decimal::ONE_HUNDRED =>
            {
                Err(CoreError::InvalidInput(
                    "leverage".into(),
                    format!("{} is outside 0-100 (0 means cross margin)", leverage),
                ))
            }
            Action::SetRiskLimit { risk_limit, .. } => match satoshis(*risk_limit) {
                Some(sats) if sats > 0 => Ok(()),
                _ => Err(CoreError::InvalidInput(
                    "risk_limit".into(),
                    format!("{} XBT is not a positive satoshi amount", risk_limit),
                )),
            },
            Action::TransferMargin { amount, .. } => match satoshis(*amount) {
                Some(sats) if sats != 0 => Ok(()),
                _ => Err(CoreError::InvalidInput(
                    "amount".into(),
                    format!("{} XBT is not a non-zero satoshi amount", amount),
                )),
            },
            _ => Ok(()),
        }
    }
}

/// A new order, in exchange contracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    /// Limit price, for limit-type orders.
    pub price: Option<Decimal>,
    /// Trigger price, for stop and take-profit orders.
    pub stop_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub trigger: TriggerPrice,
    /// Quantity shown in the book; `Some` makes the order hidden/iceberg.
    pub display_quantity: Option<Decimal>,
    pub post_only: bool,
    pub reduce_only: bool,
    pub close_on_trigger: bool,
    /// Distance a trailing stop keeps from the price; negative trails below.
    pub peg_offset: Option<Decimal>,
}

impl OrderRequest {
    fn base(symbol: &str, side: OrderSide, order_type: OrderType, quantity: Decimal) -> Self {
        Self {
            client_order_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            price: None,
            stop_price: None,
            time_in_force: TimeInForce::default(),
            trigger: TriggerPrice::default(),
            display_quantity: None,
            post_only: false,
            reduce_only: false,
            close_on_trigger: false,
            peg_offset: None,
        }
    }

    pub fn market(symbol: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self::base(symbol, side, OrderType::Market, quantity)
    }

    pub fn limit(symbol: &str, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        let mut order = Self::base(symbol, side, OrderType::Limit, quantity);
        order.price = Some(price);
        order
    }

    pub fn stop_market(symbol: &str, side: OrderSide, quantity: Decimal, stop: Decimal) -> Self {
        let mut order = Self::base(symbol, side, OrderType::Stop, quantity);
        order.stop_price = Some(stop);
        order
    }

    pub fn stop_limit(
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        stop: Decimal,
    ) -> Self {
        let mut order = Self::base(symbol, side, OrderType::StopLimit, quantity);
        order.price = Some(price);
        order.stop_price = Some(stop);
        order
    }

    pub fn take_profit_market(
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        trigger_at: Decimal,
    ) -> Self {
        let mut order = Self::base(symbol, side, OrderType::MarketIfTouched, quantity);
        order.stop_price = Some(trigger_at);
        order
    }

    pub fn take_profit_limit(
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        trigger_at: Decimal,
    ) -> Self {
        let mut order = Self::base(symbol, side, OrderType::LimitIfTouched, quantity);
        order.price = Some(price);
        order.stop_price = Some(trigger_at);
        order
    }

    /// A stop that follows the price at `offset` and triggers when the price
    /// turns back by that much.
    pub fn trailing_stop(symbol: &str, side: OrderSide, quantity: Decimal, offset: Decimal) -> Self {
        let mut order = Self::base(symbol, side, OrderType::Stop, quantity);
        order.peg_offset = Some(offset);
        order
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn with_trigger(mut self, trigger: TriggerPrice) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn hidden(mut self, display_quantity: Decimal) -> Self {
        self.display_quantity = Some(display_quantity);
        self
    }

    pub fn post_only(mut self) -> Self {
        self.post_only = true;
        self
    }

    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    pub fn close_on_trigger(mut self) -> Self {
        self.close_on_trigger = true;
        self
    }

    /// The reduce-only stop that protects the position this order opens:
    /// same symbol and size, opposite side, triggered at `stop_price`.
    pub fn protective_stop(&self, stop_price: Decimal, trigger: TriggerPrice) -> OrderRequest {
        Self::stop_market(&self.symbol, self.side.opposite(), self.quantity, stop_price)
            .with_trigger(trigger)
            .reduce_only()
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.quantity <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "quantity".into(),
                format!("{} is not positive", self.quantity),
            ));
        }
        self.validate_terms()?;
        if let Some(display) = self.display_quantity {
            if display > self.quantity {
                return Err(CoreError::InvalidInput(
                    "display_quantity".into(),
                    format!("{} must be between 0 and {}", display, self.quantity),
                ));
            }
        }
        Ok(())
    }

    /// Checks everything except the order size.
    pub fn validate_terms(&self) -> Result<(), CoreError> {
        if self.symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput("symbol".into(), "must not be empty".into()));
        }
        let order_type = format!("{:?}", self.order_type);
        if self.order_type.needs_limit_price() && self.price.is_none() {
            return Err(CoreError::MissingPrice(order_type, "limit price"));
        }
        if self.order_type.needs_stop_price() && self.stop_price.is_none() && self.peg_offset.is_none() {
            return Err(CoreError::MissingPrice(order_type, "stop price"));
        }
        if let Some(price) = self.price.or(self.stop_price) {
            if price <= Decimal::ZERO {
                return Err(CoreError::InvalidInput(
                    "price".into(),
                    format!("{} is not positive", price),
                ));
            }
        }
        if self.post_only && !self.order_type.needs_limit_price() {
            return Err(CoreError::InvalidInput(
                "post_only".into(),
                format!("{} orders have no limit price to post", order_type),
            ));
        }
        if let Some(offset) = self.peg_offset {
            if self.order_type != OrderType::Stop {
                return Err(CoreError::InvalidInput(
                    "peg_offset".into(),
                    format!("{} orders cannot trail", order_type),
                ));
            }
            // Sell stops trail below the price, buy stops above it.
            let (wrong_side, wanted) = match self.side {
                OrderSide::Sell => (offset >= Decimal::ZERO, "negative"),
                OrderSide::Buy => (offset <= Decimal::ZERO, "positive"),
            };
            if wrong_side {
                return Err(CoreError::InvalidInput(
                    "peg_offset".into(),
                    format!("a {:?} trailing stop needs a {} offset, got {}", self.side, wanted, offset),
                ));
            }
        }
        if self.display_quantity.is_some_and(|display| display < Decimal::ZERO) {
            return Err(CoreError::InvalidInput(
                "display_quantity".into(),
                "must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// An order whose size is `percent / 100 × available margin / margin per
/// contract` for each account, rounded to the instrument's lot size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeOrder {
    /// Everything but the size; its quantity is replaced per account.
    pub order: OrderRequest,
    pub percent: Decimal,
    /// Overrides the contract value (XBT) the exchange reports.
    pub contract_value: Option<Decimal>,
    /// Overrides whether the exchange reports the instrument as inverse.
    pub inverse: Option<bool>,
}

impl RelativeOrder {
    pub fn new(order: OrderRequest, percent: Decimal) -> Self {
        Self {
            order,
            percent,
            contract_value: None,
            inverse: None,
        }
    }

    /// The price one contract is valued at: the limit price, else the
    /// trigger price.
    pub fn reference_price(&self) -> Option<Decimal> {
        self.order.price.or(self.order.stop_price)
    }

    /// The instrument as the exchange `reported` it, with overrides applied.
    pub fn contract(&self, reported: ContractSpec) -> ContractSpec {
        ContractSpec {
            value: self.contract_value.unwrap_or(reported.value),
            inverse: self.inverse.unwrap_or(reported.inverse),
            lot_size: reported.lot_size,
        }
    }

    /// Contracts to order for an account with `available` XBT of margin.
    /// `None` if the figures cannot be combined, e.g. a zero contract value.
    pub fn quantity_for(&self, available: Decimal, contract: &ContractSpec) -> Option<Decimal> {
        let margin = contract.margin_per_contract(self.reference_price()?)?;
        let value = self.percent.checked_div(Decimal::ONE_HUNDRED)?.checked_mul(available)?;
        tick_round(value.checked_div(margin)?, contract.lot_size)
    }

    /// The concrete order for one account.
    pub fn sized(&self, quantity: Decimal) -> OrderRequest {
        self.order.clone().with_quantity(quantity)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.percent <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "percent".into(),
                format!("{} is not positive", self.percent),
            ));
        }
        if self.reference_price().is_none() {
            return Err(CoreError::InvalidInput(
                "price".into(),
                "a relative order needs a limit or trigger price to value its contracts".into(),
            ));
        }
        if self.contract_value.is_some_and(|value| value <= Decimal::ZERO) {
            return Err(CoreError::InvalidInput(
                "contract_value".into(),
                "must be positive".into(),
            ));
        }
        self.order.validate_terms()
    }
}

/// Changes to an open order. At least one field besides the id must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmendRequest {
    pub order_id: String,
    pub quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
}

impl AmendRequest {
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.order_id.trim().is_empty() {
            return Err(CoreError::InvalidInput("order_id".into(), "must not be empty".into()));
        }
        if self.quantity.is_none() && self.price.is_none() && self.stop_price.is_none() {
            return Err(CoreError::InvalidInput(
                "amend".into(),
                "nothing to change".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn limit_order_without_price_is_rejected() {
        let mut order = OrderRequest::limit("XBTUSD", OrderSide::Buy, dec!(100), dec!(30000));
        order.price = None;
        assert_eq!(
            order.validate(),
            Err(CoreError::MissingPrice("Limit".into(), "limit price"))
        );
    }

    #[test]
    fn stop_orders_need_a_trigger_price() {
        let mut order = OrderRequest::stop_market("XBTUSD", OrderSide::Sell, dec!(10), dec!(29000));
        assert!(order.validate().is_ok());
        order.stop_price = None;
        assert!(matches!(order.validate(), Err(CoreError::MissingPrice(_, "stop price"))));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let order = OrderRequest::market("XBTUSD", OrderSide::Buy, dec!(0));
        assert!(matches!(order.validate(), Err(CoreError::InvalidInput(field, _)) if field == "quantity"));
    }

    #[test]
    fn post_only_requires_a_limit_price() {
        let order = OrderRequest::market("XBTUSD", OrderSide::Buy, dec!(5)).post_only();
        assert!(order.validate().is_err());
        let order = OrderRequest::limit("XBTUSD", OrderSide::Buy, dec!(5), dec!(100)).post_only();
        assert!(order.validate().is_ok());
    }

    #[test]
    fn display_quantity_cannot_exceed_order_size() {
        let order = OrderRequest::limit("XBTUSD", OrderSide::Buy, dec!(5), dec!(100)).hidden(dec!(6));
        assert!(order.validate().is_err());
    }

    #[test]
    fn protective_stop_mirrors_the_entry() {
        let entry = OrderRequest::limit("ETHUSD", OrderSide::Buy, dec!(40), dec!(2000));
        let stop = entry.protective_stop(dec!(1900), TriggerPrice::Mark);
        assert_eq!(stop.side, OrderSide::Sell);
        assert_eq!(stop.order_type, OrderType::Stop);
        assert_eq!(stop.quantity, dec!(40));
        assert_eq!(stop.stop_price, Some(dec!(1900)));
        assert_eq!(stop.trigger, TriggerPrice::Mark);
        assert!(stop.reduce_only);
        assert_ne!(stop.client_order_id, entry.client_order_id);
    }

    #[test]
    fn action_validation_covers_non_order_parameters() {
        assert!(Action::CancelOrder { order_id: " ".into() }.validate().is_err());
        assert!(Action::QueryHistory { count: 0 }.validate().is_err());
        assert!(Action::SetLeverage { symbol: "XBTUSD".into(), leverage: dec!(101) }.validate().is_err());
        assert!(Action::SetLeverage { symbol: "XBTUSD".into(), leverage: dec!(0) }.validate().is_ok());
        let amend = AmendRequest { order_id: "abc".into(), quantity: None, price: None, stop_price: None };
        assert!(Action::AmendOrder(amend).validate().is_err());
    }

    #[test]
    fn account_amounts_must_fit_in_satoshis() {
        let risk = |limit| Action::SetRiskLimit { symbol: "XBTUSD".into(), risk_limit: limit };
        assert!(risk(dec!(200)).validate().is_ok());
        assert!(risk(dec!(0)).validate().is_err());
        assert!(risk(dec!(0.000000001)).validate().is_err());

        let transfer = |amount| Action::TransferMargin { symbol: "XBTUSD".into(), amount };
        assert!(transfer(dec!(-0.25)).validate().is_ok());
        assert!(transfer(dec!(0)).validate().is_err());
        assert_eq!(transfer(dec!(1)).kind(), ActionKind::TransferMargin);
    }

    #[test]
    fn trailing_stop_offset_must_point_away_from_the_position() {
        let sell = OrderRequest::trailing_stop("XBTUSD", OrderSide::Sell, dec!(100), dec!(-50));
        assert!(sell.validate().is_ok());
        let sell = OrderRequest::trailing_stop("XBTUSD", OrderSide::Sell, dec!(100), dec!(50));
        assert!(matches!(sell.validate(), Err(CoreError::InvalidInput(field, _)) if field == "peg_offset"));
        let buy = OrderRequest::trailing_stop("XBTUSD", OrderSide::Buy, dec!(100), dec!(50));
        assert!(buy.validate().is_ok());

        let mut limit = OrderRequest::limit("XBTUSD", OrderSide::Buy, dec!(5), dec!(100));
        limit.peg_offset = Some(dec!(10));
        assert!(limit.validate().is_err());
    }

    #[test]
    fn relative_order_is_sized_from_available_margin() {
        // Half of 1 XBT at 25000 USD per XBT, one USD per contract.
        let template = OrderRequest::limit("XBTUSD", OrderSide::Buy, Decimal::ZERO, dec!(25000));
        let relative = RelativeOrder::new(template, dec!(50));
        assert!(relative.validate().is_ok());

        let xbtusd = ContractSpec::from_multiplier(-100_000_000, true, dec!(100));
        assert_eq!(relative.quantity_for(dec!(1), &xbtusd), Some(dec!(12500)));
        assert_eq!(relative.quantity_for(dec!(0.0013), &xbtusd), Some(dec!(0)));

        let sized = relative.sized(dec!(12500));
        assert_eq!(sized.quantity, dec!(12500));
        assert_eq!(sized.client_order_id, relative.order.client_order_id);
        assert!(relative.sized(dec!(0)).validate().is_err());
    }

    #[test]
    fn relative_order_overrides_replace_the_reported_contract() {
        let template = OrderRequest::limit("ETHUSD", OrderSide::Sell, Decimal::ZERO, dec!(2000));
        let mut relative = RelativeOrder::new(template, dec!(10));
        relative.contract_value = Some(dec!(0.000002));

        let reported = ContractSpec::from_multiplier(100, false, dec!(1));
        let contract = relative.contract(reported);
        assert_eq!(contract.value, dec!(0.000002));
        assert!(!contract.inverse);
        // 0.1 XBT / (2000 × 0.000002 XBT per contract).
        assert_eq!(relative.quantity_for(dec!(1), &contract), Some(dec!(25)));

        relative.contract_value = Some(dec!(0));
        assert_eq!(relative.quantity_for(dec!(1), &relative.contract(reported)), None);
        assert!(relative.validate().is_err());
    }

    #[test]
    fn relative_order_needs_a_price_and_a_share() {
        let market = OrderRequest::market("XBTUSD", OrderSide::Buy, Decimal::ZERO);
        assert!(RelativeOrder::new(market, dec!(10)).validate().is_err());
        let limit = OrderRequest::limit("XBTUSD", OrderSide::Buy, Decimal::ZERO, dec!(100));
        assert!(RelativeOrder::new(limit, dec!(0)).validate().is_err());
    }

    #[test]
    fn relative_orders_spend_three_requests() {
        let limit = OrderRequest::limit("XBTUSD", OrderSide::Buy, Decimal::ZERO, dec!(100));
        assert_eq!(Action::PlaceRelativeOrder(RelativeOrder::new(limit, dec!(5))).request_cost(), 3);
        assert_eq!(Action::QueryStops.request_cost(), 1);
        assert_eq!(Action::QueryStops.kind(), ActionKind::QueryStops);
    }
}
