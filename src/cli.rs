use clap::{Args, Parser, Subcommand, ValueEnum};
use core_types::{
    Action, AmendRequest, HISTORY_COUNT, OrderRequest, OrderSide, RelativeOrder, TimeInForce,
    TriggerPrice,
};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

/// Trade several BitMEX accounts at once.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./config.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Comma-separated account labels to act on (default: every account).
    #[arg(long = "accounts", short = 'a', global = true, value_delimiter = ',')]
    pub selected: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage the registered accounts.
    #[command(subcommand)]
    Accounts(AccountsCommand),
    /// Place the same order on every selected account.
    Order(OrderArgs),
    /// Cancel one order by its exchange id.
    Cancel { order_id: String },
    /// Cancel every open order, optionally for one symbol only.
    CancelAll {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Change quantity or prices of an open order.
    Amend(AmendArgs),
    /// Show open positions.
    Positions,
    /// Show open market and limit orders.
    Orders,
    /// Show open stop and take-profit orders.
    Stops,
    /// Show the most recent orders.
    History {
        #[arg(long, default_value_t = HISTORY_COUNT)]
        count: u32,
    },
    /// Show the margin balance.
    Margin,
    /// Set leverage for a symbol (0 means cross margin).
    Leverage { symbol: String, leverage: Decimal },
    /// Set the risk limit of a position, in XBT.
    RiskLimit { symbol: String, risk_limit: Decimal },
    /// Move XBT into an isolated position, or out of it when negative.
    TransferMargin {
        symbol: String,
        #[arg(allow_hyphen_values = true)]
        amount: Decimal,
    },
    /// Poll open positions until interrupted.
    WatchPositions,
}

#[derive(Subcommand)]
pub enum AccountsCommand {
    List,
    Add {
        label: String,
        #[arg(long, env = "TANDEM_API_KEY")]
        key: String,
        #[arg(long, env = "TANDEM_API_SECRET", hide_env_values = true)]
        secret: String,
        /// Exchange host, e.g. https://testnet.bitmex.com.
        #[arg(long)]
        host: Option<String>,
    },
    Remove {
        label: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for OrderSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buy => OrderSide::Buy,
            SideArg::Sell => OrderSide::Sell,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum TriggerArg {
    Mark,
    #[default]
    Last,
    Index,
}

impl From<TriggerArg> for TriggerPrice {
    fn from(trigger: TriggerArg) -> Self {
        match trigger {
            TriggerArg::Mark => TriggerPrice::Mark,
            TriggerArg::Last => TriggerPrice::Last,
            TriggerArg::Index => TriggerPrice::Index,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum TifArg {
    #[default]
    Gtc,
    Ioc,
    Fok,
}

impl From<TifArg> for TimeInForce {
    fn from(tif: TifArg) -> Self {
        match tif {
            TifArg::Gtc => TimeInForce::GoodTillCancel,
            TifArg::Ioc => TimeInForce::ImmediateOrCancel,
            TifArg::Fok => TimeInForce::FillOrKill,
        }
    }
}

/// An order size: a number of contracts, or `N%` of each account's
/// available margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Size {
    Contracts(Decimal),
    Percent(Decimal),
}

impl FromStr for Size {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.strip_suffix('%') {
            Some(percent) => percent
                .trim()
                .parse()
                .map(Size::Percent)
                .map_err(|e| format!("invalid percentage {:?}: {}", s, e)),
            None => s
                .parse()
                .map(Size::Contracts)
                .map_err(|e| format!("invalid quantity {:?}: {}", s, e)),
        }
    }
}

impl Size {
    fn contracts(self) -> Decimal {
        match self {
            Size::Contracts(quantity) => quantity,
            Size::Percent(_) => Decimal::ZERO,
        }
    }
}

#[derive(Args)]
pub struct OrderArgs {
    #[command(subcommand)]
    pub kind: OrderKind,

    #[arg(long, default_value = "XBTUSD", global = true)]
    pub symbol: String,

    /// Only reduce an existing position.
    #[arg(long, global = true)]
    pub reduce_only: bool,

    /// After the entry, place a reduce-only stop at this price on every
    /// account whose entry went through.
    #[arg(long, global = true)]
    pub stop_loss: Option<Decimal>,

    /// Price stream that triggers the protective stop.
    #[arg(long, value_enum, default_value_t, global = true)]
    pub stop_loss_trigger: TriggerArg,

    /// For percentage sizes: XBT value of one contract, instead of what the
    /// exchange reports.
    #[arg(long, global = true)]
    pub contract_value: Option<Decimal>,

    /// For percentage sizes: whether the instrument is inverse, instead of
    /// what the exchange reports.
    #[arg(long, global = true)]
    pub inverse: Option<bool>,
}

#[derive(Subcommand)]
pub enum OrderKind {
    Market {
        side: SideArg,
        size: Size,
    },
    Limit {
        side: SideArg,
        /// Contracts, or a share of available margin such as `25%`.
        size: Size,
        price: Decimal,
        #[arg(long, value_enum, default_value_t)]
        tif: TifArg,
        /// Cancel instead of taking liquidity.
        #[arg(long)]
        post_only: bool,
        /// Show only this quantity in the book (0 hides the order).
        #[arg(long)]
        display: Option<Decimal>,
    },
    Stop {
        side: SideArg,
        size: Size,
        stop_price: Decimal,
        /// Turn into a limit order at this price once triggered.
        #[arg(long)]
        limit: Option<Decimal>,
        #[arg(long, value_enum, default_value_t)]
        trigger: TriggerArg,
        /// Close the position when triggered.
        #[arg(long)]
        close: bool,
    },
    TakeProfit {
        side: SideArg,
        size: Size,
        trigger_price: Decimal,
        #[arg(long)]
        limit: Option<Decimal>,
        #[arg(long, value_enum, default_value_t)]
        trigger: TriggerArg,
        #[arg(long)]
        close: bool,
    },
    /// A stop that trails the price; sell stops take a negative offset.
    TrailingStop {
        side: SideArg,
        size: Size,
        #[arg(allow_hyphen_values = true)]
        offset: Decimal,
        #[arg(long, value_enum, default_value_t)]
        trigger: TriggerArg,
        #[arg(long)]
        close: bool,
    },
}

impl OrderArgs {
    /// The order to place: a fixed size, or sized per account.
    pub fn to_action(&self) -> Action {
        let (order, size) = self.template();
        match size {
            Size::Contracts(_) => Action::PlaceOrder(order),
            Size::Percent(percent) => {
                let mut relative = RelativeOrder::new(order, percent);
                relative.contract_value = self.contract_value;
                relative.inverse = self.inverse;
                Action::PlaceRelativeOrder(relative)
            }
        }
    }

    fn template(&self) -> (OrderRequest, Size) {
        let symbol = self.symbol.as_str();
        let (order, size) = match self.kind {
            OrderKind::Market { side, size } => {
                (OrderRequest::market(symbol, side.into(), size.contracts()), size)
            }
            OrderKind::Limit {
                side,
                size,
                price,
                tif,
                post_only,
                display,
            } => {
                let mut order = OrderRequest::limit(symbol, side.into(), size.contracts(), price)
                    .with_time_in_force(tif.into());
                if post_only {
                    order = order.post_only();
                }
                if let Some(display) = display {
                    order = order.hidden(display);
                }
                (order, size)
            }
            OrderKind::Stop {
                side,
                size,
                stop_price,
                limit,
                trigger,
                close,
            } => {
                let quantity = size.contracts();
                let order = match limit {
                    Some(price) => {
                        OrderRequest::stop_limit(symbol, side.into(), quantity, price, stop_price)
                    }
                    None => OrderRequest::stop_market(symbol, side.into(), quantity, stop_price),
                };
                (with_close(order.with_trigger(trigger.into()), close), size)
            }
            OrderKind::TakeProfit {
                side,
                size,
                trigger_price,
                limit,
                trigger,
                close,
            } => {
                let quantity = size.contracts();
                let order = match limit {
                    Some(price) => OrderRequest::take_profit_limit(
                        symbol,
                        side.into(),
                        quantity,
                        price,
                        trigger_price,
                    ),
                    None => {
                        OrderRequest::take_profit_market(symbol, side.into(), quantity, trigger_price)
                    }
                };
                (with_close(order.with_trigger(trigger.into()), close), size)
            }
            OrderKind::TrailingStop {
                side,
                size,
                offset,
                trigger,
                close,
            } => {
                let order = OrderRequest::trailing_stop(symbol, side.into(), size.contracts(), offset)
                    .with_trigger(trigger.into());
                (with_close(order, close), size)
            }
        };

        let order = if self.reduce_only { order.reduce_only() } else { order };
        (order, size)
    }
}

fn with_close(order: OrderRequest, close: bool) -> OrderRequest {
    if close { order.close_on_trigger() } else { order }
}

#[derive(Args)]
pub struct AmendArgs {
    pub order_id: String,
    #[arg(long)]
    pub quantity: Option<Decimal>,
    #[arg(long)]
    pub price: Option<Decimal>,
    #[arg(long)]
    pub stop_price: Option<Decimal>,
}

impl From<AmendArgs> for Action {
    fn from(args: AmendArgs) -> Self {
        Action::AmendOrder(AmendRequest {
            order_id: args.order_id,
            quantity: args.quantity,
            price: args.price,
            stop_price: args.stop_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tandem").chain(args.iter().copied())).unwrap()
    }

    fn order_action(args: &[&str]) -> Action {
        match parse(args).command {
            Commands::Order(order) => order.to_action(),
            _ => panic!("not an order command"),
        }
    }

    #[test]
    fn sizes_are_contracts_or_percentages() {
        assert_eq!("150".parse::<Size>(), Ok(Size::Contracts(dec!(150))));
        assert_eq!(" 12.5 %".parse::<Size>(), Ok(Size::Percent(dec!(12.5))));
        assert!("ten%".parse::<Size>().is_err());
    }

    #[test]
    fn fixed_size_places_a_plain_order() {
        let action = order_action(&["order", "--reduce-only", "limit", "buy", "300", "25000.5"]);
        match action {
            Action::PlaceOrder(order) => {
                assert_eq!(order.quantity, dec!(300));
                assert_eq!(order.price, Some(dec!(25000.5)));
                assert!(order.reduce_only);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn percentage_size_places_a_relative_order() {
        let action = order_action(&[
            "order", "--inverse", "true", "stop", "sell", "20%", "24000", "--limit", "23900",
        ]);
        match action {
            Action::PlaceRelativeOrder(relative) => {
                assert_eq!(relative.percent, dec!(20));
                assert_eq!(relative.inverse, Some(true));
                assert_eq!(relative.reference_price(), Some(dec!(23900)));
                assert!(relative.validate().is_ok());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn trailing_stop_accepts_a_negative_offset() {
        let action = order_action(&["order", "trailing-stop", "sell", "100", "-75", "--trigger", "mark"]);
        match action {
            Action::PlaceOrder(order) => {
                assert_eq!(order.peg_offset, Some(dec!(-75)));
                assert_eq!(order.trigger, TriggerPrice::Mark);
                assert!(order.validate().is_ok());
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn margin_can_be_withdrawn() {
        match parse(&["transfer-margin", "XBTUSD", "-0.5"]).command {
            Commands::TransferMargin { amount, .. } => assert_eq!(amount, dec!(-0.5)),
            _ => panic!("not a transfer"),
        }
    }
}
