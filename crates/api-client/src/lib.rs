use crate::auth::sign_request;
use async_trait::async_trait;
use chrono::Utc;
use configuration::ExchangeConfig;
use core_types::{
    satoshis, Action, Credentials, MarginSnapshot, OrderRequest, Payload, RelativeOrder, HISTORY_COUNT,
};
use rust_decimal::Decimal;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

mod auth;
pub mod error;
pub mod requests;
pub mod responses;

// --- Public API ---
pub use error::{retry_after_from_headers, ErrorKind, ExchangeError};
pub use responses::{
    ApiErrorResponse, InstrumentResponse, MarginResponse, OrderResponse, PositionResponse,
};

/// Root of every REST path.
pub const API_ROOT: &str = "/api/v1";

/// Performs one authenticated call against the exchange for one account.
///
/// This trait is the seam the dispatch engine uses, allowing the underlying
/// implementation (live or stub) to be swapped out. Implementations must be
/// safe to call concurrently for different accounts.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Executes `action` with `credentials` and returns the typed result.
    async fn execute(
        &self,
        action: &Action,
        credentials: &Credentials,
    ) -> Result<Payload, ExchangeError>;
}

/// A concrete implementation of the `ExchangeClient` for BitMEX.
///
/// One instance serves every account: each call is signed with the
/// credentials it is given, and the target host comes from them too.
#[derive(Clone)]
pub struct BitmexClient {
    client: reqwest::Client,
    request_life: Duration,
}

impl BitmexClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("tandem/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            request_life: config.request_life(),
        })
    }

    /// Sends one signed request and decodes the success body into `T`.
    async fn send_signed<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        credentials: &Credentials,
        method: Method,
        path: &str,
        query: &BTreeMap<&str, String>,
        body: Option<&B>,
    ) -> Result<T, ExchangeError> {
        let mut path = format!("{}{}", API_ROOT, path);
        if !query.is_empty() {
            let query_string = serde_qs::to_string(query)
                .map_err(|e| ExchangeError::Rejected(format!("unencodable query: {}", e)))?;
            path.push('?');
            path.push_str(&query_string);
        }
        let body = match body {
            Some(body) => serde_json::to_string(body)
                .map_err(|e| ExchangeError::Rejected(format!("unencodable body: {}", e)))?,
            None => String::new(),
        };

        let expires = Utc::now().timestamp() + self.request_life.as_secs() as i64;
        let signature = sign_request(&credentials.secret, method.as_str(), &path, expires, &body);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("api-expires", HeaderValue::from(expires));
        headers.insert(
            "api-key",
            HeaderValue::from_str(&credentials.key)
                .map_err(|_| ExchangeError::Auth("API key is not a valid header value".into()))?,
        );
        headers.insert(
            "api-signature",
            HeaderValue::from_str(&signature)
                .map_err(|_| ExchangeError::Auth("signature is not a valid header value".into()))?,
        );

        let url = format!("{}{}", credentials.host.trim_end_matches('/'), path);
        tracing::trace!(%method, %url, "Sending signed request.");

        let response = self
            .client
            .request(method, &url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str::<T>(&text).map_err(|e| {
                ExchangeError::Transport(format!("undecodable response from {}: {}", url, e))
            })
        } else {
            Err(ExchangeError::from_status(
                status,
                &response_headers,
                ApiErrorResponse::describe(&text),
                Utc::now().timestamp(),
            ))
        }
    }

    async fn open_orders(&self, credentials: &Credentials) -> Result<Vec<OrderResponse>, ExchangeError> {
        let mut query = BTreeMap::new();
        query.insert("filter", r#"{"open":true}"#.to_string());
        self.send_signed::<_, ()>(credentials, Method::GET, "/order", &query, None)
            .await
    }

    async fn place(&self, credentials: &Credentials, order: &OrderRequest) -> Result<Payload, ExchangeError> {
        let body = requests::NewOrderBody::from(order);
        let placed: OrderResponse = self
            .send_signed(credentials, Method::POST, "/order", &BTreeMap::new(), Some(&body))
            .await?;
        Ok(Payload::Order(placed.into()))
    }

    async fn margin(&self, credentials: &Credentials) -> Result<MarginSnapshot, ExchangeError> {
        let mut query = BTreeMap::new();
        query.insert("currency", "XBt".to_string());
        let margin: MarginResponse = self
            .send_signed::<_, ()>(credentials, Method::GET, "/user/margin", &query, None)
            .await?;
        Ok(margin.into())
    }

    async fn instrument(
        &self,
        credentials: &Credentials,
        symbol: &str,
    ) -> Result<InstrumentResponse, ExchangeError> {
        let mut query = BTreeMap::new();
        query.insert("symbol", symbol.to_string());
        let instruments: Vec<InstrumentResponse> = self
            .send_signed::<_, ()>(credentials, Method::GET, "/instrument", &query, None)
            .await?;
        instruments
            .into_iter()
            .find(|instrument| instrument.symbol == symbol)
            .ok_or_else(|| ExchangeError::Rejected(format!("Unknown instrument {}", symbol)))
    }

    /// Sizes the order from this account's available margin, then places it.
    async fn place_relative(
        &self,
        credentials: &Credentials,
        relative: &RelativeOrder,
    ) -> Result<Payload, ExchangeError> {
        let symbol = relative.order.symbol.as_str();
        let margin = self.margin(credentials).await?;
        let contract = relative.contract(self.instrument(credentials, symbol).await?.contract());

        let quantity = relative
            .quantity_for(margin.available_btc(), &contract)
            .ok_or_else(|| {
                ExchangeError::Rejected(format!("Cannot value a contract of {}", symbol))
            })?;
        let order = relative.sized(quantity);
        order
            .validate()
            .map_err(|e| ExchangeError::Rejected(format!("Sized order is invalid: {}", e)))?;

        tracing::debug!(
            symbol,
            available = %margin.available_btc(),
            %quantity,
            "Sized relative order."
        );
        self.place(credentials, &order).await
    }

    async fn post_position<B: Serialize>(
        &self,
        credentials: &Credentials,
        path: &str,
        body: &B,
    ) -> Result<Payload, ExchangeError> {
        let position: PositionResponse = self
            .send_signed(credentials, Method::POST, path, &BTreeMap::new(), Some(body))
            .await?;
        Ok(Payload::Position(position.into()))
    }
}

/// XBT to satoshis for request bodies; validated actions always fit.
fn satoshi_amount(field: &str, btc: Decimal) -> Result<i64, ExchangeError> {
    satoshis(btc).ok_or_else(|| ExchangeError::Rejected(format!("{} {} XBT is out of range", field, btc)))
}

/// Cancel endpoints answer 200 and flag per-order failures in the body.
fn reject_cancel_errors(orders: Vec<OrderResponse>) -> Result<Vec<OrderResponse>, ExchangeError> {
    match orders.iter().find_map(|o| o.error.clone()) {
        Some(error) => Err(ExchangeError::Rejected(error)),
        None => Ok(orders),
    }
}

fn into_orders(orders: Vec<OrderResponse>) -> Payload {
    Payload::Orders(orders.into_iter().map(Into::into).collect())
}

#[async_trait]
impl ExchangeClient for BitmexClient {
    async fn execute(
        &self,
        action: &Action,
        credentials: &Credentials,
    ) -> Result<Payload, ExchangeError> {
        let no_query = BTreeMap::new();

        match action {
            Action::PlaceOrder(order) => self.place(credentials, order).await,
            Action::PlaceRelativeOrder(relative) => self.place_relative(credentials, relative).await,
            Action::CancelOrder { order_id } => {
                let body = requests::CancelOrderBody { order_id };
                let cancelled: Vec<OrderResponse> = self
                    .send_signed(credentials, Method::DELETE, "/order", &no_query, Some(&body))
                    .await?;
                let mut cancelled = reject_cancel_errors(cancelled)?;
                match cancelled.len() {
                    1 => Ok(Payload::Order(cancelled.remove(0).into())),
                    _ => Ok(into_orders(cancelled)),
                }
            }
            Action::CancelAllOrders { symbol } => {
                let body = requests::CancelAllBody { symbol: symbol.as_deref() };
                let cancelled: Vec<OrderResponse> = self
                    .send_signed(credentials, Method::DELETE, "/order/all", &no_query, Some(&body))
                    .await?;
                Ok(into_orders(reject_cancel_errors(cancelled)?))
            }
            Action::AmendOrder(amend) => {
                let body = requests::AmendOrderBody::from(amend);
                let amended: OrderResponse = self
                    .send_signed(credentials, Method::PUT, "/order", &no_query, Some(&body))
                    .await?;
                Ok(Payload::Order(amended.into()))
            }
            Action::QueryPositions => {
                let mut query = BTreeMap::new();
                query.insert("filter", r#"{"isOpen":true}"#.to_string());
                let positions: Vec<PositionResponse> = self
                    .send_signed::<_, ()>(credentials, Method::GET, "/position", &query, None)
                    .await?;
                Ok(Payload::Positions(positions.into_iter().map(Into::into).collect()))
            }
            Action::QueryOrders | Action::QueryStops => {
                let want_conditional = matches!(action, Action::QueryStops);
                let orders = self
                    .open_orders(credentials)
                    .await?
                    .into_iter()
                    .filter(|o| o.ord_type.needs_stop_price() == want_conditional)
                    .collect();
                Ok(into_orders(orders))
            }
            Action::QueryHistory { count } => {
                let mut query = BTreeMap::new();
                let count = if *count == 0 { HISTORY_COUNT } else { *count };
                query.insert("count", count.to_string());
                query.insert("reverse", "true".to_string());
                let orders: Vec<OrderResponse> = self
                    .send_signed::<_, ()>(credentials, Method::GET, "/order", &query, None)
                    .await?;
                Ok(into_orders(orders))
            }
            Action::QueryMargin => Ok(Payload::Margin(self.margin(credentials).await?)),
            Action::SetLeverage { symbol, leverage } => {
                let body = requests::LeverageBody { symbol, leverage: *leverage };
                self.post_position(credentials, "/position/leverage", &body).await
            }
            Action::SetRiskLimit { symbol, risk_limit } => {
                let body = requests::RiskLimitBody {
                    symbol,
                    risk_limit: satoshi_amount("risk limit", *risk_limit)?,
                };
                self.post_position(credentials, "/position/riskLimit", &body).await
            }
            Action::TransferMargin { symbol, amount } => {
                let body = requests::TransferMarginBody {
                    symbol,
                    amount: satoshi_amount("margin transfer", *amount)?,
                };
                self.post_position(credentials, "/position/transferMargin", &body).await
            }
        }
    }
}
