use crate::config::BrokerConfig;
use crate::domain::entities::account::AccountState;
use crate::domain::entities::news::NewsItem;
use crate::domain::entities::order::{Order, OrderSide, OrderType};
use crate::domain::entities::position::PositionSnapshot;
use crate::domain::errors::GatewayError;
use crate::domain::repositories::brokerage_gateway::{BrokerageGateway, GatewayResult};
use crate::rate_limit::{acquire, create_rate_limiter, BrokerRateLimiter, RateLimiterConfig};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

/// Alpaca caps a news page at 50 articles
const NEWS_PAGE_LIMIT: u32 = 50;
const MAX_NEWS_PAGES: usize = 10;

/// Alpaca account payload; monetary fields arrive as decimal strings
#[derive(Debug, Deserialize)]
pub struct AlpacaAccount {
    pub cash: String,
    pub buying_power: String,
    pub portfolio_value: String,
}

#[derive(Debug, Deserialize)]
pub struct AlpacaPosition {
    pub symbol: String,
    pub qty: String,
    pub market_value: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct AlpacaOrderRequest {
    pub symbol: String,
    pub qty: String,
    pub side: &'static str,
    pub r#type: &'static str,
    pub time_in_force: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_price: Option<String>,
    pub client_order_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AlpacaOrderResponse {
    pub id: String,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlpacaClock {
    pub is_open: bool,
}

#[derive(Debug, Deserialize)]
pub struct AlpacaTrade {
    #[serde(rename = "p")]
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct AlpacaLatestTrade {
    pub trade: Option<AlpacaTrade>,
}

#[derive(Debug, Deserialize)]
pub struct AlpacaNewsArticle {
    pub headline: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct AlpacaNewsPage {
    #[serde(default)]
    pub news: Vec<AlpacaNewsArticle>,
    pub next_page_token: Option<String>,
}

fn parse_decimal(field: &str, value: &str) -> GatewayResult<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| GatewayError::ParseError(format!("{} is not a number: '{}'", field, value)))
}

impl TryFrom<AlpacaAccount> for AccountState {
    type Error = GatewayError;

    fn try_from(account: AlpacaAccount) -> Result<Self, Self::Error> {
        Ok(AccountState::new(
            parse_decimal("cash", &account.cash)?,
            parse_decimal("buying_power", &account.buying_power)?,
            parse_decimal("portfolio_value", &account.portfolio_value)?,
        ))
    }
}

impl TryFrom<AlpacaPosition> for PositionSnapshot {
    type Error = GatewayError;

    fn try_from(position: AlpacaPosition) -> Result<Self, Self::Error> {
        let quantity = parse_decimal("qty", &position.qty)?;
        let market_value = match position.market_value.as_deref() {
            Some(value) => parse_decimal("market_value", value)?,
            None => 0.0,
        };
        Ok(PositionSnapshot::new(&position.symbol, quantity, market_value))
    }
}

/// The token for the next news page, or `None` once paging is done or stuck
fn follow_page(current: Option<&str>, next: Option<String>) -> Option<String> {
    next.filter(|token| !token.is_empty() && Some(token.as_str()) != current)
}

/// Alpaca accepts at most nine decimal places on `qty`
fn format_quantity(quantity: f64) -> String {
    let fixed = format!("{:.9}", quantity);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

impl From<&Order> for AlpacaOrderRequest {
    fn from(order: &Order) -> Self {
        let side = match order.side {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        };
        let order_type = match order.order_type {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::Stop => "stop",
        };
        Self {
            symbol: order.symbol.clone(),
            qty: format_quantity(order.quantity.value()),
            side,
            r#type: order_type,
            // Fractional quantities are only accepted as day orders
            time_in_force: "day",
            limit_price: order.limit_price.map(|p| p.value().to_string()),
            stop_price: order.stop_price.map(|p| p.value().to_string()),
            client_order_id: order.id.clone(),
        }
    }
}

/// Alpaca brokerage over its REST APIs
pub struct AlpacaGateway {
    client: Client,
    config: BrokerConfig,
    trading_base: Url,
    data_base: Url,
    limiter: BrokerRateLimiter,
}

impl AlpacaGateway {
    pub fn new(config: BrokerConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("sentiment-trader/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        let trading_base = parse_base(&config.trading_base_url)?;
        let data_base = parse_base(&config.data_base_url)?;
        let limiter = create_rate_limiter(RateLimiterConfig {
            requests_per_minute: config.requests_per_minute,
        });

        info!(
            "Alpaca gateway configured ({} trading at {})",
            if config.paper { "paper" } else { "live" },
            trading_base
        );

        Ok(Self {
            client,
            config,
            trading_base,
            data_base,
            limiter,
        })
    }

    fn trading_url(&self, path: &str) -> GatewayResult<Url> {
        join(&self.trading_base, path)
    }

    fn data_url(&self, path: &str) -> GatewayResult<Url> {
        join(&self.data_base, path)
    }

    /// News endpoint for one symbol over `[start, end]`
    pub fn news_url(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        page_token: Option<&str>,
    ) -> GatewayResult<Url> {
        let mut url = self.data_url("/v1beta1/news")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("symbols", symbol)
                .append_pair("start", &start.to_rfc3339_opts(SecondsFormat::Secs, true))
                .append_pair("end", &end.to_rfc3339_opts(SecondsFormat::Secs, true))
                .append_pair("limit", &NEWS_PAGE_LIMIT.to_string())
                .append_pair("sort", "desc");
            if let Some(token) = page_token {
                query.append_pair("page_token", token);
            }
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("APCA-API-KEY-ID", &self.config.api_key)
            .header("APCA-API-SECRET-KEY", self.config.api_secret.as_str())
    }

    async fn send(
        &self,
        request: RequestBuilder,
        on_error: fn(String) -> GatewayError,
    ) -> GatewayResult<Response> {
        acquire(&self.limiter).await;
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        check_status(response, on_error).await
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: Url,
        on_error: fn(String) -> GatewayError,
    ) -> GatewayResult<T> {
        debug!("GET {}", url.path());
        let response = self.send(self.client.get(url), on_error).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))
    }
}

fn parse_base(base: &str) -> GatewayResult<Url> {
    Url::parse(base).map_err(|e| GatewayError::NetworkError(format!("Invalid base URL '{}': {}", base, e)))
}

fn join(base: &Url, path: &str) -> GatewayResult<Url> {
    base.join(path)
        .map_err(|e| GatewayError::NetworkError(format!("Invalid path '{}': {}", path, e)))
}

async fn check_status(
    response: Response,
    on_error: fn(String) -> GatewayError,
) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_text = response.text().await.unwrap_or_default();
    let message = format!("{} - {}", status, error_text);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(GatewayError::AuthenticationError(message))
        }
        _ => Err(on_error(message)),
    }
}

#[async_trait]
impl BrokerageGateway for AlpacaGateway {
    fn name(&self) -> &str {
        "alpaca"
    }

    async fn get_last_price(&self, symbol: &str) -> GatewayResult<Option<f64>> {
        let url = self.data_url(&format!("/v2/stocks/{}/trades/latest", symbol))?;
        acquire(&self.limiter).await;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let latest: AlpacaLatestTrade = check_status(response, GatewayError::MarketDataFailed)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;
        Ok(latest.trade.map(|t| t.price).filter(|p| p.is_finite() && *p > 0.0))
    }

    async fn get_account(&self) -> GatewayResult<AccountState> {
        let account: AlpacaAccount = self
            .get_json(self.trading_url("/v2/account")?, GatewayError::AccountQueryFailed)
            .await?;
        account.try_into()
    }

    async fn get_positions(&self) -> GatewayResult<Vec<PositionSnapshot>> {
        let positions: Vec<AlpacaPosition> = self
            .get_json(self.trading_url("/v2/positions")?, GatewayError::PositionQueryFailed)
            .await?;
        positions.into_iter().map(PositionSnapshot::try_from).collect()
    }

    async fn get_position(&self, symbol: &str) -> GatewayResult<Option<PositionSnapshot>> {
        let url = self.trading_url(&format!("/v2/positions/{}", symbol))?;
        acquire(&self.limiter).await;
        let response = self
            .authorized(self.client.get(url))
            .send()
            .await
            .map_err(|e| GatewayError::NetworkError(e.to_string()))?;
        // Alpaca answers 404 when no position is held
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let position: AlpacaPosition = check_status(response, GatewayError::PositionQueryFailed)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;
        let snapshot = PositionSnapshot::try_from(position)?;
        Ok(Some(snapshot).filter(|p| p.is_open()))
    }

    async fn get_news(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> GatewayResult<Vec<NewsItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        for _ in 0..MAX_NEWS_PAGES {
            let url = self.news_url(symbol, start, end, page_token.as_deref())?;
            let page: AlpacaNewsPage = self.get_json(url, GatewayError::NewsQueryFailed).await?;
            items.extend(page.news.into_iter().map(|article| NewsItem {
                headline: article.headline,
                created_at: article.created_at,
            }));
            page_token = follow_page(page_token.as_deref(), page.next_page_token);
            if page_token.is_none() {
                break;
            }
        }
        if page_token.is_some() {
            warn!(
                "News for {} still paging after {} pages, using what was fetched",
                symbol, MAX_NEWS_PAGES
            );
        }
        debug!("Fetched {} news items for {}", items.len(), symbol);
        Ok(items)
    }

    async fn submit_order(&self, order: &Order) -> GatewayResult<String> {
        let body = AlpacaOrderRequest::from(order);
        let url = self.trading_url("/v2/orders")?;
        let response = self
            .send(self.client.post(url).json(&body), GatewayError::OrderPlacementFailed)
            .await?;
        let placed: AlpacaOrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::ParseError(e.to_string()))?;
        info!(
            "Alpaca accepted {} {} {} (order {}, status {})",
            body.side,
            body.qty,
            body.symbol,
            placed.id,
            placed.status.as_deref().unwrap_or("unknown")
        );
        Ok(placed.id)
    }

    async fn is_market_open(&self) -> GatewayResult<bool> {
        let clock: AlpacaClock = self
            .get_json(self.trading_url("/v2/clock")?, GatewayError::MarketDataFailed)
            .await?;
        Ok(clock.is_open)
    }
}
