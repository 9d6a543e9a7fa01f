//! Lifecycle controller for the sentiment strategy
//!
//! Owns the per-symbol state and drives one pass over the configured symbols per
//! iteration: sample the price, refresh sentiment, decide, execute. A failure on
//! one symbol is logged and never stops the others.

use crate::config::StrategyConfig;
use crate::domain::entities::order::OrderSide;
use crate::domain::entities::position::{find_open, PositionSnapshot};
use crate::domain::entities::strategy_state::StrategyState;
use crate::domain::errors::{DeferReason, Outcome, StrategyError};
use crate::domain::repositories::brokerage_gateway::BrokerageGateway;
use crate::domain::repositories::clock::{Clock, SystemClock};
use crate::domain::repositories::sentiment_oracle::SentimentOracle;
use crate::domain::services::execution_driver::{ExecutionDriver, ExecutionReport};
use crate::domain::services::position_sizer::PositionSizer;
use crate::domain::services::risk_manager::{Exposure, RiskManager};
use crate::domain::services::sentiment_aggregator::SentimentAggregator;
use crate::domain::services::signal_generator::{SignalContext, SignalGenerator, Transition};
use crate::domain::value_objects::price::Price;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What happened to one symbol during an iteration
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolOutcome {
    Traded {
        order_id: String,
        side: OrderSide,
        quantity: f64,
    },
    Held,
    Skipped(DeferReason),
    Failed(StrategyError),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IterationSummary {
    /// In configured symbol order
    pub outcomes: Vec<(String, SymbolOutcome)>,
}

impl IterationSummary {
    pub fn outcome(&self, symbol: &str) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, outcome)| outcome)
    }

    pub fn traded(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Traded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SymbolOutcome::Failed(_)))
    }

    /// True when there was at least one symbol and every one of them failed
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == self.outcomes.len()
    }

    /// True when every symbol failed and some failure will not clear up on its own
    pub fn needs_intervention(&self) -> bool {
        self.all_failed()
            && self
                .outcomes
                .iter()
                .any(|(_, o)| matches!(o, SymbolOutcome::Failed(e) if !e.is_recoverable()))
    }

    fn count(&self, pred: impl Fn(&SymbolOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

/// Why positions are being liquidated
#[derive(Debug, Clone, PartialEq)]
pub enum EmergencyReason {
    /// The process is being stopped from outside
    AbruptClose,
    /// The strategy hit an unrecoverable error
    Crash(String),
}

impl fmt::Display for EmergencyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmergencyReason::AbruptClose => write!(f, "abrupt close"),
            EmergencyReason::Crash(reason) => write!(f, "crash: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiquidationSummary {
    /// (symbol, order id)
    pub submitted: Vec<(String, String)>,
    pub failed: Vec<(String, StrategyError)>,
}

pub struct SentimentStrategy {
    config: StrategyConfig,
    gateway: Arc<dyn BrokerageGateway>,
    clock: Arc<dyn Clock>,
    aggregator: SentimentAggregator,
    signals: SignalGenerator,
    executor: ExecutionDriver,
    risk: RiskManager,
    state: StrategyState,
    started: bool,
    market_open: Option<bool>,
}

impl SentimentStrategy {
    pub fn new(
        config: StrategyConfig,
        gateway: Arc<dyn BrokerageGateway>,
        oracle: Arc<dyn SentimentOracle>,
    ) -> Self {
        Self::with_clock(config, gateway, oracle, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: StrategyConfig,
        gateway: Arc<dyn BrokerageGateway>,
        oracle: Arc<dyn SentimentOracle>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let aggregator = SentimentAggregator::new(
            gateway.clone(),
            oracle,
            clock.clone(),
            config.news_lookback_days,
        );
        let signals = SignalGenerator::new(config.signal(), PositionSizer::new(config.sizing()));
        let executor = ExecutionDriver::new(gateway.clone());
        let risk = RiskManager::new(config.risk());
        let state = StrategyState::new(
            &config.symbols,
            config.sentiment_window,
            config.price_history_window,
        );

        Self {
            config,
            gateway,
            clock,
            aggregator,
            signals,
            executor,
            risk,
            state,
            started: false,
            market_open: None,
        }
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    pub fn risk_manager(&self) -> &RiskManager {
        &self.risk
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Validate configuration and broker connectivity. Any error here is fatal.
    pub async fn on_startup(&mut self) -> Result<(), StrategyError> {
        self.config.validate()?;
        self.risk.initialize()?;

        let account = self.gateway.get_account().await.map_err(|e| {
            error!("Broker connectivity check against {} failed: {}", self.gateway.name(), e);
            StrategyError::Connectivity(e)
        })?;

        info!(
            "Strategy started on {} for {} symbols ({}); portfolio value ${:.2}, buying power ${:.2}",
            self.gateway.name(),
            self.config.symbols.len(),
            self.config.symbols.join(", "),
            account.portfolio_value,
            account.buying_power
        );
        self.started = true;
        Ok(())
    }

    /// Prepare a new session: refresh the risk baseline and forget stale samples
    pub async fn on_market_open(&mut self) {
        match self.gateway.get_account().await {
            Ok(account) => self.risk.update_market_conditions(&account),
            Err(e) => warn!("Could not refresh risk market conditions: {}", e),
        }
        self.state.clear_histories();
        info!("Market open: sentiment and price histories cleared");
    }

    /// Poll the market clock and run `on_market_open` on a closed → open transition.
    /// Returns whether the market is open.
    pub async fn sync_market_session(&mut self) -> Result<bool, StrategyError> {
        let open = self
            .gateway
            .is_market_open()
            .await
            .map_err(StrategyError::Connectivity)?;

        if open && self.market_open != Some(true) {
            self.on_market_open().await;
        } else if !open && self.market_open == Some(true) {
            info!("Market closed");
        }
        self.market_open = Some(open);
        Ok(open)
    }

    /// One pass over every configured symbol, sequentially
    pub async fn on_iteration(&mut self) -> Result<IterationSummary, StrategyError> {
        if !self.started {
            error!("Iteration requested before startup");
            return Err(StrategyError::NotStarted);
        }

        let symbols = self.config.symbols.clone();
        let mut summary = IterationSummary::default();
        for symbol in symbols {
            let outcome = self.process_symbol(&symbol).await;
            match &outcome {
                SymbolOutcome::Failed(e) => {
                    error!("Error processing {} ({} severity): {}", symbol, e.severity(), e)
                }
                SymbolOutcome::Skipped(reason) => info!("Skipping {}: {}", symbol, reason),
                SymbolOutcome::Held => debug!("Holding {}", symbol),
                SymbolOutcome::Traded { .. } => {}
            }
            if !matches!(outcome, SymbolOutcome::Failed(_)) {
                self.state.mark_traded(&symbol, self.clock.now());
            }
            summary.outcomes.push((symbol, outcome));
        }

        info!(
            "Iteration complete: {} traded, {} failed, {} symbols",
            summary.traded(),
            summary.failed(),
            summary.outcomes.len()
        );
        Ok(summary)
    }

    async fn process_symbol(&mut self, symbol: &str) -> SymbolOutcome {
        let price = match self.gateway.get_last_price(symbol).await {
            Ok(Some(raw)) if raw > 0.0 => match Price::new(raw) {
                Ok(price) => price,
                Err(e) => return SymbolOutcome::Failed(e.into()),
            },
            // A zero quote is as good as no quote
            Ok(_) => {
                warn!("Could not get price for {}", symbol);
                return SymbolOutcome::Skipped(DeferReason::PriceUnavailable {
                    symbol: symbol.to_string(),
                });
            }
            Err(e) => return SymbolOutcome::Failed(StrategyError::gateway(symbol, "get_last_price", e)),
        };
        self.state.record_price(symbol, price.value());

        // No fresh verdict, no decision
        if let Err(e) = self.aggregator.refresh(&mut self.state, symbol).await {
            return SymbolOutcome::Failed(e);
        }
        let sentiment = self.aggregator.aggregate(&self.state, symbol);

        let positions = match self.gateway.get_positions().await {
            Ok(positions) => positions,
            Err(e) => return SymbolOutcome::Failed(StrategyError::gateway(symbol, "get_positions", e)),
        };
        let position = find_open(&positions, symbol);

        let signal = match self.signals.transition(&sentiment, position) {
            Transition::Hold => return SymbolOutcome::Held,
            Transition::Exit => match position {
                Some(held) => Outcome::Ready(self.signals.exit_signal(price, held)),
                None => return SymbolOutcome::Held,
            },
            Transition::Enter => {
                let account = match self.gateway.get_account().await {
                    Ok(account) => account,
                    Err(e) => {
                        return SymbolOutcome::Failed(StrategyError::gateway(symbol, "get_account", e))
                    }
                };
                let price_history = self.state.price_samples(symbol);
                let held: Vec<(&PositionSnapshot, Vec<f64>)> = positions
                    .iter()
                    .filter(|p| p.is_open() && p.symbol != symbol)
                    .map(|p| (p, self.state.price_samples(&p.symbol)))
                    .collect();
                let exposures: Vec<Exposure<'_>> = held
                    .iter()
                    .map(|(p, prices)| Exposure {
                        symbol: p.symbol.as_str(),
                        market_value: p.market_value,
                        prices: prices.as_slice(),
                    })
                    .collect();

                self.signals.generate(&SignalContext {
                    symbol,
                    sentiment,
                    price,
                    position,
                    account: &account,
                    price_history: &price_history,
                    exposures: &exposures,
                    risk_manager: &self.risk,
                })
            }
        };

        let signal = match signal {
            Outcome::Ready(signal) if signal.is_actionable() => signal,
            Outcome::Ready(_) => return SymbolOutcome::Held,
            Outcome::Deferred(reason) => return SymbolOutcome::Skipped(reason),
            Outcome::Failed(e) => return SymbolOutcome::Failed(e),
        };

        match self.executor.execute(symbol, &signal).await {
            Outcome::Ready(ExecutionReport::Submitted {
                order_id,
                side,
                quantity,
            }) => SymbolOutcome::Traded {
                order_id,
                side,
                quantity,
            },
            Outcome::Ready(ExecutionReport::NoAction) => SymbolOutcome::Held,
            Outcome::Deferred(reason) => SymbolOutcome::Skipped(reason),
            Outcome::Failed(e) => SymbolOutcome::Failed(e),
        }
    }

    /// Market-sell every open position in a configured symbol. Never fails as a whole.
    pub async fn on_emergency_stop(&mut self, reason: EmergencyReason) -> LiquidationSummary {
        warn!("Emergency stop ({}): liquidating all positions", reason);
        let mut summary = LiquidationSummary::default();

        let listed = match self.gateway.get_positions().await {
            Ok(positions) => Some(positions),
            Err(e) => {
                error!("Could not list positions, checking symbols one by one: {}", e);
                None
            }
        };

        for symbol in &self.config.symbols {
            let position = match &listed {
                Some(positions) => find_open(positions, symbol).cloned(),
                None => match self.gateway.get_position(symbol).await {
                    Ok(position) => position.filter(|p| p.is_open()),
                    Err(e) => {
                        error!("Error checking position for {}: {}", symbol, e);
                        summary
                            .failed
                            .push((symbol.clone(), StrategyError::gateway(symbol, "get_position", e)));
                        continue;
                    }
                },
            };
            let Some(position) = position else {
                continue;
            };

            match self.executor.liquidate(&position).await {
                Ok(order_id) => {
                    info!(
                        "Emergency sell order placed for {}: {} shares (order {})",
                        symbol, position.quantity, order_id
                    );
                    summary.submitted.push((symbol.clone(), order_id));
                }
                Err(e) => {
                    error!("Error in emergency stop for {}: {}", symbol, e);
                    summary.failed.push((symbol.clone(), e));
                }
            }
        }

        info!(
            "Emergency stop complete: {} orders submitted, {} failures",
            summary.submitted.len(),
            summary.failed.len()
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::account::AccountState;
    use crate::domain::entities::news::NewsItem;
    use crate::domain::entities::order::Order;
    use crate::domain::errors::{ConfigError, GatewayError, OracleError};
    use crate::domain::repositories::brokerage_gateway::GatewayResult;
    use crate::domain::value_objects::sentiment::{SentimentLabel, SentimentObservation};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use tokio::sync::Mutex;

    struct MockGateway {
        price: Option<f64>,
        account_fails: bool,
        news_fails: bool,
        market_open: Mutex<bool>,
        positions: Mutex<Vec<PositionSnapshot>>,
        orders: Mutex<Vec<Order>>,
    }

    impl MockGateway {
        fn new() -> Self {
            Self {
                price: Some(50.0),
                account_fails: false,
                news_fails: false,
                market_open: Mutex::new(false),
                positions: Mutex::new(vec![]),
                orders: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl BrokerageGateway for MockGateway {
        fn name(&self) -> &str {
            "mock"
        }

        async fn get_last_price(&self, _symbol: &str) -> GatewayResult<Option<f64>> {
            Ok(self.price)
        }

        async fn get_account(&self) -> GatewayResult<AccountState> {
            if self.account_fails {
                return Err(GatewayError::AuthenticationError("bad key".to_string()));
            }
            Ok(AccountState::new(100_000.0, 100_000.0, 100_000.0))
        }

        async fn get_positions(&self) -> GatewayResult<Vec<PositionSnapshot>> {
            Ok(self.positions.lock().await.clone())
        }

        async fn get_news(
            &self,
            _symbol: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> GatewayResult<Vec<NewsItem>> {
            if self.news_fails {
                return Err(GatewayError::NewsQueryFailed("503".to_string()));
            }
            Ok(vec![NewsItem::new("Quarterly results announced")])
        }

        async fn submit_order(&self, order: &Order) -> GatewayResult<String> {
            let mut orders = self.orders.lock().await;
            orders.push(order.clone());
            Ok(format!("order-{}", orders.len()))
        }

        async fn is_market_open(&self) -> GatewayResult<bool> {
            Ok(*self.market_open.lock().await)
        }
    }

    struct FixedOracle(SentimentObservation);

    #[async_trait]
    impl SentimentOracle for FixedOracle {
        async fn score(&self, _headlines: &[String]) -> Result<SentimentObservation, OracleError> {
            Ok(self.0)
        }
    }

    struct UnreachableOracle;

    #[async_trait]
    impl SentimentOracle for UnreachableOracle {
        async fn score(&self, _headlines: &[String]) -> Result<SentimentObservation, OracleError> {
            Err(OracleError::Unreachable("connection refused".to_string()))
        }
    }

    fn config(symbols: &[&str]) -> StrategyConfig {
        StrategyConfig {
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            ..StrategyConfig::default()
        }
    }

    fn strategy(gateway: Arc<MockGateway>, probability: f64, label: SentimentLabel) -> SentimentStrategy {
        let oracle = FixedOracle(SentimentObservation::new(probability, label).unwrap());
        SentimentStrategy::new(config(&["XYZ"]), gateway, Arc::new(oracle))
    }

    #[tokio::test]
    async fn test_startup_requires_symbols() {
        let oracle = FixedOracle(SentimentObservation::neutral());
        let mut strategy =
            SentimentStrategy::new(config(&[]), Arc::new(MockGateway::new()), Arc::new(oracle));

        let err = strategy.on_startup().await.unwrap_err();

        assert_eq!(err, StrategyError::Config(ConfigError::NoSymbols));
        assert!(!strategy.is_started());
    }

    #[tokio::test]
    async fn test_startup_fails_without_connectivity() {
        let mut gateway = MockGateway::new();
        gateway.account_fails = true;
        let mut strategy = strategy(Arc::new(gateway), 0.5, SentimentLabel::Neutral);

        let err = strategy.on_startup().await.unwrap_err();

        assert!(matches!(err, StrategyError::Connectivity(_)));
        assert!(!strategy.is_started());
    }

    #[tokio::test]
    async fn test_iteration_before_startup_is_rejected() {
        let mut strategy = strategy(Arc::new(MockGateway::new()), 0.5, SentimentLabel::Neutral);
        assert_eq!(strategy.on_iteration().await, Err(StrategyError::NotStarted));
    }

    #[tokio::test]
    async fn test_first_iteration_defers_buy_until_second_price_sample() {
        let gateway = Arc::new(MockGateway::new());
        let mut strategy = strategy(gateway.clone(), 0.9, SentimentLabel::Positive);
        strategy.on_startup().await.unwrap();

        // Aggregated 0.45 after one observation: below threshold
        let first = strategy.on_iteration().await.unwrap();
        assert_eq!(first.outcome("XYZ"), Some(&SymbolOutcome::Held));
        assert!(strategy.state().last_trade("XYZ").is_some());

        // (0.9 * 0.5 + 0.9 * 1.0) / 2 = 0.675 > 0.6 with two price samples
        let second = strategy.on_iteration().await.unwrap();
        assert!(matches!(
            second.outcome("XYZ"),
            Some(SymbolOutcome::Traded { side: OrderSide::Buy, .. })
        ));
        assert_eq!(gateway.orders.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_price_skips_symbol() {
        let mut gateway = MockGateway::new();
        gateway.price = None;
        let mut strategy = strategy(Arc::new(gateway), 0.9, SentimentLabel::Positive);
        strategy.on_startup().await.unwrap();

        let summary = strategy.on_iteration().await.unwrap();

        assert!(matches!(
            summary.outcome("XYZ"),
            Some(SymbolOutcome::Skipped(DeferReason::PriceUnavailable { .. }))
        ));
        assert!(strategy.state().price_samples("XYZ").is_empty());
    }

    #[tokio::test]
    async fn test_zero_price_skips_symbol() {
        let mut gateway = MockGateway::new();
        gateway.price = Some(0.0);
        let gateway = Arc::new(gateway);
        let mut strategy = strategy(gateway.clone(), 0.9, SentimentLabel::Positive);
        strategy.on_startup().await.unwrap();

        let summary = strategy.on_iteration().await.unwrap();

        assert!(matches!(
            summary.outcome("XYZ"),
            Some(SymbolOutcome::Skipped(DeferReason::PriceUnavailable { .. }))
        ));
        assert!(strategy.state().price_samples("XYZ").is_empty());
        assert!(gateway.orders.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_oracle_failure_abandons_symbol() {
        let gateway = Arc::new(MockGateway::new());
        let mut strategy =
            SentimentStrategy::new(config(&["XYZ"]), gateway.clone(), Arc::new(UnreachableOracle));
        strategy.on_startup().await.unwrap();

        let summary = strategy.on_iteration().await.unwrap();

        assert!(matches!(
            summary.outcome("XYZ"),
            Some(SymbolOutcome::Failed(StrategyError::Oracle { .. }))
        ));
        assert!(strategy.state().last_trade("XYZ").is_none());
        assert!(gateway.orders.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_news_failure_abandons_symbol() {
        let mut gateway = MockGateway::new();
        gateway.news_fails = true;
        let gateway = Arc::new(gateway);
        let mut strategy = strategy(gateway.clone(), 0.9, SentimentLabel::Positive);
        strategy.on_startup().await.unwrap();

        let summary = strategy.on_iteration().await.unwrap();

        assert!(matches!(
            summary.outcome("XYZ"),
            Some(SymbolOutcome::Failed(StrategyError::Gateway { operation: "get_news", .. }))
        ));
        assert!(gateway.orders.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_market_open_transition_clears_histories_once() {
        let gateway = Arc::new(MockGateway::new());
        let mut strategy = strategy(gateway.clone(), 0.3, SentimentLabel::Neutral);
        strategy.on_startup().await.unwrap();

        assert!(!strategy.sync_market_session().await.unwrap());
        strategy.on_iteration().await.unwrap();
        assert_eq!(strategy.state().price_samples("XYZ").len(), 1);

        *gateway.market_open.lock().await = true;
        assert!(strategy.sync_market_session().await.unwrap());
        assert!(strategy.state().price_samples("XYZ").is_empty());
        assert_eq!(strategy.risk_manager().session_portfolio_value(), Some(100_000.0));

        // Still open: no second purge
        strategy.on_iteration().await.unwrap();
        assert!(strategy.sync_market_session().await.unwrap());
        assert_eq!(strategy.state().price_samples("XYZ").len(), 1);
    }

    #[tokio::test]
    async fn test_emergency_stop_sells_only_held_symbols() {
        let gateway = Arc::new(MockGateway::new());
        *gateway.positions.lock().await = vec![
            PositionSnapshot::new("XYZ", 7.0, 350.0),
            PositionSnapshot::new("OTHER", 3.0, 90.0),
        ];
        let mut strategy = strategy(gateway.clone(), 0.5, SentimentLabel::Neutral);

        let summary = strategy
            .on_emergency_stop(EmergencyReason::Crash("breaker tripped".to_string()))
            .await;

        // OTHER is not a configured symbol
        assert_eq!(summary.submitted, vec![("XYZ".to_string(), "order-1".to_string())]);
        assert!(summary.failed.is_empty());
        let orders = gateway.orders.lock().await;
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].quantity.value(), 7.0);
    }

    #[test]
    fn test_iteration_summary_counts() {
        let summary = IterationSummary {
            outcomes: vec![
                ("A".to_string(), SymbolOutcome::Failed(StrategyError::NotStarted)),
                ("B".to_string(), SymbolOutcome::Held),
            ],
        };
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.traded(), 0);
        assert!(!summary.all_failed());
        assert!(IterationSummary::default().outcome("A").is_none());
    }

    #[test]
    fn test_only_unrecoverable_total_failure_needs_intervention() {
        let oracle_down = StrategyError::Oracle {
            symbol: "A".to_string(),
            source: OracleError::Unreachable("connection refused".to_string()),
        };
        let transient = IterationSummary {
            outcomes: vec![("A".to_string(), SymbolOutcome::Failed(oracle_down.clone()))],
        };
        assert!(transient.all_failed());
        assert!(!transient.needs_intervention());

        let fatal = IterationSummary {
            outcomes: vec![
                ("A".to_string(), SymbolOutcome::Failed(oracle_down)),
                ("B".to_string(), SymbolOutcome::Failed(StrategyError::NotStarted)),
            ],
        };
        assert!(fatal.needs_intervention());
    }
}
