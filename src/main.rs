use sentiment_trader::application::sentiment_strategy::{EmergencyReason, SentimentStrategy};
use sentiment_trader::config::{BrokerConfig, OracleConfig, StrategyConfig};
use sentiment_trader::infrastructure::alpaca_gateway::AlpacaGateway;
use sentiment_trader::infrastructure::sentiment_client::HttpSentimentOracle;
use sentiment_trader::task_runner::{run_with_circuit_breaker, CircuitBreakerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the market clock is polled while the market is closed
const MARKET_CLOCK_POLL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine, the environment may already be set
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentiment_trader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = StrategyConfig::from_env();
    let broker_config = BrokerConfig::from_env()?;
    let oracle_config = OracleConfig::from_env();
    info!(
        "Sentiment strategy starting: symbols [{}], threshold {}, iteration every {}s",
        config.symbols.join(", "),
        config.sentiment_threshold,
        config.iteration_interval_seconds
    );
    info!("Sentiment oracle at {}", oracle_config.url);

    let gateway = Arc::new(AlpacaGateway::new(broker_config)?);
    let oracle = Arc::new(HttpSentimentOracle::new(&oracle_config)?);
    let interval = config.iteration_interval();

    let mut strategy = SentimentStrategy::new(config, gateway, oracle);
    if let Err(e) = strategy.on_startup().await {
        error!("Startup failed: {}", e);
        return Err(e.into());
    }
    let strategy = Arc::new(Mutex::new(strategy));

    let runner_strategy = strategy.clone();
    let runner = run_with_circuit_breaker(
        "sentiment_iteration",
        CircuitBreakerConfig::default(),
        move || {
            let strategy = runner_strategy.clone();
            async move {
                let mut strategy = strategy.lock().await;
                if !strategy
                    .sync_market_session()
                    .await
                    .map_err(|e| e.to_string())?
                {
                    debug!("Market closed, next check in {:?}", MARKET_CLOCK_POLL);
                    return Ok(MARKET_CLOCK_POLL);
                }

                let summary = strategy.on_iteration().await.map_err(|e| e.to_string())?;
                if summary.needs_intervention() {
                    return Err(format!(
                        "all {} symbols failed this iteration",
                        summary.outcomes.len()
                    ));
                }
                if summary.all_failed() {
                    warn!("Every symbol failed this iteration, retrying next interval");
                }
                Ok(interval)
            }
        },
    );

    info!("Strategy running. Press Ctrl+C to stop and liquidate.");
    let reason = tokio::select! {
        result = runner => match result {
            Err(failure) => {
                error!("{}", failure);
                EmergencyReason::Crash(failure.to_string())
            }
            Ok(()) => EmergencyReason::AbruptClose,
        },
        _ = shutdown_signal() => EmergencyReason::AbruptClose,
    };

    let summary = strategy.lock().await.on_emergency_stop(reason).await;
    if !summary.failed.is_empty() {
        warn!(
            "{} positions could not be liquidated: {}",
            summary.failed.len(),
            summary
                .failed
                .iter()
                .map(|(symbol, _)| symbol.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C signal"),
            Err(e) => {
                // Liquidation must only follow a real signal
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
