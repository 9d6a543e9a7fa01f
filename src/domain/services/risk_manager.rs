//! Risk limits applied to candidate position sizes
//!
//! The risk manager can only shrink a requested notional. It caps:
//! - the candidate's own volatility risk (`max_position_risk` of the portfolio)
//! - the portfolio's total volatility risk (`max_portfolio_risk` of the portfolio)
//! - exposure to symbols whose returns move with positions already held
//!   (`max_correlation`)

use crate::domain::entities::account::AccountState;
use crate::domain::errors::ConfigError;
use tracing::{debug, info};

/// Static risk limits, read-only after construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskConfig {
    pub max_portfolio_risk: f64,
    pub max_position_risk: f64,
    pub max_correlation: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_portfolio_risk: 0.02,
            max_position_risk: 0.01,
            max_correlation: 0.7,
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("max_portfolio_risk", self.max_portfolio_risk),
            ("max_position_risk", self.max_position_risk),
            ("max_correlation", self.max_correlation),
        ];
        for (name, value) in fractions {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be in (0, 1], got {}", value),
                });
            }
        }
        if self.max_position_risk > self.max_portfolio_risk {
            return Err(ConfigError::InvalidParameter {
                name: "max_position_risk",
                reason: "cannot exceed max_portfolio_risk".to_string(),
            });
        }
        Ok(())
    }
}

/// A position already held, as seen by the risk checks
#[derive(Debug, Clone, Copy)]
pub struct Exposure<'a> {
    pub symbol: &'a str,
    pub market_value: f64,
    /// Recent prices, oldest first
    pub prices: &'a [f64],
}

/// Simple returns between consecutive positive prices
pub fn returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1].is_finite())
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

/// Root-mean-square of per-sample returns; zero when fewer than two prices
pub fn volatility(prices: &[f64]) -> f64 {
    let returns = returns(prices);
    if returns.is_empty() {
        return 0.0;
    }
    let mean_square = returns.iter().map(|r| r * r).sum::<f64>() / returns.len() as f64;
    mean_square.sqrt()
}

/// Pearson correlation of the most recent overlapping returns of two series
pub fn correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    let ra = returns(a);
    let rb = returns(b);
    let n = ra.len().min(rb.len());
    if n < 2 {
        return None;
    }
    let ra = &ra[ra.len() - n..];
    let rb = &rb[rb.len() - n..];

    let mean_a = ra.iter().sum::<f64>() / n as f64;
    let mean_b = rb.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in ra.iter().zip(rb.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a <= f64::EPSILON || var_b <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
    session_portfolio_value: Option<f64>,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            session_portfolio_value: None,
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Validate limits before trading starts
    pub fn initialize(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        info!(
            "Risk manager initialized: portfolio risk {:.3}, position risk {:.3}, max correlation {:.2}",
            self.config.max_portfolio_risk, self.config.max_position_risk, self.config.max_correlation
        );
        Ok(())
    }

    /// Record the account value at the start of a session
    pub fn update_market_conditions(&mut self, account: &AccountState) {
        self.session_portfolio_value = Some(account.portfolio_value);
        info!(
            "Risk baseline updated: portfolio value ${:.2}",
            account.portfolio_value
        );
    }

    pub fn session_portfolio_value(&self) -> Option<f64> {
        self.session_portfolio_value
    }

    /// Intraday losses tighten the limits; gains never loosen them
    fn reference_value(&self, portfolio_value: f64) -> f64 {
        match self.session_portfolio_value {
            Some(baseline) if baseline > 0.0 => baseline.min(portfolio_value),
            _ => portfolio_value,
        }
    }

    /// Shrink a candidate notional to fit the risk limits.
    ///
    /// The result is always within `[0, desired]`.
    pub fn adjust_position_size(
        &self,
        symbol: &str,
        desired: f64,
        prices: &[f64],
        exposures: &[Exposure<'_>],
        portfolio_value: f64,
    ) -> f64 {
        if !desired.is_finite() || desired <= 0.0 {
            return 0.0;
        }
        let reference = self.reference_value(portfolio_value);
        if reference <= 0.0 {
            return 0.0;
        }

        let others: Vec<&Exposure<'_>> = exposures.iter().filter(|e| e.symbol != symbol).collect();
        let mut allowed = desired;

        let candidate_vol = volatility(prices);
        if candidate_vol > 0.0 {
            let position_budget = reference * self.config.max_position_risk;
            allowed = allowed.min(position_budget / candidate_vol);

            let held_risk: f64 = others
                .iter()
                .map(|e| e.market_value.abs() * volatility(e.prices))
                .sum();
            let remaining = (reference * self.config.max_portfolio_risk - held_risk).max(0.0);
            allowed = allowed.min(remaining / candidate_vol);
        }

        let max_rho = others
            .iter()
            .filter_map(|e| correlation(prices, e.prices))
            .fold(None, |acc: Option<f64>, rho| Some(acc.map_or(rho, |a| a.max(rho))));
        if let Some(rho) = max_rho {
            if rho > self.config.max_correlation {
                allowed *= self.config.max_correlation / rho;
            }
        }

        let adjusted = allowed.clamp(0.0, desired);
        if adjusted < desired {
            debug!(
                "Risk limits reduced {} from ${:.2} to ${:.2}",
                symbol, desired, adjusted
            );
        }
        adjusted
    }
}
