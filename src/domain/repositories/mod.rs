pub mod brokerage_gateway;
pub mod clock;
pub mod sentiment_oracle;
