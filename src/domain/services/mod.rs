pub mod execution_driver;
pub mod position_sizer;
pub mod risk_manager;
pub mod sentiment_aggregator;
pub mod signal_generator;
