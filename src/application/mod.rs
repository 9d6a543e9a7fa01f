pub mod sentiment_strategy;
