pub mod alpaca_gateway;
pub mod sentiment_client;
