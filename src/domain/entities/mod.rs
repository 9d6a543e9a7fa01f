pub mod account;
pub mod news;
pub mod order;
pub mod position;
pub mod signal;
pub mod strategy_state;
