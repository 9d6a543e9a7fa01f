pub mod price;
pub mod quantity;
pub mod rolling_window;
pub mod sentiment;
