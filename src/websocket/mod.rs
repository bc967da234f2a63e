//! WebSocket module for the Binance diff stream

mod client;
mod stream;

pub use client::WebSocketClient;
pub use stream::BinanceStream;
