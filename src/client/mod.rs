pub mod engine;
pub mod ui;
pub mod websocket_client;
