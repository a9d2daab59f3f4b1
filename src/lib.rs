// Public API for integration tests and potential library usage

pub mod api;
pub mod bridge;
pub mod broadcast;
pub mod config;
pub mod feed;
pub mod gate;
pub mod parser;
pub mod protocol;
pub mod question;
pub mod schema;
pub mod state;
pub mod telemetry;
pub mod text;
pub mod types;
pub mod ws;
