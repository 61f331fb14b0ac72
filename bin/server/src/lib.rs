//! Flowdeck server: REST API, Postgres persistence, and the in-process
//! execution driver.

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod routes;
pub mod runner;
pub mod state;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;
