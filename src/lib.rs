pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod notify;
pub mod realtime;
pub mod session;

#[cfg(test)]
pub mod testing;

pub use client::{ApiClient, RequestDescriptor};
pub use config::ClientConfig;
pub use error::ApiError;
