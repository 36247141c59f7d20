pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;

/// In-process harness used by the integration tests
#[doc(hidden)]
pub mod testing;
