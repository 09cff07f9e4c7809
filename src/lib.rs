//! GroceryStore library — in-memory grocery item tracking.
//!
//! This crate provides the components for running the GroceryStore HTTP
//! service: the concurrency-safe food record store, request handling,
//! Basic authentication, configuration, metrics and TLS termination.

use std::sync::Arc;

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod store;
pub mod tls;

use crate::auth::CredentialStore;
use crate::config::Config;
use crate::store::store::FoodStore;

/// Shared application state passed to all handlers via `axum::extract::State`.
pub struct AppState {
    /// Server configuration.
    pub config: Config,
    /// Food record store.
    pub store: Arc<dyn FoodStore>,
    /// Users accepted by the Basic auth gate.
    pub credentials: CredentialStore,
}

impl AppState {
    /// Build state around an explicitly constructed store. Credentials are
    /// taken from `config.auth`.
    pub fn new(config: Config, store: Arc<dyn FoodStore>) -> Self {
        let credentials = CredentialStore::from_config(&config.auth);
        Self {
            config,
            store,
            credentials,
        }
    }
}
