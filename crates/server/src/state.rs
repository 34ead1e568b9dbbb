//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::services::{ChatService, OrderService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    orders: OrderService,
    chat: ChatService,
}

impl AppState {
    /// Assemble the state from its parts.
    #[must_use]
    pub fn new(config: ServerConfig, orders: OrderService, chat: ChatService) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                orders,
                chat,
            }),
        }
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// The order lifecycle engine.
    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    /// The chat room engine.
    #[must_use]
    pub fn chat(&self) -> &ChatService {
        &self.inner.chat
    }
}
