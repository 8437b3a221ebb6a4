//! Research assistant client library.
//!
//! Keeps one client-side view of a research session in sync with the
//! backend, whether updates arrive as server-sent events or as polled
//! snapshots.
//!
//! # Architecture
//!
//! Events flow from a transport to the store:
//! - `transport`: streaming (SSE) and polling adapters behind one trait
//! - `stream`: incremental SSE decoding into typed `ResearchEvent`s
//! - `session`: keeps at most one transport active and routes its events
//! - `store`: the reducer and the `ResearchStore` container
//! - `bus`: subscriptions and the change feed handed to UI consumers
//! - `api`: HTTP client for the research backend
//! - `core`: state, plan and snapshot types
//! - `config`: client settings from the environment

pub mod api;
pub mod bus;
pub mod config;
pub mod core;
pub mod session;
pub mod store;
pub mod stream;
pub mod transport;

use serde::Serialize;

pub use api::{ApiError, ResearchApi, UserConfirm};
pub use bus::Subscription;
pub use config::ClientConfig;
pub use crate::core::{ResearchState, ResearchStatus};
pub use session::{SessionController, SessionKey, TerminalNotice};
pub use store::{ResearchAction, ResearchStore};
pub use stream::ResearchEvent;

const DEFAULT_LOG_FILTER: &str = "research_client_lib=debug,info";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    Api(#[from] ApiError),
    #[error("config error: {0}")]
    Config(String),
    #[error("session error: {0}")]
    Session(String),
}

/// Errors cross into UI code as their message.
impl Serialize for ClientError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Install the default `tracing` subscriber. `RUST_LOG` overrides the
/// filter. Calling it again, or after another subscriber was set, is a no-op.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Build the HTTP client, store and controller from `config`.
pub fn connect(config: ClientConfig) -> Result<SessionController, ClientError> {
    let api = std::sync::Arc::new(ResearchApi::new(config)?);
    Ok(SessionController::new(ResearchStore::new(), api))
}
