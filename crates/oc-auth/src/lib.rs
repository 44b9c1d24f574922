//! Authenticated request pipeline for the orchid morphology database client
//!
//! Every backend call goes through [`ApiClient::send`], which
//!
//! 1. attaches the session's access credential as a bearer token (the refresh
//!    endpoint gets the refresh credential instead),
//! 2. on a 401, obtains a fresh access credential through the
//!    [`RefreshCoordinator`] so that concurrent failures share one refresh
//!    exchange,
//! 3. replays the failed request exactly once.
//!
//! The [`SessionStore`] owns the credentials, derives the user's identity from
//! the access credential's claims, and writes every change through to a
//! [`KeyValueStore`] so sessions survive restarts.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use oc_auth::{ApiClient, ApiRequest, ClientConfig, FileStore, LoginRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::from_base_url("http://127.0.0.1:5000")?;
//!     let store = FileStore::new(FileStore::default_storage_dir()?).await?;
//!     let client = ApiClient::connect(config, Arc::new(store)).await?;
//!
//!     if !client.session().is_authenticated() {
//!         client.login(&LoginRequest::new("alice", "secret")).await?;
//!     }
//!
//!     let species: serde_json::Value = client
//!         .get_json(ApiRequest::get("/api/data/species").query([("page", "1")]))
//!         .await?;
//!     println!("{}", species);
//!     Ok(())
//! }
//! ```
//!
//! # Session changes
//!
//! ```
//! use std::sync::Arc;
//! use oc_auth::{HttpAuthExchange, MemoryStore, SessionEvent, SessionStore, Transport, ClientConfig};
//!
//! # async fn example() -> oc_auth::Result<()> {
//! let transport = Transport::new(ClientConfig::default())?;
//! let session = SessionStore::new(
//!     Arc::new(HttpAuthExchange::new(transport)),
//!     Arc::new(MemoryStore::new()),
//! );
//! let mut events = session.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if event == SessionEvent::LoggedOut {
//!             println!("session ended, back to login");
//!         }
//!     }
//! });
//! # Ok(())
//! # }
//! # tokio_test::block_on(example()).unwrap();
//! ```

pub mod claims;
pub mod client;
pub mod config;
pub mod errors;
pub mod exchange;
pub mod file_store;
pub mod models;
pub mod refresh;
pub mod request;
pub mod session;
pub mod store;
pub mod transport;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use claims::{Claims, Role};
pub use client::ApiClient;
pub use config::{ClientConfig, Endpoints, HttpTimeouts};
pub use errors::{AuthError, Result};
pub use exchange::{AuthExchange, HttpAuthExchange};
pub use file_store::FileStore;
pub use models::{LoginRequest, TokenPair};
pub use refresh::RefreshCoordinator;
pub use request::{ApiRequest, ApiResponse};
pub use session::{Identity, Session, SessionEvent, SessionStore};
pub use store::{KeyValueStore, MemoryStore};
pub use transport::Transport;
