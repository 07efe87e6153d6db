//! `outfit-client`: network layer for the outfit-analysis backend.
//!
//! # Architecture
//!
//! ```text
//! Outfit (façade)
//!     │
//!     ├── services::{Auth, Analyses, Products, Recommendations, SavedLooks, Social}
//!     │       endpoint paths, cache keys, staleness windows, cache effects
//!     ▼
//! QueryClient     ← cached reads (staleness window, retry) and writes
//!     │              (invalidate / remove / seed on success)
//!     ▼
//! ApiClient       ← JSON over reqwest; bearer injection, 10s timeout,
//!     │              401 → Session::clear + Navigator("/login")
//!     ├── upload()   multipart `file`, streamed with progress + cancel
//!     ▼
//! Session         ← token + identity, shared by every layer
//!
//! RealtimeChannel ← WebSocket, JSON both ways, linear-backoff reconnect
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use outfit_client::Outfit;
//! use outfit_core::{config::Config, session::{FileTokenStore, NoopNavigator, Session}};
//!
//! let config = Config::resolve(None)?;
//! let session = Session::load(FileTokenStore::new(&config.state_dir()?));
//! let outfit = Outfit::new(config, session, std::sync::Arc::new(NoopNavigator));
//!
//! if let Some(me) = outfit.auth().current_user().await? {
//!     println!("signed in as {}", me.email);
//! }
//! let looks = outfit.saved_looks().dashboard().await?;
//! ```

pub mod cache;
pub mod error;
pub mod http;
pub mod query;
pub mod realtime;
pub mod services;
pub mod upload;

pub use error::ApiError;
pub use http::ApiClient;
pub use query::{CacheEffect, QueryClient, QueryOptions};
pub use realtime::{ChannelState, RealtimeChannel, ReconnectPolicy};
pub use services::{Outfit, SocialProvider};
pub use upload::{ProgressFn, UploadFile};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ApiError>;
