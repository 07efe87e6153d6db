//! Domain services over the HTTP client and the query layer.
//!
//! Each service is a thin borrow of [`Outfit`]; it owns the endpoint paths,
//! the cache keys, the staleness windows and the cache effects of its
//! domain.

pub mod analyses;
pub mod auth;
pub mod products;
pub mod recommendations;
pub mod saved_looks;
pub mod social;

use std::sync::Arc;

use outfit_core::config::Config;
use outfit_core::session::{Navigator, Session};

use crate::http::ApiClient;
use crate::query::QueryClient;
use crate::realtime::{RealtimeChannel, ReconnectPolicy};

pub use analyses::Analyses;
pub use auth::Auth;
pub use products::Products;
pub use recommendations::Recommendations;
pub use saved_looks::SavedLooks;
pub use social::{Social, SocialProvider};

/// Entry point: one HTTP client, one query cache, one session.
#[derive(Clone)]
pub struct Outfit {
    api: ApiClient,
    queries: QueryClient,
    config: Config,
}

impl Outfit {
    pub fn new(config: Config, session: Session, navigator: Arc<dyn Navigator>) -> Self {
        let api = ApiClient::from_config(&config, session).with_navigator(navigator);
        Outfit {
            api,
            queries: QueryClient::new(),
            config,
        }
    }

    /// Assemble from parts already built, e.g. with a shortened backoff.
    pub fn from_parts(config: Config, api: ApiClient, queries: QueryClient) -> Self {
        Outfit {
            api,
            queries,
            config,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    pub fn session(&self) -> &Session {
        self.api.session()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn auth(&self) -> Auth<'_> {
        Auth::new(self)
    }

    pub fn analyses(&self) -> Analyses<'_> {
        Analyses::new(self)
    }

    pub fn products(&self) -> Products<'_> {
        Products::new(self)
    }

    pub fn recommendations(&self) -> Recommendations<'_> {
        Recommendations::new(self)
    }

    pub fn saved_looks(&self) -> SavedLooks<'_> {
        SavedLooks::new(self)
    }

    pub fn social(&self) -> Social<'_> {
        Social::new(self)
    }

    /// A live channel for the configured socket URL. Not yet connected.
    pub fn realtime(&self) -> RealtimeChannel {
        RealtimeChannel::new(
            self.config.ws_url.clone(),
            ReconnectPolicy::from(&self.config.reconnect),
        )
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use outfit_core::session::RecordingNavigator;
    use std::time::Duration;

    /// An [`Outfit`] pointed at a mock server, with millisecond backoff.
    pub fn outfit(server: &mockito::Server, token: Option<&str>) -> (Outfit, Arc<RecordingNavigator>) {
        let session = Session::in_memory();
        if let Some(t) = token {
            session.set_token(t).unwrap();
        }
        let nav = Arc::new(RecordingNavigator::default());
        let config = Config {
            api_url: format!("{}/api", server.url()),
            ..Config::default()
        };
        let api = ApiClient::from_config(&config, session).with_navigator(nav.clone());
        let queries =
            QueryClient::new().with_backoff(Duration::from_millis(1), Duration::from_millis(5));
        (Outfit::from_parts(config, api, queries), nav)
    }
}
