use anyhow::Context as _;
use outfit_client::Outfit;
use outfit_core::config::Config;
use outfit_core::paths;
use outfit_core::session::{FileTokenStore, Navigator, Session, LOGIN_ROUTE};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Flag values that win over file and environment configuration.
#[derive(Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
}

/// Resolved configuration plus where it came from.
pub struct Context {
    pub config: Config,
    /// File the configuration was read from, if any.
    pub source: Option<PathBuf>,
}

impl Context {
    pub fn resolve(explicit: Option<&Path>, overrides: Overrides) -> anyhow::Result<Self> {
        let source = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => paths::default_config_path().filter(|p| p.exists()),
        };
        let mut config = Config::resolve(source.as_deref()).with_context(|| match &source {
            Some(p) => format!("failed to load config from {}", p.display()),
            None => "failed to load config".to_string(),
        })?;
        if let Some(url) = overrides.api_url {
            config.api_url = url;
        }
        if let Some(url) = overrides.ws_url {
            config.ws_url = url;
        }
        Ok(Context { config, source })
    }

    pub fn state_dir(&self) -> anyhow::Result<PathBuf> {
        self.config
            .state_dir()
            .context("cannot determine state directory")
    }

    /// Build the client with the persisted token restored.
    pub fn outfit(&self) -> anyhow::Result<Outfit> {
        let store = FileTokenStore::new(&self.state_dir()?);
        let session = Session::load(store);
        Ok(Outfit::new(
            self.config.clone(),
            session,
            Arc::new(TerminalNavigator),
        ))
    }
}

/// There are no views to switch to in a terminal; a forced return to the
/// login view becomes a hint on stderr.
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, route: &str) {
        if route == LOGIN_ROUTE {
            eprintln!("session expired; run `outfit auth login` to sign in again");
        } else {
            tracing::debug!(route, "navigation requested");
        }
    }
}
