//! OAuth sign-in with Google, Apple and Facebook.
//!
//! The browser leg (consent screen, redirect back to
//! `<redirect_base>/auth/callback/<provider>`) happens outside this crate.
//! Here we build the authorization URL, recognise the callback and trade
//! its code for an access token at the backend.

use std::fmt;
use std::str::FromStr;

use outfit_core::config::SocialConfig;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::Outfit;
use crate::error::ApiError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Apple,
    Facebook,
}

impl SocialProvider {
    pub const ALL: [SocialProvider; 3] = [
        SocialProvider::Google,
        SocialProvider::Apple,
        SocialProvider::Facebook,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SocialProvider::Google => "google",
            SocialProvider::Apple => "apple",
            SocialProvider::Facebook => "facebook",
        }
    }

    fn authorize_endpoint(self) -> &'static str {
        match self {
            SocialProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            SocialProvider::Apple => "https://appleid.apple.com/auth/authorize",
            SocialProvider::Facebook => "https://www.facebook.com/v18.0/dialog/oauth",
        }
    }

    /// Provider-specific parameters besides client id, redirect and
    /// response type.
    fn extra_params(self) -> &'static [(&'static str, &'static str)] {
        match self {
            SocialProvider::Google => &[
                ("scope", "openid email profile"),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
            SocialProvider::Apple => &[("scope", "name email"), ("response_mode", "form_post")],
            SocialProvider::Facebook => &[
                ("scope", "email,public_profile"),
                ("auth_type", "rerequest"),
            ],
        }
    }

    fn client_id(self, cfg: &SocialConfig) -> &str {
        match self {
            SocialProvider::Google => &cfg.google_client_id,
            SocialProvider::Apple => &cfg.apple_client_id,
            SocialProvider::Facebook => &cfg.facebook_app_id,
        }
    }
}

impl fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SocialProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "google" => Ok(SocialProvider::Google),
            "apple" => Ok(SocialProvider::Apple),
            "facebook" => Ok(SocialProvider::Facebook),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

/// Tokens returned by the backend after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialTokens {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CallbackRequest<'a> {
    provider: SocialProvider,
    code: &'a str,
    redirect_uri: String,
}

/// A recognised provider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialCallback {
    pub provider: SocialProvider,
    pub code: String,
}

/// Recognise `<origin>/auth/callback/<provider>?code=…` (or with the code in
/// the fragment). Anything else yields `None`.
pub fn parse_callback(url: &str) -> Option<SocialCallback> {
    let url = Url::parse(url).ok()?;
    let mut segments = url.path_segments()?;
    if segments.next()? != "auth" || segments.next()? != "callback" {
        return None;
    }
    let provider: SocialProvider = segments.next()?.parse().ok()?;
    if segments.next().is_some_and(|s| !s.is_empty()) {
        return None;
    }

    let from_query = url
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned());
    let code = from_query.or_else(|| {
        let fragment = url.fragment()?;
        let as_query = Url::parse(&format!("http://fragment.invalid/?{fragment}")).ok()?;
        as_query
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
    })?;
    if code.is_empty() {
        return None;
    }
    Some(SocialCallback { provider, code })
}

pub struct Social<'a> {
    outfit: &'a Outfit,
}

impl<'a> Social<'a> {
    pub(crate) fn new(outfit: &'a Outfit) -> Self {
        Social { outfit }
    }

    fn config(&self) -> &SocialConfig {
        &self.outfit.config().social
    }

    /// True when a client id is configured for `provider`.
    pub fn is_available(&self, provider: SocialProvider) -> bool {
        !provider.client_id(self.config()).is_empty()
    }

    pub fn redirect_uri(&self, provider: SocialProvider) -> String {
        format!(
            "{}/auth/callback/{}",
            self.config().redirect_base.trim_end_matches('/'),
            provider
        )
    }

    /// The provider consent-screen URL to open in a browser.
    pub fn authorize_url(&self, provider: SocialProvider) -> Result<String> {
        if !self.is_available(provider) {
            return Err(ApiError::ProviderNotConfigured(provider.to_string()));
        }
        let redirect = self.redirect_uri(provider);
        let mut params = vec![
            ("client_id", provider.client_id(self.config())),
            ("redirect_uri", redirect.as_str()),
            ("response_type", "code"),
        ];
        params.extend_from_slice(provider.extra_params());
        let url = Url::parse_with_params(provider.authorize_endpoint(), &params)
            .map_err(|e| ApiError::network(e.to_string()))?;
        Ok(url.into())
    }

    /// Trade an authorization code for tokens and store the access token.
    pub async fn exchange(&self, provider: SocialProvider, code: &str) -> Result<SocialTokens> {
        let body = CallbackRequest {
            provider,
            code,
            redirect_uri: self.redirect_uri(provider),
        };
        let tokens: SocialTokens = self
            .outfit
            .api()
            .post("/auth/social/callback", &body)
            .await?;
        self.outfit.session().set_token(&tokens.access_token)?;
        self.outfit.queries().invalidate(&outfit_core::keys::auth::user());
        info!(%provider, "signed in with social provider");
        Ok(tokens)
    }
}
