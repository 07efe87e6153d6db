use std::time::Duration;

use outfit_core::keys;
use outfit_core::user::{
    AuthResponse, EmailVerification, PasswordResetConfirm, PasswordResetRequest, SignInInput,
    SignUpInput, User,
};
use serde_json::Value;
use tracing::{info, warn};

use super::Outfit;
use crate::query::{CacheEffect, QueryOptions};
use crate::Result;

const USER_STALE: Duration = Duration::from_secs(10 * 60);

/// Sign-in, sign-up, sign-out and account recovery.
pub struct Auth<'a> {
    outfit: &'a Outfit,
}

impl<'a> Auth<'a> {
    pub(crate) fn new(outfit: &'a Outfit) -> Self {
        Auth { outfit }
    }

    /// The signed-in user, or `None` without a token. Never retried.
    pub async fn current_user(&self) -> Result<Option<User>> {
        let api = self.outfit.api();
        let session = self.outfit.session();
        let opts = QueryOptions::new(keys::auth::user()).stale_time(USER_STALE);
        let user = self
            .outfit
            .queries()
            .query_if(session.has_token(), opts, || api.get::<User>("/auth/me"))
            .await?;
        if let Some(u) = &user {
            session.set_identity(u.clone());
        }
        Ok(user)
    }

    pub async fn sign_in(&self, input: &SignInInput) -> Result<AuthResponse> {
        let resp = self
            .outfit
            .queries()
            .mutate(
                self.outfit.api().post::<AuthResponse, _>("/auth/signin", input),
                |resp| {
                    vec![CacheEffect::seed(
                        keys::auth::user(),
                        &resp.user,
                        USER_STALE,
                    )]
                },
            )
            .await?;
        self.store_token(&resp)?;
        self.outfit.session().set_identity(resp.user.clone());
        info!(user = %resp.user.email, "signed in");
        Ok(resp)
    }

    /// Create an account. The returned token is stored; the identity is
    /// fetched lazily by the next [`current_user`](Self::current_user).
    pub async fn sign_up(&self, input: &SignUpInput) -> Result<AuthResponse> {
        let resp: AuthResponse = self.outfit.api().post("/auth/signup", input).await?;
        self.store_token(&resp)?;
        info!(user = %resp.user.email, "account created");
        Ok(resp)
    }

    /// Tell the backend, then drop every cached response and the token
    /// whatever the backend said. The backend's result is returned last.
    /// Reads still in flight finish, but their results are not cached.
    pub async fn sign_out(&self) -> Result<()> {
        let result = self.outfit.api().post_empty::<Value>("/auth/signout").await;
        self.outfit.queries().clear();
        self.outfit.session().clear()?;
        match &result {
            Ok(_) => info!("signed out"),
            Err(e) => warn!(error = %e, "sign-out request failed; local session cleared"),
        }
        result.map(|_| ())
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<()> {
        let body = PasswordResetRequest {
            email: email.to_string(),
        };
        self.outfit
            .api()
            .post::<Value, _>("/auth/password-reset-request", &body)
            .await
            .map(|_| ())
    }

    pub async fn confirm_password_reset(&self, input: &PasswordResetConfirm) -> Result<()> {
        self.outfit
            .api()
            .post::<Value, _>("/auth/password-reset-confirm", input)
            .await
            .map(|_| ())
    }

    pub async fn verify_email(&self, token: &str) -> Result<()> {
        let body = EmailVerification {
            token: token.to_string(),
        };
        self.outfit
            .api()
            .post::<Value, _>("/auth/verify-email", &body)
            .await?;
        self.outfit.queries().invalidate(&keys::auth::user());
        Ok(())
    }

    pub async fn resend_verification(&self) -> Result<()> {
        self.outfit
            .api()
            .post_empty::<Value>("/auth/resend-verification")
            .await
            .map(|_| ())
    }

    fn store_token(&self, resp: &AuthResponse) -> Result<()> {
        if !resp.token.is_empty() {
            self.outfit.session().set_token(&resp.token)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::outfit;
    use mockito::Matcher;
    use serde_json::json;

    const ME: &str = r#"{"id":"u1","email":"a@b.co","fullName":"Ada","onboardingCompleted":true}"#;

    #[tokio::test]
    async fn current_user_is_disabled_without_token() {
        let mut server = mockito::Server::new_async().await;
        let m = server.mock("GET", "/api/auth/me").expect(0).create_async().await;
        let (o, _) = outfit(&server, None);
        assert!(o.auth().current_user().await.unwrap().is_none());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn current_user_is_cached_and_sets_identity() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/auth/me")
            .match_header("authorization", "Bearer abc123")
            .with_status(200)
            .with_body(ME)
            .expect(1)
            .create_async()
            .await;
        let (o, _) = outfit(&server, Some("abc123"));

        let first = o.auth().current_user().await.unwrap().unwrap();
        let second = o.auth().current_user().await.unwrap().unwrap();
        assert_eq!(first, second);
        assert!(o.session().is_authenticated());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn current_user_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("GET", "/api/auth/me")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let (o, _) = outfit(&server, Some("t"));
        assert!(o.auth().current_user().await.is_err());
        m.assert_async().await;
    }

    #[tokio::test]
    async fn sign_in_stores_token_and_seeds_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/auth/signin")
            .match_body(Matcher::PartialJson(json!({"email": "a@b.co"})))
            .with_status(200)
            .with_body(format!(r#"{{"user":{ME},"token":"fresh"}}"#))
            .create_async()
            .await;
        let me = server
            .mock("GET", "/api/auth/me")
            .expect(0)
            .create_async()
            .await;
        let (o, _) = outfit(&server, None);

        let input = SignInInput {
            email: "a@b.co".into(),
            password: "pw".into(),
            remember_me: false,
        };
        o.auth().sign_in(&input).await.unwrap();
        assert_eq!(o.session().token().as_deref(), Some("fresh"));

        // seeded: no request for the current user
        let user = o.auth().current_user().await.unwrap().unwrap();
        assert_eq!(user.full_name, "Ada");
        me.assert_async().await;
    }

    #[tokio::test]
    async fn failed_sign_in_keeps_session_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/auth/signin")
            .with_status(400)
            .with_body(r#"{"message":"Invalid credentials"}"#)
            .create_async()
            .await;
        let (o, _) = outfit(&server, None);
        let input = SignInInput {
            email: "a@b.co".into(),
            password: "nope".into(),
            remember_me: false,
        };
        let err = o.auth().sign_in(&input).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid credentials");
        assert!(!o.session().has_token());
        assert!(o.queries().cache().is_empty());
    }

    #[tokio::test]
    async fn sign_out_clears_everything_even_when_server_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/auth/signout")
            .with_status(500)
            .create_async()
            .await;
        let (o, _) = outfit(&server, Some("t"));
        o.queries()
            .set_query_data(keys::analyses::detail("a1"), &json!({}), USER_STALE);

        assert!(o.auth().sign_out().await.is_err());
        assert!(!o.session().has_token());
        assert!(o.queries().cache().is_empty());
        // auth-gated read is now disabled
        assert!(o.auth().current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn password_reset_request_posts_email() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/api/auth/password-reset-request")
            .match_body(Matcher::Json(json!({"email": "a@b.co"})))
            .with_status(200)
            .with_body(r#"{"message":"sent"}"#)
            .create_async()
            .await;
        let (o, _) = outfit(&server, None);
        o.auth().request_password_reset("a@b.co").await.unwrap();
        m.assert_async().await;
    }
}
