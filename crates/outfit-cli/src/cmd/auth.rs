use crate::cmd::read_secret;
use crate::output::{or_dash, print_json};
use anyhow::Context as _;
use clap::Subcommand;
use outfit_client::services::social::parse_callback;
use outfit_client::{Outfit, SocialProvider};
use outfit_core::user::{PasswordResetConfirm, SignInInput, SignUpInput, User};

#[derive(Subcommand)]
pub enum AuthSubcommand {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "OUTFIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Ask the backend for a long-lived session
        #[arg(long)]
        remember: bool,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        /// Password (prompted on stdin when omitted)
        #[arg(long, env = "OUTFIT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Accept the terms of service
        #[arg(long)]
        accept_terms: bool,
        /// Receive marketing email
        #[arg(long)]
        marketing: bool,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Email a password-reset link
    ResetRequest {
        #[arg(long)]
        email: String,
    },
    /// Set a new password with a reset token
    ResetConfirm {
        #[arg(long)]
        token: String,
        /// New password (prompted on stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },
    /// Confirm an email address with the emailed token
    Verify {
        #[arg(long)]
        token: String,
    },
    /// Send the verification email again
    ResendVerification,
    /// Print the consent-screen URL for a social provider
    SocialUrl {
        /// google, apple or facebook
        provider: SocialProvider,
    },
    /// Finish social sign-in with the authorization code
    SocialExchange {
        /// google, apple or facebook
        #[arg(long, required_unless_present = "callback")]
        provider: Option<SocialProvider>,
        #[arg(long, required_unless_present = "callback")]
        code: Option<String>,
        /// Full callback URL copied from the browser
        #[arg(long, conflicts_with_all = ["provider", "code"])]
        callback: Option<String>,
    },
    /// List social providers and whether each is configured
    Providers,
}

pub async fn run(outfit: &Outfit, subcmd: AuthSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        AuthSubcommand::Login {
            email,
            password,
            remember,
        } => login(outfit, email, password, remember, json).await,
        AuthSubcommand::Signup {
            email,
            name,
            password,
            accept_terms,
            marketing,
        } => signup(outfit, email, name, password, accept_terms, marketing, json).await,
        AuthSubcommand::Logout => logout(outfit).await,
        AuthSubcommand::Whoami => whoami(outfit, json).await,
        AuthSubcommand::ResetRequest { email } => {
            outfit
                .auth()
                .request_password_reset(&email)
                .await
                .context("password reset request failed")?;
            println!("If an account exists for {email}, a reset link is on its way.");
            Ok(())
        }
        AuthSubcommand::ResetConfirm { token, password } => {
            let new_password = match password {
                Some(p) => p,
                None => read_secret("New password")?,
            };
            let input = PasswordResetConfirm {
                token,
                confirm_password: new_password.clone(),
                new_password,
            };
            outfit
                .auth()
                .confirm_password_reset(&input)
                .await
                .context("password reset failed")?;
            println!("Password updated. Sign in with `outfit auth login`.");
            Ok(())
        }
        AuthSubcommand::Verify { token } => {
            outfit
                .auth()
                .verify_email(&token)
                .await
                .context("email verification failed")?;
            println!("Email verified.");
            Ok(())
        }
        AuthSubcommand::ResendVerification => {
            outfit
                .auth()
                .resend_verification()
                .await
                .context("failed to resend verification email")?;
            println!("Verification email sent.");
            Ok(())
        }
        AuthSubcommand::SocialUrl { provider } => {
            let url = outfit.social().authorize_url(provider)?;
            if json {
                print_json(&serde_json::json!({ "provider": provider, "url": url }))?;
            } else {
                println!("{url}");
            }
            Ok(())
        }
        AuthSubcommand::SocialExchange {
            provider,
            code,
            callback,
        } => social_exchange(outfit, provider, code, callback, json).await,
        AuthSubcommand::Providers => providers(outfit, json),
    }
}

// ---------------------------------------------------------------------------
// login / signup / logout
// ---------------------------------------------------------------------------

async fn login(
    outfit: &Outfit,
    email: String,
    password: Option<String>,
    remember: bool,
    json: bool,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => read_secret("Password")?,
    };
    let input = SignInInput {
        email,
        password,
        remember_me: remember,
    };
    let resp = outfit.auth().sign_in(&input).await.context("sign-in failed")?;

    if json {
        print_json(&resp.user)?;
    } else {
        println!("Signed in as {}.", resp.user.email);
        if outfit.session().requires_onboarding() {
            println!("Onboarding is not finished yet; complete it in the app.");
        }
    }
    Ok(())
}

async fn signup(
    outfit: &Outfit,
    email: String,
    full_name: String,
    password: Option<String>,
    accept_terms: bool,
    marketing_opt_in: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !accept_terms {
        anyhow::bail!("creating an account requires --accept-terms");
    }
    let password = match password {
        Some(p) => p,
        None => read_secret("Password")?,
    };
    let input = SignUpInput {
        email,
        confirm_password: password.clone(),
        password,
        full_name,
        accept_terms,
        marketing_opt_in,
    };
    let resp = outfit.auth().sign_up(&input).await.context("sign-up failed")?;

    if json {
        print_json(&resp.user)?;
    } else {
        println!("Account created for {}.", resp.user.email);
        if !resp.user.is_email_verified {
            println!("Check your inbox to verify your email address.");
        }
    }
    Ok(())
}

async fn logout(outfit: &Outfit) -> anyhow::Result<()> {
    if !outfit.session().has_token() {
        println!("Not signed in.");
        return Ok(());
    }
    // The local token is gone even when the backend call fails.
    match outfit.auth().sign_out().await {
        Ok(()) => println!("Signed out."),
        Err(e) => {
            tracing::warn!(error = %e, "backend sign-out failed");
            println!("Signed out locally.");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// whoami
// ---------------------------------------------------------------------------

async fn whoami(outfit: &Outfit, json: bool) -> anyhow::Result<()> {
    let user = outfit
        .auth()
        .current_user()
        .await
        .context("failed to fetch current user")?;

    let Some(user) = user else {
        if json {
            print_json(&serde_json::Value::Null)?;
        } else {
            println!("Not signed in.");
        }
        return Ok(());
    };

    if json {
        print_json(&user)?;
    } else {
        print_user(&user);
    }
    Ok(())
}

fn print_user(user: &User) {
    println!("id:          {}", user.id);
    println!("email:       {}", user.email);
    println!("name:        {}", or_dash(Some(&user.full_name).filter(|n| !n.is_empty())));
    println!("verified:    {}", user.is_email_verified);
    println!("onboarded:   {}", user.onboarding_completed);
    println!(
        "plan:        {}",
        or_dash(user.subscription.as_ref().map(|s| &s.plan))
    );
    if !user.preferences.style_tags.is_empty() {
        println!("styles:      {}", user.preferences.style_tags.join(", "));
    }
}

// ---------------------------------------------------------------------------
// social
// ---------------------------------------------------------------------------

async fn social_exchange(
    outfit: &Outfit,
    provider: Option<SocialProvider>,
    code: Option<String>,
    callback: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let (provider, code) = match (callback, provider, code) {
        (Some(url), _, _) => {
            let cb = parse_callback(&url)
                .with_context(|| format!("not a sign-in callback URL: {url}"))?;
            (cb.provider, cb.code)
        }
        (None, Some(p), Some(c)) => (p, c),
        _ => anyhow::bail!("either --callback or both --provider and --code are required"),
    };

    outfit
        .social()
        .exchange(provider, &code)
        .await
        .with_context(|| format!("{provider} sign-in failed"))?;
    let user = outfit.auth().current_user().await?;

    if json {
        print_json(&user)?;
    } else {
        match user {
            Some(u) => println!("Signed in with {provider} as {}.", u.email),
            None => println!("Signed in with {provider}."),
        }
    }
    Ok(())
}

fn providers(outfit: &Outfit, json: bool) -> anyhow::Result<()> {
    let social = outfit.social();
    let rows: Vec<(SocialProvider, bool)> = SocialProvider::ALL
        .iter()
        .map(|&p| (p, social.is_available(p)))
        .collect();

    if json {
        let items: Vec<_> = rows
            .iter()
            .map(|(p, ok)| serde_json::json!({ "provider": p, "configured": ok }))
            .collect();
        print_json(&items)?;
    } else {
        for (p, ok) in rows {
            let mark = if ok { "configured" } else { "not configured" };
            println!("{p:<10} {mark}");
        }
    }
    Ok(())
}
