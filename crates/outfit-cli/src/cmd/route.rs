use crate::output::print_json;
use anyhow::Context as _;
use outfit_client::Outfit;
use outfit_core::guard::{GuardDecision, RouteGuard};

/// Evaluate the protected-route rules for `path` against the stored session.
pub async fn run(
    outfit: &Outfit,
    path: &str,
    require_onboarding: bool,
    json: bool,
) -> anyhow::Result<()> {
    // Identity decides the onboarding rules; fetch it when a token exists.
    outfit
        .auth()
        .current_user()
        .await
        .context("failed to fetch current user")?;

    let decision = RouteGuard::check(outfit.session(), path, require_onboarding);
    if json {
        let value = match decision {
            GuardDecision::Allow => serde_json::json!({ "route": path, "allow": true }),
            GuardDecision::Redirect(to) => {
                serde_json::json!({ "route": path, "allow": false, "redirect": to })
            }
        };
        print_json(&value)?;
    } else {
        match decision {
            GuardDecision::Allow => println!("allow {path}"),
            GuardDecision::Redirect(to) => println!("redirect {path} -> {to}"),
        }
    }
    Ok(())
}
