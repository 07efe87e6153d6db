use crate::session::{Session, DASHBOARD_ROUTE, LOGIN_ROUTE, ONBOARDING_ROUTE};

/// Outcome of checking whether a route may be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

/// Protected-route rules, evaluated in order:
/// 1. Not authenticated → `/login`
/// 2. Route demands completed onboarding and the user has not finished it → `/onboarding`
/// 3. Visiting `/onboarding` after finishing it → `/dashboard`
/// 4. Otherwise allow
pub struct RouteGuard;

impl RouteGuard {
    pub fn check(session: &Session, route: &str, require_onboarding: bool) -> GuardDecision {
        if !session.is_authenticated() {
            return GuardDecision::Redirect(LOGIN_ROUTE);
        }
        let pending = session.requires_onboarding();
        if require_onboarding && pending {
            return GuardDecision::Redirect(ONBOARDING_ROUTE);
        }
        if route == ONBOARDING_ROUTE && !pending {
            return GuardDecision::Redirect(DASHBOARD_ROUTE);
        }
        GuardDecision::Allow
    }
}
