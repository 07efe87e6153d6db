use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// Identity record returned by `GET /auth/me` and embedded in auth responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub subscription: Option<UserSubscription>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub style_tags: Vec<String>,
    pub budget_range: Option<PriceRange>,
    pub currency: Option<String>,
    pub size_profile: Option<SizeProfile>,
    pub connected_stores: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSubscription {
    pub plan: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeProfile {
    pub gender: Gender,
    #[serde(default)]
    pub sizes: Sizes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sizes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tops: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bottoms: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shoes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Unisex,
}

/// Inclusive price bounds in the user's currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

// ---------------------------------------------------------------------------
// Auth payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInInput {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    pub accept_terms: bool,
    #[serde(default)]
    pub marketing_opt_in: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub requires_onboarding: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetConfirm {
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailVerification {
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_user() {
        let json = r#"{"id":"u1","email":"a@b.co"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "u1");
        assert!(!user.onboarding_completed);
        assert!(user.preferences.style_tags.is_empty());
    }

    #[test]
    fn parse_auth_response_camel_case() {
        let json = r#"{
            "user": {
                "id": "u1",
                "email": "a@b.co",
                "fullName": "Ada Lovelace",
                "isEmailVerified": true,
                "onboardingCompleted": true,
                "preferences": {
                    "styleTags": ["minimal"],
                    "budgetRange": {"min": 20, "max": 200},
                    "sizeProfile": {"gender": "female", "sizes": {"tops": "M"}}
                }
            },
            "token": "abc123",
            "refreshToken": "r1",
            "requiresOnboarding": false
        }"#;
        let resp: AuthResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.token, "abc123");
        assert_eq!(resp.user.full_name, "Ada Lovelace");
        let profile = resp.user.preferences.size_profile.unwrap();
        assert_eq!(profile.gender, Gender::Female);
        assert_eq!(profile.sizes.tops.as_deref(), Some("M"));
    }

    #[test]
    fn sign_up_serializes_camel_case() {
        let input = SignUpInput {
            email: "a@b.co".into(),
            password: "Secret123".into(),
            confirm_password: "Secret123".into(),
            full_name: "Ada".into(),
            accept_terms: true,
            marketing_opt_in: false,
        };
        let v = serde_json::to_value(&input).unwrap();
        assert_eq!(v["confirmPassword"], "Secret123");
        assert_eq!(v["acceptTerms"], true);
    }
}
