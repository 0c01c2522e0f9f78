use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use spin_sdk::http::Request;

use crate::app::App;
use crate::common::errors::ApiError;
use crate::common::helpers::verify_password;
use crate::common::validation::Violations;
use crate::config::{MIN_PASSWORD_LENGTH, TOKEN_TTL_HOURS};
use crate::models::{AuthData, Identity};
use crate::users::find_user_by_email;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and checks HS256 identity tokens.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(TOKEN_TTL_HOURS),
        }
    }

    pub fn issue(&self, identity: &Identity) -> anyhow::Result<String> {
        self.issue_at(identity, Utc::now())
    }

    pub fn issue_at(&self, identity: &Identity, now: DateTime<Utc>) -> anyhow::Result<String> {
        let claims = Claims {
            user_id: identity.user_id.clone(),
            email: identity.email.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to generate token: {}", e))
    }

    pub fn verify(&self, token: &str) -> Option<Identity> {
        self.verify_at(token, Utc::now())
    }

    /// `None` for anything that is not a well-signed token still inside its
    /// lifetime at `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Option<Identity> {
        let mut validation = Validation::new(Algorithm::HS256);
        // expiry is checked below against the caller's clock
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = match decode::<Claims>(token, &self.decoding_key, &validation) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(error = %e, "rejected token");
                return None;
            }
        };

        if now.timestamp() >= data.claims.exp {
            tracing::debug!(user_id = %data.claims.user_id, "token expired");
            return None;
        }

        Some(Identity {
            user_id: data.claims.user_id,
            email: data.claims.email,
        })
    }
}

/// Result of the per-request auth gate. Rejection is left to each operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Authentication {
    Unauthenticated,
    Authenticated(Identity),
}

impl Authentication {
    pub fn from_header(header: Option<&str>, tokens: &TokenService) -> Self {
        let token = header
            .and_then(|h| h.split_whitespace().nth(1))
            .filter(|t| !t.is_empty());

        match token.and_then(|t| tokens.verify(t)) {
            Some(identity) => Authentication::Authenticated(identity),
            None => Authentication::Unauthenticated,
        }
    }

    pub fn from_request(req: &Request, tokens: &TokenService) -> Self {
        let header = req.header("Authorization").and_then(|h| h.as_str());
        Self::from_header(header, tokens)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Authentication::Authenticated(_))
    }

    /// The identity, or `Unauthenticated` for operations that need one.
    pub fn require(&self) -> Result<&Identity, ApiError> {
        match self {
            Authentication::Authenticated(identity) => Ok(identity),
            Authentication::Unauthenticated => Err(ApiError::not_authenticated()),
        }
    }
}

pub fn login(app: &App, email: &str, password: &str) -> Result<AuthData, ApiError> {
    let mut violations = Violations::new();
    violations
        .email("email", email, "Invalid email address")
        .min_length(
            "password",
            password,
            MIN_PASSWORD_LENGTH,
            "Password must be at least 8 characters long",
        );
    violations.finish("Bad Input!")?;

    let user = find_user_by_email(app.store(), email)?
        .ok_or_else(|| ApiError::Unauthenticated("User Not Found".to_string()))?;

    if !verify_password(password, &user.password) {
        tracing::info!(user_id = %user.id, "login rejected: wrong password");
        return Err(ApiError::bad_input("Invalid email or password"));
    }

    let identity = Identity {
        user_id: user.id.clone(),
        email: user.email.clone(),
    };
    let token = app.tokens().issue(&identity)?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok(AuthData {
        token,
        user_id: user.id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_app, signup_as};

    fn identity() -> Identity {
        Identity {
            user_id: "7f1c2a4e-0000-4000-8000-000000000001".to_string(),
            email: "ada@example.com".to_string(),
        }
    }

    #[test]
    fn issued_token_verifies_to_same_identity() {
        let tokens = TokenService::new("test-secret-key-for-testing");
        let token = tokens.issue(&identity()).unwrap();
        assert_eq!(tokens.verify(&token), Some(identity()));
    }

    #[test]
    fn token_expires_after_one_hour() {
        let tokens = TokenService::new("test-secret-key-for-testing");
        let issued = Utc::now();
        let token = tokens.issue_at(&identity(), issued).unwrap();

        assert!(tokens.verify_at(&token, issued + Duration::minutes(59)).is_some());
        assert!(tokens.verify_at(&token, issued + Duration::hours(1)).is_none());
        assert!(tokens
            .verify_at(&token, issued + Duration::hours(1) + Duration::seconds(1))
            .is_none());
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let ours = TokenService::new("test-secret-key-for-testing");
        let theirs = TokenService::new("some-other-secret");
        let token = theirs.issue(&identity()).unwrap();
        assert!(ours.verify(&token).is_none());
        assert!(ours.verify("invalid.token.here").is_none());
    }

    #[test]
    fn gate_never_rejects() {
        let tokens = TokenService::new("test-secret-key-for-testing");
        let token = tokens.issue(&identity()).unwrap();

        assert_eq!(
            Authentication::from_header(None, &tokens),
            Authentication::Unauthenticated
        );
        assert_eq!(
            Authentication::from_header(Some("Bearer"), &tokens),
            Authentication::Unauthenticated
        );
        assert_eq!(
            Authentication::from_header(Some("Bearer garbage"), &tokens),
            Authentication::Unauthenticated
        );
        let header = format!("Bearer {}", token);
        assert_eq!(
            Authentication::from_header(Some(&header), &tokens),
            Authentication::Authenticated(identity())
        );
    }

    #[test]
    fn require_maps_to_401() {
        let err = Authentication::Unauthenticated.require().unwrap_err();
        assert_eq!(err.status().as_u16(), 401);
    }

    #[test]
    fn login_returns_token_for_user() {
        let app = test_app();
        let user = signup_as(&app, "ada@example.com");

        let auth = login(&app, "ada@example.com", "password123").unwrap();
        assert_eq!(auth.user_id, user.id);
        let identity = app.tokens().verify(&auth.token).unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.email, "ada@example.com");
    }

    #[test]
    fn wrong_password_differs_from_unknown_user() {
        let app = test_app();
        signup_as(&app, "ada@example.com");

        let wrong = login(&app, "ada@example.com", "not-the-password").unwrap_err();
        assert!(matches!(wrong, ApiError::BadInput { .. }));
        assert_eq!(wrong.status().as_u16(), 422);

        let unknown = login(&app, "bob@example.com", "password123").unwrap_err();
        assert!(matches!(unknown, ApiError::Unauthenticated(_)));
        assert_eq!(unknown.status().as_u16(), 401);
    }

    #[test]
    fn login_validates_shape_first() {
        let app = test_app();
        let err = login(&app, "not-an-email", "short").unwrap_err();
        assert_eq!(err.violations().len(), 2);
    }
}
