use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use thiserror::Error;
use uuid::Uuid;

use crate::routes::ranking::AppState;

/// JWT claims issued by the platform's auth service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Requester id
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization header format")]
    MalformedHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token: malformed subject {0}")]
    InvalidSubject(String),
}

/// HS256 bearer-token verifier
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate a raw token and return the requester id from `sub`
    pub fn verify(&self, token: &str) -> Result<Uuid, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidSubject(data.claims.sub))
    }

    /// Requester id from the request's `Authorization: Bearer` header
    pub fn authenticate(&self, req: &HttpRequest) -> Result<Uuid, AuthError> {
        let header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .ok_or(AuthError::MissingHeader)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MalformedHeader)?;

        self.verify(token.trim())
    }
}

/// Authenticated requester, if any
///
/// Never rejects on its own so body validation can answer first; handlers
/// decide whether an anonymous request is a 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester(pub Option<Uuid>);

impl FromRequest for Requester {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let identity = match req.app_data::<web::Data<AppState>>() {
            Some(state) => match state.verifier.authenticate(req) {
                Ok(user_id) => Some(user_id),
                Err(AuthError::MissingHeader) => None,
                Err(e) => {
                    tracing::warn!("Rejected credentials on {}: {}", req.path(), e);
                    None
                }
            },
            None => {
                tracing::error!("Application state missing, cannot authenticate request");
                None
            }
        };

        ready(Ok(Requester(identity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, iss: Option<&str>) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            iss: iss.map(str::to_string),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let verifier = JwtVerifier::new("secret", None);
        let user_id = Uuid::new_v4();
        assert_eq!(
            verifier.verify(&token("secret", &user_id.to_string(), None)).unwrap(),
            user_id
        );
    }

    #[test]
    fn test_rejects_wrong_secret_and_bad_subject() {
        let verifier = JwtVerifier::new("secret", None);
        assert!(matches!(
            verifier.verify(&token("other", &Uuid::new_v4().to_string(), None)),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            verifier.verify(&token("secret", "not-a-uuid", None)),
            Err(AuthError::InvalidSubject(_))
        ));
    }

    #[test]
    fn test_issuer_is_enforced_when_configured() {
        let verifier = JwtVerifier::new("secret", Some("rentals-auth"));
        let sub = Uuid::new_v4().to_string();
        assert!(verifier.verify(&token("secret", &sub, Some("rentals-auth"))).is_ok());
        assert!(verifier.verify(&token("secret", &sub, Some("someone-else"))).is_err());
    }

    #[test]
    fn test_authenticate_requires_bearer_scheme() {
        let verifier = JwtVerifier::new("secret", None);
        let user_id = Uuid::new_v4();
        let good = actix_web::test::TestRequest::default()
            .insert_header((
                "Authorization",
                format!("Bearer {}", token("secret", &user_id.to_string(), None)),
            ))
            .to_http_request();
        assert_eq!(verifier.authenticate(&good).unwrap(), user_id);

        let basic = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Basic abc"))
            .to_http_request();
        assert!(matches!(verifier.authenticate(&basic), Err(AuthError::MalformedHeader)));

        let missing = actix_web::test::TestRequest::default().to_http_request();
        assert!(matches!(verifier.authenticate(&missing), Err(AuthError::MissingHeader)));
    }
}
