//! Basic-auth authorization middleware
//!
//! The username is the tenant (app) name, the password is the caller's
//! directory token.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::api::state::AppState;
use crate::api::types::ApiError;

/// Credentials carried by an `Authorization: Basic` header
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub tenant: String,
    pub credential: String,
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials")
            .field("tenant", &self.tenant)
            .field("credential", &"[REDACTED]")
            .finish()
    }
}

/// Rejects requests whose caller does not own a tenant in the configured
/// organization. Every failure looks the same to the caller.
pub async fn require_builder_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if state.authorizer.is_bypassed() {
        return next.run(request).await;
    }

    let authorized = match extract_basic_credentials(request.headers()) {
        Some(creds) => {
            state
                .authorizer
                .authorize_credentials(&creds.tenant, &creds.credential)
                .await
        }
        None => false,
    };

    if !authorized {
        return ApiError::unauthorized().into_response();
    }

    next.run(request).await
}

/// Parses `Authorization: Basic base64(tenant:credential)`.
///
/// The scheme is case-insensitive. Empty parts are returned as-is and left to
/// the authorizer to reject.
pub fn extract_basic_credentials(headers: &HeaderMap) -> Option<BasicCredentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;

    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (tenant, credential) = decoded.split_once(':')?;

    Some(BasicCredentials {
        tenant: tenant.to_string(),
        credential: credential.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(raw: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode(raw)).parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_extract_basic_credentials() {
        let creds = extract_basic_credentials(&basic("my-app:fo1_secret")).unwrap();

        assert_eq!(creds.tenant, "my-app");
        assert_eq!(creds.credential, "fo1_secret");
    }

    #[test]
    fn test_password_may_contain_colons() {
        let creds = extract_basic_credentials(&basic("my-app:a:b:c")).unwrap();

        assert_eq!(creds.tenant, "my-app");
        assert_eq!(creds.credential, "a:b:c");
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("bAsIc {}", STANDARD.encode("app:tok")).parse().unwrap(),
        );

        assert!(extract_basic_credentials(&headers).is_some());
    }

    #[test]
    fn test_missing_header() {
        assert!(extract_basic_credentials(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_bearer_is_not_basic() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());

        assert!(extract_basic_credentials(&headers).is_none());
    }

    #[test]
    fn test_invalid_base64() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic !!!".parse().unwrap());

        assert!(extract_basic_credentials(&headers).is_none());
    }

    #[test]
    fn test_missing_separator() {
        assert!(extract_basic_credentials(&basic("no-separator")).is_none());
    }

    #[test]
    fn test_empty_parts_are_returned() {
        let creds = extract_basic_credentials(&basic(":")).unwrap();

        assert!(creds.tenant.is_empty());
        assert!(creds.credential.is_empty());
    }

    #[test]
    fn test_debug_redacts_credential() {
        let creds = extract_basic_credentials(&basic("my-app:fo1_secret")).unwrap();

        assert!(!format!("{:?}", creds).contains("fo1_secret"));
    }
}
