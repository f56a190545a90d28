use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use crate::errors::AppError;
use crate::models::ANONYMOUS_USER;

/// Header carrying the opaque user id set by the identity gateway in front of
/// the portal.
pub const USER_ID_HEADER: &str = "x-user-id";

const MAX_USER_ID_LEN: usize = 128;

/// Who is making the request, as far as the portal is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User(String),
    Anonymous,
}

impl Identity {
    /// Resolves the identity from request headers.
    ///
    /// A missing or blank header is an anonymous visitor. A header that is not
    /// a printable ASCII token is rejected.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let Some(raw) = headers.get(USER_ID_HEADER) else {
            return Ok(Identity::Anonymous);
        };

        let value = raw
            .to_str()
            .map_err(|_| AppError::Unauthorized("User id header is not ASCII".to_string()))?
            .trim();

        if value.is_empty() {
            return Ok(Identity::Anonymous);
        }
        if value == ANONYMOUS_USER {
            return Ok(Identity::Anonymous);
        }
        if value.len() > MAX_USER_ID_LEN || !value.chars().all(|c| c.is_ascii_graphic()) {
            return Err(AppError::Unauthorized("Malformed user id header".to_string()));
        }

        Ok(Identity::User(value.to_string()))
    }

    /// The value stored in a review's `userId`.
    pub fn user_id(&self) -> &str {
        match self {
            Identity::User(id) => id,
            Identity::Anonymous => ANONYMOUS_USER,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Identity::from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_missing_header_is_anonymous() {
        let identity = Identity::from_headers(&HeaderMap::new()).unwrap();
        assert_eq!(identity, Identity::Anonymous);
        assert_eq!(identity.user_id(), "anonymous");
    }

    #[test]
    fn test_blank_header_is_anonymous() {
        assert_eq!(Identity::from_headers(&headers("  ")).unwrap(), Identity::Anonymous);
    }

    #[test]
    fn test_user_header() {
        let identity = Identity::from_headers(&headers("uid-7f3a")).unwrap();
        assert_eq!(identity.user_id(), "uid-7f3a");
    }

    #[test]
    fn test_malformed_header_rejected() {
        assert!(Identity::from_headers(&headers("two words")).is_err());
        assert!(Identity::from_headers(&headers(&"x".repeat(200))).is_err());
    }
}
