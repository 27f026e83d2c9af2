use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::jwt::TokenError;
use crate::{db::User, error::AppError, state::AppState};

/// Splits `<scheme> <token>`; the scheme is matched case-insensitively.
fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Validates the bearer token and resolves its subject to a stored user.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                warn!("missing Authorization header");
                AppError::Unauthorized
            })?;

        let token = bearer_token(auth_header).ok_or_else(|| {
            warn!("invalid auth scheme");
            AppError::Unauthorized
        })?;

        let claims = match state.keys.verify(token) {
            Ok(c) => c,
            Err(TokenError::Expired) => {
                warn!("expired token");
                return Err(AppError::Unauthorized);
            }
            Err(TokenError::Invalid(e)) => {
                warn!(error = %e, "invalid token");
                return Err(AppError::Unauthorized);
            }
        };

        match state.store.find_user_by_username(&claims.sub).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                warn!(sub = %claims.sub, "token subject no longer exists");
                Err(AppError::UnknownOwner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_scheme_matches_any_case() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("BEARER abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bEaReR  abc.def "), Some("abc.def"));
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_rejected() {
        assert_eq!(bearer_token("Basic dXNlcjpwdw=="), None);
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer   "), None);
        assert_eq!(bearer_token("abc.def"), None);
    }
}
