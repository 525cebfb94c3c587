//! Caller identity extractor.
//!
//! There is no authentication: the caller names itself with the
//! `x-user-id` header, and requests without one act as the configured
//! default user.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderValue;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Longest accepted user id.
const MAX_USER_ID_LEN: usize = 128;

/// The user a request acts on behalf of.
///
/// ```ignore
/// async fn my_handler(user: CurrentUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
}

/// Validate the `x-user-id` header, falling back to `default` when it is
/// absent or blank.
fn resolve_user_id(header: Option<&HeaderValue>, default: &str) -> Result<String, AppError> {
    let Some(value) = header else {
        return Ok(default.to_string());
    };
    let id = value
        .to_str()
        .map_err(|_| AppError::BadRequest("x-user-id must be valid ASCII".into()))?
        .trim();
    if id.is_empty() {
        return Ok(default.to_string());
    }
    if id.len() > MAX_USER_ID_LEN || id.chars().any(char::is_control) {
        return Err(AppError::BadRequest(format!(
            "x-user-id must be at most {MAX_USER_ID_LEN} printable characters"
        )));
    }
    Ok(id.to_string())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = resolve_user_id(
            parts.headers.get(USER_ID_HEADER),
            &state.config.default_user_id,
        )?;
        Ok(CurrentUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn resolve(raw: Option<&str>) -> Result<String, AppError> {
        let value = raw.map(|r| HeaderValue::from_str(r).unwrap());
        resolve_user_id(value.as_ref(), "local-user")
    }

    #[test]
    fn missing_or_blank_header_uses_default() {
        assert_eq!(resolve(None).unwrap(), "local-user");
        assert_eq!(resolve(Some("   ")).unwrap(), "local-user");
    }

    #[test]
    fn header_is_trimmed() {
        assert_eq!(resolve(Some("  alice ")).unwrap(), "alice");
    }

    #[test]
    fn oversized_or_control_ids_are_rejected() {
        let long = "a".repeat(MAX_USER_ID_LEN + 1);
        assert_matches!(resolve(Some(&long)), Err(AppError::BadRequest(_)));
        assert_matches!(resolve(Some("al\tice")), Err(AppError::BadRequest(_)));
        assert!(resolve(Some(&"a".repeat(MAX_USER_ID_LEN))).is_ok());
    }

    #[test]
    fn non_ascii_header_is_rejected() {
        let value = HeaderValue::from_bytes("zoë".as_bytes()).unwrap();
        assert_matches!(
            resolve_user_id(Some(&value), "local-user"),
            Err(AppError::BadRequest(_))
        );
    }
}
