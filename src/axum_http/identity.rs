use axum::{
    Extension, RequestPartsExt, async_trait,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use uuid::Uuid;

/// Authenticated caller identity. Authentication itself happens upstream; the
/// gateway in front of this service inserts the user id as a request
/// extension. The `x-user-id` header fallback exists for direct calls in
/// development and tests.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Ok(Extension(user_id)) = parts.extract::<Extension<Uuid>>().await {
            return Ok(AuthUser { user_id });
        }

        let header = parts
            .headers
            .get("x-user-id")
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing authenticated user".to_string(),
            ))?
            .to_str()
            .map_err(|_| {
                (
                    StatusCode::UNAUTHORIZED,
                    "Invalid x-user-id header".to_string(),
                )
            })?;

        let user_id = Uuid::parse_str(header).map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                "x-user-id must be a valid UUID".to_string(),
            )
        })?;

        Ok(AuthUser { user_id })
    }
}
